use serde::Deserialize;

/// Outcome of a single frame exchange, as reported by the MAC/PHY
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Frame received and accepted
    Received,
    /// Frame received but rejected (CRC or address mismatch)
    Rejected,
    /// Expected frame never arrived
    Lost,
    /// Frame sent and acknowledged
    SentAck,
    /// Frame sent, no acknowledge received
    SentAckLost,
    /// Frame sent, acknowledge rejected
    SentAckRejected,
    /// Nothing happened this timeslot
    Wait,
}

impl FrameOutcome {
    pub fn is_sent(self) -> bool {
        matches!(self, FrameOutcome::SentAck | FrameOutcome::SentAckLost | FrameOutcome::SentAckRejected)
    }
}

/// Divisor used when averaging LQI signal totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum LqiMode {
    /// Average over every counted frame
    #[default]
    Mode0,
    /// Average over received frames only
    Mode1,
}

/// Radio sleep level between timeslots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SleepLevel {
    #[default]
    Idle,
    Shallow,
    Deep,
}

/// Highest channel number + 1 a hopping sequence may use
pub const MAX_CHANNEL_COUNT: usize = 5;
/// Longest hopping sequence, its position travels as one byte
pub const MAX_HOP_SEQUENCE_SIZE: usize = 256;

/// Role of a device on a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Owns the schedule and the hopping sequence position
    Coordinator,
    /// Follows the coordinator
    Node,
}
