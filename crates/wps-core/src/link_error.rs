use thiserror::Error;

/// Errors raised while building or driving a link protocol table
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// All protocol slots are taken
    #[error("too many protocols, table holds at most {max}")]
    TooManyProtocols { max: usize },

    /// The protocol does not fit in what is left of the frame buffer
    #[error("no more space in frame buffer: requested {requested} bytes, {available} available")]
    NoMoreSpace { requested: usize, available: usize },

    /// Caller buffer shorter than the registered layout
    #[error("frame buffer too small: layout needs {needed} bytes, got {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// Hopping sequence empty or longer than its u8 index can address
    #[error("channel sequence must hold 1 to {max} entries, got {len}")]
    ChannelSequenceLength { len: usize, max: usize },

    /// Channel number outside the channel table
    #[error("channel {channel} out of range, table holds {max} channels")]
    InvalidChannel { channel: u8, max: usize },
}
