//! Link quality indicator.
//!
//! Per-link frame outcome counters and running signal/noise totals. The MAC feeds it through
//! `update` on every frame outcome; consumers read averages and counters.

use wps_core::{FrameOutcome, LqiMode};

/// Receiver code of the weakest decodable signal
const WEAKEST_SIGNAL_CODE: u8 = 47;
/// Span of one gain entry, in tenths of dB
const GAIN_ENTRY_RANGE_TENTH_DB: u32 = 235;

/// Converts a raw receiver code into tenths of dB above the gain entry minimum.
/// Codes above the weakest code are clamped to it.
pub fn calculate_normalized_gain(min_tenth_db: u16, code: u8) -> u16 {
    let code = code.min(WEAKEST_SIGNAL_CODE);
    let above_min = GAIN_ENTRY_RANGE_TENTH_DB * (WEAKEST_SIGNAL_CODE - code) as u32 / WEAKEST_SIGNAL_CODE as u32;
    min_tenth_db.saturating_add(above_min as u16)
}

/// Signal measurement attached to a frame outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LqiSample {
    pub rssi_raw: u8,
    pub rnsi_raw: u8,
    pub rssi_tenth_db: u16,
    pub rnsi_tenth_db: u16,
}

impl LqiSample {
    pub fn from_raw(gain_min_tenth_db: u16, rssi_raw: u8, rnsi_raw: u8) -> Self {
        Self {
            rssi_raw,
            rnsi_raw,
            rssi_tenth_db: calculate_normalized_gain(gain_min_tenth_db, rssi_raw),
            rnsi_tenth_db: calculate_normalized_gain(gain_min_tenth_db, rnsi_raw),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lqi {
    mode: LqiMode,
    sent_count: u32,
    ack_count: u32,
    nack_count: u32,
    received_count: u32,
    rejected_count: u32,
    lost_count: u32,
    total_count: u32,
    rssi_total_tenth_db: u64,
    rnsi_total_tenth_db: u64,
    inst_rssi: u8,
    inst_rnsi: u8,
    inst_rssi_tenth_db: u16,
    inst_rnsi_tenth_db: u16,
}

impl Lqi {
    pub fn new(mode: LqiMode) -> Self {
        Self { mode, ..Default::default() }
    }

    /// Zeroes every counter and total. The averaging mode is kept.
    pub fn reset(&mut self) {
        *self = Self::new(self.mode);
    }

    /// Accounts for one frame outcome. `Wait` leaves the record untouched.
    pub fn update(&mut self, outcome: FrameOutcome, sample: LqiSample) {
        if outcome == FrameOutcome::Wait {
            return;
        }
        self.total_count = self.total_count.saturating_add(1);
        if outcome.is_sent() {
            self.sent_count = self.sent_count.saturating_add(1);
        }

        match outcome {
            FrameOutcome::Received => {
                self.received_count = self.received_count.saturating_add(1);
                self.record_sample(sample);
            }
            FrameOutcome::SentAck => {
                self.ack_count = self.ack_count.saturating_add(1);
                self.record_sample(sample);
            }
            FrameOutcome::SentAckLost | FrameOutcome::SentAckRejected => {
                self.nack_count = self.nack_count.saturating_add(1);
            }
            FrameOutcome::Rejected => {
                self.rejected_count = self.rejected_count.saturating_add(1);
            }
            FrameOutcome::Lost => {
                self.lost_count = self.lost_count.saturating_add(1);
            }
            FrameOutcome::Wait => {}
        }
    }

    fn record_sample(&mut self, sample: LqiSample) {
        self.inst_rssi = sample.rssi_raw;
        self.inst_rnsi = sample.rnsi_raw;
        self.inst_rssi_tenth_db = sample.rssi_tenth_db;
        self.inst_rnsi_tenth_db = sample.rnsi_tenth_db;
        self.rssi_total_tenth_db += sample.rssi_tenth_db as u64;
        self.rnsi_total_tenth_db += sample.rnsi_tenth_db as u64;
    }

    fn average(&self, total: u64) -> u16 {
        if self.total_count == 0 {
            return 0;
        }
        let divisor = match self.mode {
            LqiMode::Mode0 => self.total_count,
            LqiMode::Mode1 => self.received_count,
        };
        if divisor == 0 {
            return 0;
        }
        u16::try_from(total / divisor as u64).unwrap_or(u16::MAX)
    }

    pub fn get_avg_rssi_tenth_db(&self) -> u16 {
        self.average(self.rssi_total_tenth_db)
    }

    pub fn get_avg_rnsi_tenth_db(&self) -> u16 {
        self.average(self.rnsi_total_tenth_db)
    }

    pub fn mode(&self) -> LqiMode {
        self.mode
    }

    pub fn get_sent_count(&self) -> u32 {
        self.sent_count
    }

    pub fn get_ack_count(&self) -> u32 {
        self.ack_count
    }

    pub fn get_nack_count(&self) -> u32 {
        self.nack_count
    }

    pub fn get_received_count(&self) -> u32 {
        self.received_count
    }

    pub fn get_rejected_count(&self) -> u32 {
        self.rejected_count
    }

    pub fn get_lost_count(&self) -> u32 {
        self.lost_count
    }

    pub fn get_total_count(&self) -> u32 {
        self.total_count
    }

    pub fn get_inst_rssi(&self) -> u8 {
        self.inst_rssi
    }

    pub fn get_inst_rnsi(&self) -> u8 {
        self.inst_rnsi
    }

    pub fn get_inst_rssi_tenth_db(&self) -> u16 {
        self.inst_rssi_tenth_db
    }

    pub fn get_inst_rnsi_tenth_db(&self) -> u16 {
        self.inst_rnsi_tenth_db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(rssi_tenth_db: u16, rnsi_tenth_db: u16) -> LqiSample {
        LqiSample {
            rssi_tenth_db,
            rnsi_tenth_db,
            ..Default::default()
        }
    }

    #[test]
    fn test_fresh_record_averages_zero() {
        let lqi = Lqi::new(LqiMode::Mode0);
        assert_eq!(lqi.get_avg_rssi_tenth_db(), 0);
        assert_eq!(lqi.get_avg_rnsi_tenth_db(), 0);
        let lqi = Lqi::new(LqiMode::Mode1);
        assert_eq!(lqi.get_avg_rssi_tenth_db(), 0);
    }

    #[test]
    fn test_counters_per_outcome() {
        let mut lqi = Lqi::new(LqiMode::Mode0);
        lqi.update(FrameOutcome::Received, sample(100, 10));
        lqi.update(FrameOutcome::SentAck, sample(200, 20));
        lqi.update(FrameOutcome::SentAckLost, sample(999, 999));
        lqi.update(FrameOutcome::SentAckRejected, sample(999, 999));
        lqi.update(FrameOutcome::Rejected, sample(999, 999));
        lqi.update(FrameOutcome::Lost, sample(999, 999));
        lqi.update(FrameOutcome::Wait, sample(999, 999));

        assert_eq!(lqi.get_total_count(), 6);
        assert_eq!(lqi.get_received_count(), 1);
        assert_eq!(lqi.get_sent_count(), 3);
        assert_eq!(lqi.get_ack_count(), 1);
        assert_eq!(lqi.get_nack_count(), 2);
        assert_eq!(lqi.get_rejected_count(), 1);
        assert_eq!(lqi.get_lost_count(), 1);
        assert_eq!(lqi.get_inst_rssi_tenth_db(), 200);
        assert_eq!(lqi.get_inst_rnsi_tenth_db(), 20);
        // Mode 0 divides the 300 total by all 6 frames
        assert_eq!(lqi.get_avg_rssi_tenth_db(), 50);
        assert_eq!(lqi.get_avg_rnsi_tenth_db(), 5);
    }

    #[test]
    fn test_mode1_divides_by_received() {
        let mut lqi = Lqi::new(LqiMode::Mode1);
        lqi.update(FrameOutcome::Received, sample(120, 0));
        lqi.update(FrameOutcome::Received, sample(80, 0));
        lqi.update(FrameOutcome::Lost, sample(0, 0));
        lqi.update(FrameOutcome::Lost, sample(0, 0));
        assert_eq!(lqi.get_avg_rssi_tenth_db(), 100);

        // Frames counted but nothing received
        let mut lqi = Lqi::new(LqiMode::Mode1);
        lqi.update(FrameOutcome::Lost, sample(0, 0));
        assert_eq!(lqi.get_avg_rssi_tenth_db(), 0);
    }

    #[test]
    fn test_reset_keeps_mode() {
        let mut lqi = Lqi::new(LqiMode::Mode1);
        lqi.update(FrameOutcome::Received, sample(120, 3));
        lqi.reset();
        assert_eq!(lqi, Lqi::new(LqiMode::Mode1));
        assert_eq!(lqi.mode(), LqiMode::Mode1);
    }

    #[test]
    fn test_normalized_gain() {
        assert_eq!(calculate_normalized_gain(100, 47), 100);
        assert_eq!(calculate_normalized_gain(100, 0), 335);
        // Codes past the weakest one do not underflow
        assert_eq!(calculate_normalized_gain(100, 60), 100);
        let s = LqiSample::from_raw(0, 0, 47);
        assert_eq!(s.rssi_tenth_db, 235);
        assert_eq!(s.rnsi_tenth_db, 0);
    }
}
