//! Stop and wait ARQ.
//!
//! The sender keeps a one-bit sequence number that toggles for every new frame and retries the
//! current frame until it is acknowledged or its time to live runs out. The receiver compares the
//! incoming bit with the last one to spot retransmissions of a frame it already delivered.

use wps_config::CfgSawArq;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SawArq {
    ttl_ms: u16,
    ttl_retries: u16,
    seq_num: bool,
    duplicate: bool,
    duplicate_count: u32,
    retry_count: u32,
    enabled: bool,
}

impl SawArq {
    /// `ttl_ms` and `ttl_retries` of 0 disable that limit
    pub fn new(ttl_ms: u16, ttl_retries: u16, init_seq_num: bool, enabled: bool) -> Self {
        Self {
            ttl_ms,
            ttl_retries,
            seq_num: init_seq_num,
            duplicate: false,
            duplicate_count: 0,
            retry_count: 0,
            enabled,
        }
    }

    pub fn from_config(cfg: &CfgSawArq, init_seq_num: bool) -> Self {
        Self::new(cfg.ttl_ms, cfg.ttl_retries, init_seq_num, cfg.enabled)
    }

    /// Whether a frame first queued at `time_stamp` and already retried `retry_count` times must
    /// be dropped at `current_time`. Times are in ms. A disabled ARQ times out every frame, so
    /// nothing is ever retried. Each retry that is still allowed is counted.
    pub fn is_frame_timeout(&mut self, time_stamp: u64, retry_count: u16, current_time: u64) -> bool {
        if !self.enabled {
            return true;
        }

        let delta_t = current_time.saturating_sub(time_stamp);
        let time_timeout = self.ttl_ms != 0 && delta_t >= self.ttl_ms as u64;
        let retries_timeout = self.ttl_retries != 0 && retry_count >= self.ttl_retries;
        let timeout = time_timeout || retries_timeout;

        if retry_count > 0 && !timeout {
            self.retry_count = self.retry_count.saturating_add(1);
        }
        if timeout {
            tracing::debug!(
                "is_frame_timeout: dropped after {} ms and {} retries",
                delta_t,
                retry_count
            );
        }
        timeout
    }

    pub fn seq_num(&self) -> bool {
        self.seq_num
    }

    /// Moves to the next frame
    pub fn inc_seq_num(&mut self) {
        self.seq_num = !self.seq_num;
    }

    /// Records the sequence bit of a received frame. A bit equal to the previous one marks the
    /// frame as a retransmission.
    pub fn update_rx_seq_num(&mut self, seq_num: bool) {
        self.duplicate = seq_num == self.seq_num;
        self.seq_num = seq_num;
    }

    /// Whether the last frame given to `update_rx_seq_num` was a duplicate. Counts it if so.
    /// Always false when disabled.
    pub fn is_rx_frame_duplicate(&mut self) -> bool {
        if !self.enabled {
            return false;
        }
        if self.duplicate {
            self.duplicate_count = self.duplicate_count.saturating_add(1);
        }
        self.duplicate
    }

    pub fn duplicate_count(&self) -> u32 {
        self.duplicate_count
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn reset_stats(&mut self) {
        self.retry_count = 0;
        self.duplicate_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_always_times_out() {
        let mut saw = SawArq::new(100, 5, false, false);
        assert!(saw.is_frame_timeout(0, 0, 0));
        assert!(saw.is_frame_timeout(0, 3, 10));
        assert_eq!(saw.retry_count(), 0);

        saw.update_rx_seq_num(false);
        assert!(!saw.is_rx_frame_duplicate());
        assert_eq!(saw.duplicate_count(), 0);
    }

    #[test]
    fn test_time_to_live_in_ms() {
        let mut saw = SawArq::new(10, 0, false, true);
        assert!(!saw.is_frame_timeout(1000, 0, 1005));
        assert!(!saw.is_frame_timeout(1000, 1, 1009));
        assert!(saw.is_frame_timeout(1000, 2, 1010));
        // Only the retry that was still allowed counts
        assert_eq!(saw.retry_count(), 1);
        // Clock behind the stamp is not a timeout
        assert!(!saw.is_frame_timeout(1000, 0, 900));
    }

    #[test]
    fn test_time_to_live_in_retries() {
        let mut saw = SawArq::new(0, 3, false, true);
        let timeouts: Vec<bool> = (0..5).map(|r| saw.is_frame_timeout(0, r, 1_000_000)).collect();
        assert_eq!(timeouts, vec![false, false, false, true, true]);
        assert_eq!(saw.retry_count(), 2);
    }

    #[test]
    fn test_no_limit_never_times_out() {
        let mut saw = SawArq::new(0, 0, false, true);
        assert!(!saw.is_frame_timeout(0, u16::MAX, u64::MAX));
        assert_eq!(saw.retry_count(), 1);
    }

    #[test]
    fn test_seq_num_toggles() {
        let mut saw = SawArq::new(0, 0, true, true);
        assert!(saw.seq_num());
        saw.inc_seq_num();
        assert!(!saw.seq_num());
        saw.inc_seq_num();
        assert!(saw.seq_num());
    }

    #[test]
    fn test_duplicate_detection() {
        let mut tx = SawArq::new(0, 0, true, true);
        let mut rx = SawArq::new(0, 0, false, true);

        // New frame, retransmission of it, then the next frame
        rx.update_rx_seq_num(tx.seq_num());
        assert!(!rx.is_rx_frame_duplicate());
        rx.update_rx_seq_num(tx.seq_num());
        assert!(rx.is_rx_frame_duplicate());
        tx.inc_seq_num();
        rx.update_rx_seq_num(tx.seq_num());
        assert!(!rx.is_rx_frame_duplicate());
        assert_eq!(rx.duplicate_count(), 1);
    }

    #[test]
    fn test_reset_stats() {
        let mut saw = SawArq::from_config(
            &CfgSawArq {
                enabled: true,
                ttl_ms: 0,
                ttl_retries: 10,
            },
            false,
        );
        saw.is_frame_timeout(0, 1, 0);
        saw.update_rx_seq_num(false);
        saw.is_rx_frame_duplicate();
        assert_eq!((saw.retry_count(), saw.duplicate_count()), (1, 1));

        saw.reset_stats();
        assert_eq!((saw.retry_count(), saw.duplicate_count()), (0, 0));
        assert!(saw.is_enabled());
        assert!(!saw.seq_num());
    }
}
