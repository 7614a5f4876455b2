//! Replying radio selection for multi-radio nodes.
//!
//! Every radio keeps its own LQI record. Once every record holds enough samples, the radio with
//! the best average RSSI takes over replying, provided it beats the current one by more than the
//! hysteresis margin. All records restart after each decision.
//!
//! `update` reads and then resets the records. Taking `&mut self` means the LQI feed and the
//! selection cannot interleave; integrations that feed counters from an interrupt must run both
//! under the same lock or priority level.

use wps_config::CfgMultiRadio;
use wps_core::{FrameOutcome, LqiMode, RadioIdx, assert_warn};

use crate::lqi::{Lqi, LqiSample};

#[derive(Debug, Clone)]
pub struct MultiRadio<const R: usize> {
    radios_lqi: [Lqi; R],
    replying_radio: RadioIdx,
    avg_sample_count: u16,
    hysteresis_tenth_db: u16,
    radio_select: u8,
}

impl<const R: usize> MultiRadio<R> {
    pub fn new(cfg: &CfgMultiRadio, lqi_mode: LqiMode) -> Self {
        assert_warn!(
            cfg.radio_count as usize == R,
            "configured radio_count {} but {} radios instantiated",
            cfg.radio_count,
            R
        );
        Self {
            radios_lqi: [Lqi::new(lqi_mode); R],
            replying_radio: 0,
            avg_sample_count: cfg.avg_sample_count,
            hysteresis_tenth_db: cfg.hysteresis_tenth_db,
            radio_select: Self::checked_radio_select(cfg.radio_select),
        }
    }

    /// A forced radio that does not exist falls back to automatic selection
    fn checked_radio_select(radio_select: u8) -> u8 {
        if radio_select as usize > R {
            tracing::warn!("radio_select {} out of range for {} radios, using automatic selection", radio_select, R);
            0
        } else {
            radio_select
        }
    }

    /// Runs one selection round if every radio has at least `avg_sample_count` samples,
    /// otherwise does nothing.
    pub fn update(&mut self) {
        if self
            .radios_lqi
            .iter()
            .any(|lqi| lqi.get_total_count() < self.avg_sample_count as u32)
        {
            return;
        }

        let mut best_radio = self.replying_radio;
        let mut max_rssi_avg: u16 = 0;
        let mut replying_radio_rssi_avg: u16 = 0;

        for (i, lqi) in self.radios_lqi.iter_mut().enumerate() {
            let rssi_avg = lqi.get_avg_rssi_tenth_db();
            lqi.reset();
            if i == self.replying_radio as usize {
                replying_radio_rssi_avg = rssi_avg;
            }
            // Strictly greater, so the lowest index wins a tie
            if rssi_avg > max_rssi_avg {
                max_rssi_avg = rssi_avg;
                best_radio = i as RadioIdx;
            }
        }

        tracing::trace!(
            "update: best radio {} at {} vs replying radio {} at {}",
            best_radio,
            max_rssi_avg,
            self.replying_radio,
            replying_radio_rssi_avg
        );

        if max_rssi_avg as u32 > replying_radio_rssi_avg as u32 + self.hysteresis_tenth_db as u32 {
            tracing::info!(
                "replying radio {} -> {} ({} > {} + {} tenth dB)",
                self.replying_radio,
                best_radio,
                max_rssi_avg,
                replying_radio_rssi_avg,
                self.hysteresis_tenth_db
            );
            self.replying_radio = best_radio;
        }
    }

    /// Radio to use for the next reply: the forced radio if `radio_select` is set,
    /// else the automatic choice.
    pub fn get_replying_radio(&self) -> RadioIdx {
        if self.radio_select == 0 {
            self.replying_radio
        } else {
            self.radio_select - 1
        }
    }

    /// Feeds one frame outcome into a radio's LQI record
    pub fn update_radio(&mut self, radio: RadioIdx, outcome: FrameOutcome, sample: LqiSample) {
        match self.radios_lqi.get_mut(radio as usize) {
            Some(lqi) => lqi.update(outcome, sample),
            None => tracing::warn!("update_radio: no radio {} in {} radio setup", radio, R),
        }
    }

    pub fn radio_lqi(&self, radio: RadioIdx) -> Option<&Lqi> {
        self.radios_lqi.get(radio as usize)
    }

    pub fn radio_lqi_mut(&mut self, radio: RadioIdx) -> Option<&mut Lqi> {
        self.radios_lqi.get_mut(radio as usize)
    }

    pub fn set_radio_select(&mut self, radio_select: u8) {
        self.radio_select = Self::checked_radio_select(radio_select);
    }

    pub fn radio_count(&self) -> usize {
        R
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(avg_sample_count: u16, hysteresis_tenth_db: u16) -> CfgMultiRadio {
        CfgMultiRadio {
            radio_count: 2,
            avg_sample_count,
            hysteresis_tenth_db,
            radio_select: 0,
        }
    }

    fn feed(mr: &mut MultiRadio<2>, radio: RadioIdx, rssi_tenth_db: u16, n: usize) {
        let sample = LqiSample {
            rssi_tenth_db,
            ..Default::default()
        };
        for _ in 0..n {
            mr.update_radio(radio, FrameOutcome::Received, sample);
        }
    }

    #[test]
    fn test_hysteresis_blocks_switch() {
        let mut mr = MultiRadio::<2>::new(&cfg(4, 10), LqiMode::Mode0);
        feed(&mut mr, 0, 50, 4);
        feed(&mut mr, 1, 55, 4);
        mr.update();
        assert_eq!(mr.get_replying_radio(), 0);
        // Window restarted regardless of the outcome
        assert_eq!(mr.radio_lqi(0).unwrap().get_total_count(), 0);
        assert_eq!(mr.radio_lqi(1).unwrap().get_total_count(), 0);
    }

    #[test]
    fn test_switch_past_hysteresis() {
        let mut mr = MultiRadio::<2>::new(&cfg(4, 3), LqiMode::Mode0);
        feed(&mut mr, 0, 50, 4);
        feed(&mut mr, 1, 55, 4);
        mr.update();
        assert_eq!(mr.get_replying_radio(), 1);
    }

    #[test]
    fn test_guard_needs_samples_on_every_radio() {
        let mut mr = MultiRadio::<2>::new(&cfg(4, 0), LqiMode::Mode0);
        feed(&mut mr, 0, 50, 10);
        feed(&mut mr, 1, 90, 3);
        let before = mr.clone();
        mr.update();
        assert_eq!(mr.get_replying_radio(), 0);
        assert_eq!(mr.radio_lqi(0), before.radio_lqi(0));
        assert_eq!(mr.radio_lqi(1), before.radio_lqi(1));

        feed(&mut mr, 1, 90, 1);
        mr.update();
        assert_eq!(mr.get_replying_radio(), 1);
    }

    #[test]
    fn test_tie_keeps_lowest_index() {
        let mut mr = MultiRadio::<3>::new(
            &CfgMultiRadio {
                radio_count: 3,
                ..cfg(2, 0)
            },
            LqiMode::Mode0,
        );
        for radio in 0..3 {
            let rssi = if radio == 0 { 10 } else { 80 };
            for _ in 0..2 {
                mr.update_radio(radio, FrameOutcome::Received, LqiSample { rssi_tenth_db: rssi, ..Default::default() });
            }
        }
        mr.update();
        assert_eq!(mr.get_replying_radio(), 1);
    }

    #[test]
    fn test_manual_override() {
        let mut mr = MultiRadio::<2>::new(&cfg(1, 0), LqiMode::Mode0);
        mr.set_radio_select(2);
        assert_eq!(mr.get_replying_radio(), 1);
        feed(&mut mr, 0, 200, 1);
        feed(&mut mr, 1, 10, 1);
        mr.update();
        // Automatic choice stays radio 0 underneath the override
        assert_eq!(mr.get_replying_radio(), 1);
        mr.set_radio_select(0);
        assert_eq!(mr.get_replying_radio(), 0);
    }

    #[test]
    fn test_radio_select_out_of_range_falls_back_to_automatic() {
        let mut mr = MultiRadio::<2>::new(
            &CfgMultiRadio {
                radio_select: 5,
                ..cfg(1, 0)
            },
            LqiMode::Mode0,
        );
        assert_eq!(mr.get_replying_radio(), 0);

        mr.set_radio_select(2);
        mr.set_radio_select(3);
        assert_eq!(mr.get_replying_radio(), 0);
        feed(&mut mr, 0, 10, 1);
        feed(&mut mr, 1, 200, 1);
        mr.update();
        assert_eq!(mr.get_replying_radio(), 1);
        assert!((mr.get_replying_radio() as usize) < mr.radio_count());
    }
}
