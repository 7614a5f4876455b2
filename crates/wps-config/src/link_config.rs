use wps_core::{LqiMode, MAX_CHANNEL_COUNT, MAX_HOP_SEQUENCE_SIZE, SleepLevel};

/// Fixed point format requested for link statistics
#[derive(Debug, Clone, Copy)]
pub struct CfgFixedPoint {
    pub precision_bits: u8,
    pub integer_bits: u8,
}

impl Default for CfgFixedPoint {
    fn default() -> Self {
        Self {
            precision_bits: 16,
            integer_bits: 15,
        }
    }
}

/// Which sub-protocols are carried in the connection header
#[derive(Debug, Clone, Copy, Default)]
pub struct CfgHeader {
    /// Coordinator's hopping sequence position, adopted by the node
    pub channel_index_enabled: bool,
    pub rdo_enabled: bool,
    pub ranging_phase_provider: bool,
    pub ranging_phase_accumulator: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct CfgRdo {
    /// Offset modulus. 0 selects the default of 15
    pub rollover: u16,
    /// When false, the counter still runs but contributes no offset
    pub enabled: bool,
}

impl Default for CfgRdo {
    fn default() -> Self {
        Self {
            rollover: 15,
            enabled: true,
        }
    }
}

/// Channel hopping sequence shared by both ends of a connection
#[derive(Debug, Clone)]
pub struct CfgChannelHopping {
    /// Channel numbers in hop order, each below `MAX_CHANNEL_COUNT`. Repeats are allowed
    pub channel_sequence: Vec<u8>,
    /// Remap the distinct channels through a permutation seeded with `random_sequence_seed`
    pub random_sequence_enabled: bool,
    pub random_sequence_seed: u8,
}

impl Default for CfgChannelHopping {
    fn default() -> Self {
        Self {
            channel_sequence: vec![0, 1, 2, 3, 4],
            random_sequence_enabled: false,
            random_sequence_seed: 0,
        }
    }
}

/// Stop and wait ARQ. A zero TTL disables that limit
#[derive(Debug, Clone, Copy, Default)]
pub struct CfgSawArq {
    pub enabled: bool,
    pub ttl_ms: u16,
    pub ttl_retries: u16,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CfgLqi {
    pub mode: LqiMode,
}

#[derive(Debug, Clone, Copy)]
pub struct CfgMultiRadio {
    pub radio_count: u8,
    /// Minimum samples on every radio before a selection is made
    pub avg_sample_count: u16,
    /// Margin a candidate must beat the replying radio by, in tenths of dB
    pub hysteresis_tenth_db: u16,
    /// 0: automatic selection. Otherwise forces radio `radio_select - 1`
    pub radio_select: u8,
}

impl Default for CfgMultiRadio {
    fn default() -> Self {
        Self {
            radio_count: 2,
            avg_sample_count: 64,
            hysteresis_tenth_db: 25,
            radio_select: 0,
        }
    }
}

/// Clear channel assessment parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct CfgCca {
    pub enable: bool,
    pub max_try_count: u8,
    pub retry_time_pll_cycles: u16,
}

#[derive(Debug, Clone, Copy)]
pub struct CfgTdmaSync {
    pub sleep_level: SleepLevel,
    pub setup_time_pll_cycles: u16,
    /// Consecutive lost frames before the slave falls back to syncing
    pub frame_lost_max_count: u16,
    pub sync_word_size_bits: u8,
    pub preamble_size_bits: u16,
    pub pll_startup_xtal_cycles: u8,
    pub cca: CfgCca,
}

impl Default for CfgTdmaSync {
    fn default() -> Self {
        Self {
            sleep_level: SleepLevel::Idle,
            setup_time_pll_cycles: 147,
            frame_lost_max_count: 50,
            sync_word_size_bits: 32,
            preamble_size_bits: 94,
            pll_startup_xtal_cycles: 64,
            cca: CfgCca::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LinkConfig {
    pub debug_log: Option<String>,
    pub fixed_point: CfgFixedPoint,
    pub header: CfgHeader,
    pub rdo: CfgRdo,
    pub channel_hopping: CfgChannelHopping,
    pub saw_arq: CfgSawArq,
    pub lqi: CfgLqi,
    pub multi_radio: CfgMultiRadio,
    pub tdma_sync: CfgTdmaSync,
}

impl LinkConfig {
    /// Validate that all configuration fields are within usable ranges.
    pub fn validate(&self) -> Result<(), &str> {
        if self.multi_radio.radio_count == 0 {
            return Err("multi_radio.radio_count must be at least 1");
        }
        if self.multi_radio.radio_select > self.multi_radio.radio_count {
            return Err("multi_radio.radio_select exceeds radio_count");
        }
        if self.multi_radio.avg_sample_count == 0 {
            return Err("multi_radio.avg_sample_count must be nonzero");
        }
        let sequence = &self.channel_hopping.channel_sequence;
        if sequence.is_empty() || sequence.len() > MAX_HOP_SEQUENCE_SIZE {
            return Err("channel_hopping.channel_sequence must hold 1 to 256 channels");
        }
        if sequence.iter().any(|&c| c as usize >= MAX_CHANNEL_COUNT) {
            return Err("channel_hopping.channel_sequence holds a channel out of range");
        }
        if self.tdma_sync.frame_lost_max_count == 0 {
            return Err("tdma_sync.frame_lost_max_count must be nonzero");
        }
        if self.tdma_sync.cca.enable && self.tdma_sync.cca.retry_time_pll_cycles == 0 {
            return Err("tdma_sync.cca.retry_time_pll_cycles must be nonzero when CCA is enabled");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(LinkConfig::default().validate().is_ok());
    }

    #[test]
    fn test_radio_select_out_of_range() {
        let mut cfg = LinkConfig::default();
        cfg.multi_radio.radio_select = 3;
        assert!(cfg.validate().is_err());
        cfg.multi_radio.radio_select = 2;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_channel_sequence_checked() {
        let mut cfg = LinkConfig::default();
        cfg.channel_hopping.channel_sequence = vec![];
        assert!(cfg.validate().is_err());
        cfg.channel_hopping.channel_sequence = vec![2, 2, 4, 0];
        assert!(cfg.validate().is_ok());
        cfg.channel_hopping.channel_sequence = vec![1, MAX_CHANNEL_COUNT as u8];
        assert!(cfg.validate().is_err());
    }
}
