//! TDMA slave synchronization.
//!
//! Turns the scheduled duration of each frame into the radio's sleep time, power-up delay and
//! RX timeout, and keeps a slave aligned to its coordinator by measuring how long it waited for
//! each frame. All durations are in PLL clock cycles.

use wps_config::{CfgCca, CfgTdmaSync};
use wps_core::{FrameOutcome, SleepLevel};

/// PLL cycles per crystal cycle
pub const PLL_RATIO: u32 = 20;
/// Shift applied to the next wake-up for every frame missed while searching for the coordinator
pub const UNSYNC_OFFSET_PLL_CYCLES: i32 = 64;
/// CCA-delayed frames tolerated before the raw offset is trusted again
const CCA_THRESHOLD_WATCHDOG_COUNT: u32 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Syncing,
    Synced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameType {
    Tx,
    Rx,
}

#[derive(Debug, Clone)]
pub struct TdmaSync {
    sleep_level: SleepLevel,
    sleep_offset_pll_cycles: u32,
    setup_time_pll_cycles: u16,
    timeout_pll_cycles: u32,
    base_target_rx_waited_pll_cycles: u16,
    frame_lost_max_count: u16,
    frame_lost_count: u16,
    slave_sync_state: SyncState,
    cca_unsync_watchdog_count: u32,
    previous_frame_type: Option<FrameType>,
    sync_slave_offset: i32,

    sleep_cycles_value: u32,
    pwr_up_value: u32,
    timeout_value: u32,
}

impl TdmaSync {
    pub fn new(cfg: &CfgTdmaSync) -> Self {
        let setup = cfg.setup_time_pll_cycles as u32;
        let preamble = cfg.preamble_size_bits as u32;
        let syncword = cfg.sync_word_size_bits as u32;
        let base_target = setup + preamble + syncword;

        let sleep_offset_pll_cycles = match cfg.sleep_level {
            SleepLevel::Idle => 1,
            SleepLevel::Shallow => PLL_RATIO,
            SleepLevel::Deep => PLL_RATIO + (cfg.pll_startup_xtal_cycles as u32 + 2) * PLL_RATIO,
        };

        tracing::debug!(
            "new: sleep {:?}, offset {} timeout {} target rx wait {}",
            cfg.sleep_level,
            sleep_offset_pll_cycles,
            2 * setup + preamble + syncword,
            base_target
        );

        Self {
            sleep_level: cfg.sleep_level,
            sleep_offset_pll_cycles,
            setup_time_pll_cycles: cfg.setup_time_pll_cycles,
            timeout_pll_cycles: 2 * setup + preamble + syncword,
            base_target_rx_waited_pll_cycles: u16::try_from(base_target).unwrap_or(u16::MAX),
            frame_lost_max_count: cfg.frame_lost_max_count,
            frame_lost_count: 0,
            slave_sync_state: SyncState::Syncing,
            cca_unsync_watchdog_count: 0,
            previous_frame_type: None,
            sync_slave_offset: 0,
            sleep_cycles_value: 0,
            pwr_up_value: 0,
            timeout_value: 0,
        }
    }

    /// Prepares timing for a frame this device transmits
    pub fn update_tx(&mut self, duration_pll_cycles: u32, cca: &CfgCca) {
        let mut duration = duration_pll_cycles as i64 + self.sync_slave_offset as i64;
        if self.previous_frame_type == Some(FrameType::Rx) {
            duration += self.setup_time_pll_cycles as i64;
        }
        self.previous_frame_type = Some(FrameType::Tx);
        self.sync_update(clamp_duration(duration), cca);
        self.sync_slave_offset = 0;
    }

    /// Prepares timing for a frame this device listens for
    pub fn update_rx(&mut self, duration_pll_cycles: u32, cca: &CfgCca) {
        let mut duration = duration_pll_cycles as i64 + self.sync_slave_offset as i64;
        if self.previous_frame_type == Some(FrameType::Tx) {
            duration -= self.setup_time_pll_cycles as i64;
        }
        self.previous_frame_type = Some(FrameType::Rx);
        self.sync_update(clamp_duration(duration), cca);
        self.sync_slave_offset = 0;
    }

    /// Tracks the coordinator once synced. Lost frames leave the timing untouched and eventually
    /// drop the slave back to `Syncing`.
    pub fn slave_adjust(&mut self, outcome: FrameOutcome, rx_waited_pll_cycles: u16, cca: &CfgCca) {
        if outcome == FrameOutcome::Received {
            self.slave_adjust_frame_rx(rx_waited_pll_cycles, cca);
        } else {
            self.slave_adjust_frame_lost();
        }
    }

    /// Searches for the coordinator. Every missed frame shifts the next wake-up earlier.
    pub fn slave_find(&mut self, outcome: FrameOutcome, rx_waited_pll_cycles: u16, cca: &CfgCca) {
        if outcome == FrameOutcome::Received {
            self.slave_adjust_frame_rx(rx_waited_pll_cycles, cca);
        } else {
            self.sync_slave_offset = -UNSYNC_OFFSET_PLL_CYCLES;
        }
    }

    fn sync_update(&mut self, duration_pll_cycles: u32, cca: &CfgCca) {
        let timeout_pll_cycles = if cca.enable {
            self.timeout_pll_cycles + cca.max_try_count as u32 * cca.retry_time_pll_cycles as u32
        } else {
            self.timeout_pll_cycles
        };

        match self.sleep_level {
            SleepLevel::Shallow | SleepLevel::Deep => {
                let duration = duration_pll_cycles.saturating_sub(self.sleep_offset_pll_cycles);
                self.sleep_cycles_value = duration / PLL_RATIO;
                self.pwr_up_value += duration % PLL_RATIO;
                if self.pwr_up_value > PLL_RATIO {
                    self.sleep_cycles_value += 1;
                    self.pwr_up_value %= PLL_RATIO;
                }
                self.timeout_value = timeout_pll_cycles + self.pwr_up_value;
            }
            SleepLevel::Idle => {
                self.sleep_cycles_value = duration_pll_cycles.saturating_sub(self.sleep_offset_pll_cycles);
                self.pwr_up_value = 0;
                self.timeout_value = timeout_pll_cycles;
            }
        }
    }

    fn slave_adjust_frame_rx(&mut self, rx_waited_pll_cycles: u16, cca: &CfgCca) {
        let base = self.base_target_rx_waited_pll_cycles as i32;
        let retry = cca.retry_time_pll_cycles as i32;
        let mut rx_waited = rx_waited_pll_cycles as i32;
        let mut target = base;

        if self.sleep_level != SleepLevel::Idle {
            rx_waited = (rx_waited - self.pwr_up_value as i32).max(0);
        }
        self.frame_lost_count = 0;

        // Find how many CCA retries delayed the coordinator's transmission
        if cca.enable && rx_waited > base + retry - retry / 2 {
            self.cca_unsync_watchdog_count = self.cca_unsync_watchdog_count.saturating_add(1);
            for i in (0..=cca.max_try_count as i32).rev() {
                let lower = base + retry * i - retry / 2;
                let upper = base + retry * (i + 1) - retry / 2;
                if rx_waited > lower && rx_waited < upper {
                    target = base + retry * i;
                    break;
                }
            }
        }

        if target == base {
            if self.slave_sync_state == SyncState::Syncing {
                tracing::debug!("slave synced, rx waited {} target {}", rx_waited, base);
            }
            self.slave_sync_state = SyncState::Synced;
            self.cca_unsync_watchdog_count = 0;
        }

        self.sync_slave_offset = rx_waited - target;

        if self.cca_unsync_watchdog_count > CCA_THRESHOLD_WATCHDOG_COUNT
            || self.slave_sync_state == SyncState::Syncing
        {
            self.sync_slave_offset = rx_waited - base;
        }
        tracing::trace!("slave_adjust: rx waited {} target {} offset {}", rx_waited, target, self.sync_slave_offset);
    }

    fn slave_adjust_frame_lost(&mut self) {
        self.frame_lost_count = self.frame_lost_count.saturating_add(1);
        self.sync_slave_offset = 0;
        if self.frame_lost_count >= self.frame_lost_max_count {
            if self.slave_sync_state == SyncState::Synced {
                tracing::info!("slave lost sync after {} frames", self.frame_lost_count);
            }
            self.slave_sync_state = SyncState::Syncing;
            self.frame_lost_count = self.frame_lost_max_count;
        }
    }

    pub fn sleep_cycles(&self) -> u32 {
        self.sleep_cycles_value
    }

    pub fn timeout(&self) -> u32 {
        self.timeout_value
    }

    pub fn pwr_up(&self) -> u32 {
        self.pwr_up_value
    }

    pub fn is_slave_synced(&self) -> bool {
        self.slave_sync_state == SyncState::Synced
    }

    pub fn sync_state(&self) -> SyncState {
        self.slave_sync_state
    }

    /// Correction pending for the next `update_tx` / `update_rx`
    pub fn sync_slave_offset(&self) -> i32 {
        self.sync_slave_offset
    }

    /// RX wait measured by a slave that woke up exactly on time
    pub fn base_target_rx_waited(&self) -> u16 {
        self.base_target_rx_waited_pll_cycles
    }

    pub fn frame_lost_count(&self) -> u16 {
        self.frame_lost_count
    }
}

fn clamp_duration(duration: i64) -> u32 {
    duration.clamp(0, u32::MAX as i64) as u32
}
