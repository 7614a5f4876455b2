use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use wps_config::{LinkConfig, toml_config};
use wps_core::{FormatSource, FpError, FpFormat, FpMean, FrameOutcome, LinkError, NodeRole, debug};
use wps_link::{HeaderCfg, LinkMac, LinkProtocol, LqiSample, MultiRadio, SawArq, TdmaSync, configure_header_connection};

/// Lowest level of the simulated receiver gain entry, in tenths of dB
const GAIN_MIN_TENTH_DB: u16 = 100;
/// Scheduled time between two frames
const FRAME_DURATION_PLL_CYCLES: u32 = 20_000;
/// Frame period as seen by the ARQ time to live
const FRAME_DURATION_MS: u64 = 1;
/// Node crystal drift per frame
const DRIFT_PLL_CYCLES_PER_FRAME: i32 = 3;
/// Node starts this far behind the coordinator and has to find it
const INITIAL_CLOCK_ERROR_PLL_CYCLES: i32 = -300;
/// How late the node may wake up and still catch the preamble
const LATE_WAKEUP_MARGIN_PLL_CYCLES: i32 = 16;
/// Receiver codes above this are lost
const SENSITIVITY_CODE: u8 = 44;

/// Load configuration file
fn load_config_from_toml(cfg_path: &str) -> LinkConfig {
    match toml_config::from_file(cfg_path) {
        Ok(c) => c,
        Err(e) => {
            println!("Failed to load configuration from {}: {}", cfg_path, e);
            std::process::exit(1);
        }
    }
}

#[derive(Debug, Default)]
struct SimStats {
    frames: u32,
    received: u32,
    lost_signal: u32,
    lost_timing: u32,
    radio_switches: u32,
    synced_frames: u32,
    dropped: u32,
    channel_mismatch: u32,
}

/// One coordinator and one two-radio node exchanging headers over a simulated channel
struct Simulator {
    cfg: LinkConfig,
    rng: StdRng,
    radio_codes: [u8; 2],

    coord: LinkMac,
    node: LinkMac,
    coord_header: LinkProtocol<LinkMac>,
    node_header: LinkProtocol<LinkMac>,
    frame: Vec<u8>,

    /// Downlink retransmissions, first attempt time and retries of the pending frame
    coord_saw: SawArq,
    pending: Option<(u64, u16)>,

    multi_radio: MultiRadio<2>,
    tdma_sync: TdmaSync,
    clock_error: i32,

    fp: FpFormat,
    timing_error_mean: FpMean,
    rdo_mean: FpMean,
    stats: SimStats,
}

impl Simulator {
    fn new(cfg: LinkConfig, seed: u64, radio_codes: [u8; 2], frames: u32) -> Result<Self, LinkError> {
        let header_cfg = HeaderCfg::from(&cfg.header);
        let coord_header = configure_header_connection(&header_cfg)?;
        let node_header = configure_header_connection(&header_cfg)?;
        let frame = vec![0u8; coord_header.max_buffer_size()];

        let (fp, source) = FpFormat::initialize(cfg.fixed_point.precision_bits, cfg.fixed_point.integer_bits);
        if source != FormatSource::AsRequested {
            tracing::info!("statistics format Q{}.{} ({:?})", fp.integer_bits(), fp.precision(), source);
        }
        let mean_size = u16::try_from(frames).unwrap_or(u16::MAX).max(1);

        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            radio_codes,
            coord: LinkMac::new(NodeRole::Coordinator, &cfg)?,
            node: LinkMac::new(NodeRole::Node, &cfg)?,
            coord_saw: SawArq::from_config(&cfg.saw_arq, false),
            pending: None,
            coord_header,
            node_header,
            frame,
            multi_radio: MultiRadio::new(&cfg.multi_radio, cfg.lqi.mode),
            tdma_sync: TdmaSync::new(&cfg.tdma_sync),
            clock_error: INITIAL_CLOCK_ERROR_PLL_CYCLES,
            fp,
            timing_error_mean: FpMean::new(&fp, mean_size),
            rdo_mean: FpMean::new(&fp, mean_size),
            stats: SimStats::default(),
            cfg,
        })
    }

    /// Radio outcome and measurement for one frame
    fn sample_radio(&mut self, radio: usize) -> (FrameOutcome, LqiSample) {
        let jitter = self.rng.random_range(-3..=3i16);
        let code = (self.radio_codes[radio] as i16 + jitter).clamp(0, 47) as u8;
        let noise = self.rng.random_range(40..=47u8);
        let sample = LqiSample::from_raw(GAIN_MIN_TENTH_DB, code, noise);
        let outcome = if code > SENSITIVITY_CODE || self.rng.random_bool(0.02) {
            FrameOutcome::Lost
        } else {
            FrameOutcome::Received
        };
        (outcome, sample)
    }

    fn step(&mut self, n: u32) -> Result<(), LinkError> {
        self.stats.frames += 1;
        let now_ms = n as u64 * FRAME_DURATION_MS;
        if self.node.channel_hopping.get_channel() != self.coord.channel_hopping.get_channel() {
            self.stats.channel_mismatch += 1;
        }
        let len = self.coord_header.send_buffer(&mut self.coord, &mut self.frame)?;

        let replying = self.multi_radio.get_replying_radio();
        let mut outcome = FrameOutcome::Lost;
        for radio in 0..2u8 {
            let (radio_outcome, sample) = self.sample_radio(radio as usize);
            self.multi_radio.update_radio(radio, radio_outcome, sample);
            if radio == replying {
                outcome = radio_outcome;
            }
        }
        self.multi_radio.update();
        if self.multi_radio.get_replying_radio() != replying {
            self.stats.radio_switches += 1;
        }

        // Node clock drifts, a late wake-up misses the frame whatever the signal
        self.clock_error += DRIFT_PLL_CYCLES_PER_FRAME;
        if outcome == FrameOutcome::Received && self.clock_error < -LATE_WAKEUP_MARGIN_PLL_CYCLES {
            self.stats.lost_timing += 1;
            outcome = FrameOutcome::Lost;
        } else if outcome != FrameOutcome::Received {
            self.stats.lost_signal += 1;
        }

        let base = self.tdma_sync.base_target_rx_waited() as i32;
        let rx_waited = (base + self.clock_error).clamp(0, u16::MAX as i32) as u16;
        if self.tdma_sync.is_slave_synced() {
            self.tdma_sync.slave_adjust(outcome, rx_waited, &self.cfg.tdma_sync.cca);
        } else {
            self.tdma_sync.slave_find(outcome, rx_waited, &self.cfg.tdma_sync.cca);
        }
        // The pending offset lengthens or shortens the next sleep
        self.clock_error -= self.tdma_sync.sync_slave_offset();
        self.tdma_sync.update_rx(FRAME_DURATION_PLL_CYCLES, &self.cfg.tdma_sync.cca);

        if outcome == FrameOutcome::Received {
            self.stats.received += 1;
            self.node_header.receive_buffer(&mut self.node, &self.frame[..len])?;
            self.rdo_mean.add(self.fp.int_to_q(self.node.link_rdo.get_offset() as i32));
        } else {
            // The node still keeps its own counter running
            self.node.link_rdo.set_offset(None);
        }
        self.update_arq(outcome, now_ms);

        // Both ends hop every frame, the node realigns whenever it hears the coordinator
        self.coord.channel_hopping.increment_sequence(1);
        self.node.channel_hopping.increment_sequence(1);

        if self.tdma_sync.is_slave_synced() {
            self.stats.synced_frames += 1;
        }
        self.timing_error_mean.add(self.fp.int_to_q(self.clock_error.abs()));

        tracing::trace!(
            frame = n,
            "{:?} on radio {} clock error {} sleep {} timeout {}",
            outcome,
            replying,
            self.clock_error,
            self.tdma_sync.sleep_cycles(),
            self.tdma_sync.timeout()
        );
        if n % 100 == 0 {
            tracing::info!(
                frame = n,
                "received {}/{} synced {} replying radio {}",
                self.stats.received,
                self.stats.frames,
                self.tdma_sync.is_slave_synced(),
                self.multi_radio.get_replying_radio()
            );
        }
        Ok(())
    }

    /// Retries the pending downlink frame until it gets through or outlives its TTL
    fn update_arq(&mut self, outcome: FrameOutcome, now_ms: u64) {
        let (first_tx, retries) = self.pending.unwrap_or((now_ms, 0));
        if outcome == FrameOutcome::Received {
            self.coord_saw.inc_seq_num();
            self.pending = None;
        } else if self.coord_saw.is_frame_timeout(first_tx, retries, now_ms) {
            self.stats.dropped += 1;
            self.coord_saw.inc_seq_num();
            self.pending = None;
        } else {
            self.pending = Some((first_tx, retries.saturating_add(1)));
        }
    }

    fn mean_as_float(&self, mean: &FpMean) -> f32 {
        let count = mean.index().min(mean.max_size());
        if count == 0 {
            return 0.0;
        }
        match mean.calculate(count) {
            Ok(q) => self.fp.q_to_float(q),
            Err(e) => {
                tracing::warn!("mean_as_float: {}", e);
                0.0
            }
        }
    }

    /// Received share of all frames. The counts are scaled down first so large runs still fit
    /// the integer range of the statistics format.
    fn reception_ratio(&self) -> Result<f32, FpError> {
        let frame_bits = u32::BITS - self.stats.frames.leading_zeros();
        let shift = frame_bits.saturating_sub(self.fp.integer_bits() as u32);
        let received = self.fp.int_to_q((self.stats.received >> shift) as i32);
        let frames = self.fp.int_to_q((self.stats.frames >> shift) as i32);
        Ok(self.fp.q_to_float(self.fp.division(received, frames)?))
    }

    fn print_summary(&self) {
        let s = &self.stats;
        println!("frames:             {}", s.frames);
        println!("received:           {}", s.received);
        match self.reception_ratio() {
            Ok(r) => println!("reception ratio:    {:.3}", r),
            Err(e) => println!("reception ratio:    n/a ({})", e),
        }
        println!("lost (signal):      {}", s.lost_signal);
        println!("lost (timing):      {}", s.lost_timing);
        println!("synced frames:      {}", s.synced_frames);
        println!("slave synced:       {}", self.tdma_sync.is_slave_synced());
        println!("radio switches:     {}", s.radio_switches);
        println!("dropped frames:     {}", s.dropped);
        println!("arq retries:        {}", self.coord_saw.retry_count());
        println!("off-channel frames: {}", s.channel_mismatch);
        println!("replying radio:     {}", self.multi_radio.get_replying_radio());
        println!("header bytes:       {}", self.coord_header.buffer_size());
        println!("mean |clock error|: {:.2} PLL cycles", self.mean_as_float(&self.timing_error_mean));
        println!("mean rdo offset:    {:.2}", self.mean_as_float(&self.rdo_mean));
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "WPS link layer simulator",
    long_about = "Runs a coordinator and a two-radio node through the link layer using the provided TOML configuration"
)]
struct Args {
    /// Config file (required)
    #[arg(help = "TOML config with link layer parameters")]
    config: String,

    /// Number of frames to simulate
    #[arg(long, default_value_t = 1000)]
    frames: u32,

    /// Seed for the simulated channel
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Mean receiver code of each node radio, lower is stronger
    #[arg(long, value_delimiter = ',', default_value = "20,12")]
    radio_rssi: Vec<u8>,
}

fn main() {
    eprintln!(" -> WPS link layer simulator\n");

    let args = Args::parse();
    let cfg = load_config_from_toml(&args.config);
    let _log_guard = match debug::setup_logging_default(cfg.debug_log.clone()) {
        Ok(g) => g,
        Err(e) => {
            println!("Failed to open log file: {}", e);
            std::process::exit(1);
        }
    };

    if cfg.multi_radio.radio_count != 2 {
        println!("Simulator needs multi_radio.radio_count = 2, got {}", cfg.multi_radio.radio_count);
        std::process::exit(1);
    }
    let radio_codes: [u8; 2] = match args.radio_rssi.as_slice() {
        [a, b] => [*a, *b],
        other => {
            println!("--radio-rssi takes two values, got {}", other.len());
            std::process::exit(1);
        }
    };

    let mut sim = match Simulator::new(cfg, args.seed, radio_codes, args.frames) {
        Ok(s) => s,
        Err(e) => {
            println!("Failed to build connection header: {}", e);
            std::process::exit(1);
        }
    };

    // Set up Ctrl+C handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        tracing::warn!("failed to set Ctrl+C handler: {}", e);
    }

    for n in 0..args.frames {
        if !running.load(Ordering::SeqCst) {
            tracing::info!(frame = n, "stopped");
            break;
        }
        if let Err(e) = sim.step(n) {
            tracing::error!(frame = n, "{}", e);
            break;
        }
    }

    sim.print_summary();
}
