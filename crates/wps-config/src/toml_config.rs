use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use toml::Value;
use wps_core::{LqiMode, SleepLevel};

use super::link_config::{
    CfgCca, CfgChannelHopping, CfgFixedPoint, CfgHeader, CfgLqi, CfgMultiRadio, CfgRdo, CfgSawArq, CfgTdmaSync, LinkConfig,
};

const EXPECTED_CONFIG_VERSION: &str = "0.1";

/// Build `LinkConfig` from a TOML configuration string
pub fn from_toml_str(toml_str: &str) -> Result<LinkConfig, Box<dyn std::error::Error>> {
    let root: TomlConfigRoot = toml::from_str(toml_str)?;

    if !root.config_version.eq(EXPECTED_CONFIG_VERSION) {
        return Err(format!(
            "Unrecognized config_version: {}, expect {}",
            root.config_version, EXPECTED_CONFIG_VERSION
        )
        .into());
    }
    if !root.extra.is_empty() {
        return Err(format!("Unrecognized top-level fields: {:?}", sorted_keys(&root.extra)).into());
    }
    check_extra("fixed_point", root.fixed_point.as_ref().map(|d| &d.extra))?;
    check_extra("header", root.header.as_ref().map(|d| &d.extra))?;
    check_extra("rdo", root.rdo.as_ref().map(|d| &d.extra))?;
    check_extra("channel_hopping", root.channel_hopping.as_ref().map(|d| &d.extra))?;
    check_extra("saw_arq", root.saw_arq.as_ref().map(|d| &d.extra))?;
    check_extra("lqi", root.lqi.as_ref().map(|d| &d.extra))?;
    check_extra("multi_radio", root.multi_radio.as_ref().map(|d| &d.extra))?;
    if let Some(ref ts) = root.tdma_sync {
        check_extra("tdma_sync", Some(&ts.extra))?;
        check_extra("tdma_sync.cca", ts.cca.as_ref().map(|d| &d.extra))?;
    }

    let mut cfg = LinkConfig {
        debug_log: root.debug_log,
        ..Default::default()
    };

    if let Some(fp) = root.fixed_point {
        apply_fixed_point_patch(&mut cfg.fixed_point, fp);
    }
    if let Some(h) = root.header {
        apply_header_patch(&mut cfg.header, h);
    }
    if let Some(r) = root.rdo {
        apply_rdo_patch(&mut cfg.rdo, r);
    }
    if let Some(ch) = root.channel_hopping {
        apply_channel_hopping_patch(&mut cfg.channel_hopping, ch);
    }
    if let Some(saw) = root.saw_arq {
        apply_saw_arq_patch(&mut cfg.saw_arq, saw);
    }
    if let Some(l) = root.lqi {
        apply_lqi_patch(&mut cfg.lqi, l);
    }
    if let Some(mr) = root.multi_radio {
        apply_multi_radio_patch(&mut cfg.multi_radio, mr);
    }
    if let Some(ts) = root.tdma_sync {
        apply_tdma_sync_patch(&mut cfg.tdma_sync, ts);
    }

    cfg.validate().map_err(|e| format!("Invalid link configuration: {}", e))?;
    tracing::debug!("loaded link config: {:?}", cfg);

    Ok(cfg)
}

/// Build `LinkConfig` from any reader.
pub fn from_reader<R: Read>(reader: R) -> Result<LinkConfig, Box<dyn std::error::Error>> {
    let mut contents = String::new();
    let mut reader = BufReader::new(reader);
    reader.read_to_string(&mut contents)?;
    from_toml_str(&contents)
}

/// Build `LinkConfig` from a file path.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<LinkConfig, Box<dyn std::error::Error>> {
    let f = File::open(path)?;
    from_reader(f)
}

fn check_extra(section: &str, extra: Option<&HashMap<String, Value>>) -> Result<(), String> {
    match extra {
        Some(extra) if !extra.is_empty() => Err(format!("Unrecognized fields: {}::{:?}", section, sorted_keys(extra))),
        _ => Ok(()),
    }
}

fn apply_fixed_point_patch(dst: &mut CfgFixedPoint, src: FixedPointDto) {
    if let Some(v) = src.precision_bits {
        dst.precision_bits = v;
    }
    if let Some(v) = src.integer_bits {
        dst.integer_bits = v;
    }
}

fn apply_header_patch(dst: &mut CfgHeader, src: HeaderDto) {
    if let Some(v) = src.channel_index_enabled {
        dst.channel_index_enabled = v;
    }
    if let Some(v) = src.rdo_enabled {
        dst.rdo_enabled = v;
    }
    if let Some(v) = src.ranging_phase_provider {
        dst.ranging_phase_provider = v;
    }
    if let Some(v) = src.ranging_phase_accumulator {
        dst.ranging_phase_accumulator = v;
    }
}

fn apply_rdo_patch(dst: &mut CfgRdo, src: RdoDto) {
    if let Some(v) = src.rollover {
        dst.rollover = v;
    }
    if let Some(v) = src.enabled {
        dst.enabled = v;
    }
}

fn apply_channel_hopping_patch(dst: &mut CfgChannelHopping, src: ChannelHoppingDto) {
    if let Some(v) = src.channel_sequence {
        dst.channel_sequence = v;
    }
    if let Some(v) = src.random_sequence_enabled {
        dst.random_sequence_enabled = v;
    }
    if let Some(v) = src.random_sequence_seed {
        dst.random_sequence_seed = v;
    }
}

fn apply_saw_arq_patch(dst: &mut CfgSawArq, src: SawArqDto) {
    if let Some(v) = src.enabled {
        dst.enabled = v;
    }
    if let Some(v) = src.ttl_ms {
        dst.ttl_ms = v;
    }
    if let Some(v) = src.ttl_retries {
        dst.ttl_retries = v;
    }
}

fn apply_lqi_patch(dst: &mut CfgLqi, src: LqiDto) {
    if let Some(v) = src.mode {
        dst.mode = v;
    }
}

fn apply_multi_radio_patch(dst: &mut CfgMultiRadio, src: MultiRadioDto) {
    if let Some(v) = src.radio_count {
        dst.radio_count = v;
    }
    if let Some(v) = src.avg_sample_count {
        dst.avg_sample_count = v;
    }
    if let Some(v) = src.hysteresis_tenth_db {
        dst.hysteresis_tenth_db = v;
    }
    if let Some(v) = src.radio_select {
        dst.radio_select = v;
    }
}

fn apply_tdma_sync_patch(dst: &mut CfgTdmaSync, src: TdmaSyncDto) {
    if let Some(v) = src.sleep_level {
        dst.sleep_level = v;
    }
    if let Some(v) = src.setup_time_pll_cycles {
        dst.setup_time_pll_cycles = v;
    }
    if let Some(v) = src.frame_lost_max_count {
        dst.frame_lost_max_count = v;
    }
    if let Some(v) = src.sync_word_size_bits {
        dst.sync_word_size_bits = v;
    }
    if let Some(v) = src.preamble_size_bits {
        dst.preamble_size_bits = v;
    }
    if let Some(v) = src.pll_startup_xtal_cycles {
        dst.pll_startup_xtal_cycles = v;
    }
    if let Some(cca) = src.cca {
        dst.cca = CfgCca {
            enable: cca.enable.unwrap_or(dst.cca.enable),
            max_try_count: cca.max_try_count.unwrap_or(dst.cca.max_try_count),
            retry_time_pll_cycles: cca.retry_time_pll_cycles.unwrap_or(dst.cca.retry_time_pll_cycles),
        };
    }
}

fn sorted_keys(map: &HashMap<String, Value>) -> Vec<&str> {
    let mut v: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
    v.sort_unstable();
    v
}

/// ----------------------- DTOs for input shape -----------------------

#[derive(Deserialize)]
struct TomlConfigRoot {
    config_version: String,
    debug_log: Option<String>,

    #[serde(default)]
    fixed_point: Option<FixedPointDto>,

    #[serde(default)]
    header: Option<HeaderDto>,

    #[serde(default)]
    rdo: Option<RdoDto>,

    #[serde(default)]
    channel_hopping: Option<ChannelHoppingDto>,

    #[serde(default)]
    saw_arq: Option<SawArqDto>,

    #[serde(default)]
    lqi: Option<LqiDto>,

    #[serde(default)]
    multi_radio: Option<MultiRadioDto>,

    #[serde(default)]
    tdma_sync: Option<TdmaSyncDto>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct FixedPointDto {
    pub precision_bits: Option<u8>,
    pub integer_bits: Option<u8>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct HeaderDto {
    pub channel_index_enabled: Option<bool>,
    pub rdo_enabled: Option<bool>,
    pub ranging_phase_provider: Option<bool>,
    pub ranging_phase_accumulator: Option<bool>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct RdoDto {
    pub rollover: Option<u16>,
    pub enabled: Option<bool>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct ChannelHoppingDto {
    pub channel_sequence: Option<Vec<u8>>,
    pub random_sequence_enabled: Option<bool>,
    pub random_sequence_seed: Option<u8>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct SawArqDto {
    pub enabled: Option<bool>,
    pub ttl_ms: Option<u16>,
    pub ttl_retries: Option<u16>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct LqiDto {
    pub mode: Option<LqiMode>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct MultiRadioDto {
    pub radio_count: Option<u8>,
    pub avg_sample_count: Option<u16>,
    pub hysteresis_tenth_db: Option<u16>,
    pub radio_select: Option<u8>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct TdmaSyncDto {
    pub sleep_level: Option<SleepLevel>,
    pub setup_time_pll_cycles: Option<u16>,
    pub frame_lost_max_count: Option<u16>,
    pub sync_word_size_bits: Option<u8>,
    pub preamble_size_bits: Option<u16>,
    pub pll_startup_xtal_cycles: Option<u8>,

    #[serde(default)]
    pub cca: Option<CcaDto>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct CcaDto {
    pub enable: Option<bool>,
    pub max_try_count: Option<u8>,
    pub retry_time_pll_cycles: Option<u16>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}
