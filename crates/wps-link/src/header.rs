//! Connection header assembly.
//!
//! A connection header is a `LinkProtocol` table whose sub-protocols are chosen by `HeaderCfg`
//! and always registered in the same order: channel index, RDO, ranging phases, ranging phase
//! count. Both ends of a connection build their table from the same `HeaderCfg`, which keeps the
//! layouts equal.

use wps_config::{CfgHeader, LinkConfig};
use wps_core::{LinkError, NodeRole};

use crate::channel_hopping::ChannelHopping;
use crate::link_protocol::{LinkProtocol, LinkProtocolCfg, LinkProtocolInitCfg};
use crate::ranging::{PhaseData, RANGING_PHASE_COUNT_PROTO_SIZE, RANGING_PHASES_PROTO_SIZE};
use crate::rdo::{LinkRdo, RDO_PROTO_SIZE};

/// Hopping sequence position
pub const CHANNEL_INDEX_PROTO_SIZE: usize = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderCfg {
    pub channel_index_enabled: bool,
    pub rdo_enabled: bool,
    pub ranging_phase_provider: bool,
    pub ranging_phase_accumulator: bool,
}

impl From<&CfgHeader> for HeaderCfg {
    fn from(cfg: &CfgHeader) -> Self {
        Self {
            channel_index_enabled: cfg.channel_index_enabled,
            rdo_enabled: cfg.rdo_enabled,
            ranging_phase_provider: cfg.ranging_phase_provider,
            ranging_phase_accumulator: cfg.ranging_phase_accumulator,
        }
    }
}

/// Bytes taken by the header fields enabled in `cfg`
pub fn header_size(cfg: &HeaderCfg) -> usize {
    let mut size = 0;
    if cfg.channel_index_enabled {
        size += CHANNEL_INDEX_PROTO_SIZE;
    }
    if cfg.rdo_enabled {
        size += RDO_PROTO_SIZE;
    }
    if cfg.ranging_phase_provider {
        size += RANGING_PHASES_PROTO_SIZE;
    }
    if cfg.ranging_phase_accumulator {
        size += RANGING_PHASE_COUNT_PROTO_SIZE;
    }
    size
}

/// Link state the header sub-protocols read from and write into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMac {
    pub role: NodeRole,
    pub channel_hopping: ChannelHopping,
    pub link_rdo: LinkRdo,
    pub phase_data: PhaseData,
}

impl LinkMac {
    pub fn new(role: NodeRole, cfg: &LinkConfig) -> Result<Self, LinkError> {
        let mut link_rdo = LinkRdo::new(cfg.rdo.rollover);
        link_rdo.set_enabled(cfg.rdo.enabled);
        Ok(Self {
            role,
            channel_hopping: ChannelHopping::from_config(&cfg.channel_hopping)?,
            link_rdo,
            phase_data: PhaseData::default(),
        })
    }

    pub fn send_channel_index(&self, buf: &mut [u8]) {
        match buf.first_mut() {
            Some(dst) => *dst = self.channel_hopping.get_seq_index(),
            None => tracing::warn!("send_channel_index: empty slice"),
        }
    }

    /// Only a node follows the received position, the coordinator keeps its own
    pub fn receive_channel_index(&mut self, buf: &[u8]) {
        match buf.first() {
            Some(&index) if self.role == NodeRole::Node => self.channel_hopping.set_seq_index(index),
            Some(_) => {}
            None => tracing::warn!("receive_channel_index: empty slice"),
        }
    }

    pub fn channel_index_protocol_cfg() -> LinkProtocolCfg<LinkMac> {
        LinkProtocolCfg {
            size: CHANNEL_INDEX_PROTO_SIZE,
            send: |mac: &mut LinkMac, buf: &mut [u8]| mac.send_channel_index(buf),
            receive: |mac: &mut LinkMac, buf: &[u8]| mac.receive_channel_index(buf),
        }
    }
}

impl AsMut<LinkRdo> for LinkMac {
    fn as_mut(&mut self) -> &mut LinkRdo {
        &mut self.link_rdo
    }
}

impl AsMut<PhaseData> for LinkMac {
    fn as_mut(&mut self) -> &mut PhaseData {
        &mut self.phase_data
    }
}

/// Builds the header table for one connection, sized to exactly the enabled fields
pub fn configure_header_connection(cfg: &HeaderCfg) -> Result<LinkProtocol<LinkMac>, LinkError> {
    let mut link_protocol = LinkProtocol::new(LinkProtocolInitCfg {
        buffer_size: header_size(cfg),
    });

    if cfg.channel_index_enabled {
        link_protocol.add(LinkMac::channel_index_protocol_cfg())?;
    }
    if cfg.rdo_enabled {
        link_protocol.add(LinkRdo::protocol_cfg())?;
    }
    if cfg.ranging_phase_provider {
        link_protocol.add(PhaseData::phases_protocol_cfg())?;
    }
    if cfg.ranging_phase_accumulator {
        link_protocol.add(PhaseData::phase_count_protocol_cfg())?;
    }

    tracing::debug!(
        "configure_header_connection: {} fields, {} bytes",
        link_protocol.protocol_count(),
        link_protocol.buffer_size()
    );
    Ok(link_protocol)
}
