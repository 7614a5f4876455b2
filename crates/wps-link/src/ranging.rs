//! Ranging phase exchange carried in the connection header.

use crate::link_protocol::LinkProtocolCfg;

/// count + phase1..phase4
pub const RANGING_PHASES_PROTO_SIZE: usize = 5;
pub const RANGING_PHASE_COUNT_PROTO_SIZE: usize = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseInfo {
    pub phase1: u8,
    pub phase2: u8,
    pub phase3: u8,
    pub phase4: u8,
}

impl PhaseInfo {
    fn to_bytes(self) -> [u8; 4] {
        [self.phase1, self.phase2, self.phase3, self.phase4]
    }

    fn from_bytes(b: &[u8]) -> Self {
        Self {
            phase1: b[0],
            phase2: b[1],
            phase3: b[2],
            phase4: b[3],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseData {
    pub local_phases_count: u8,
    pub local_phases_info: PhaseInfo,
    pub remote_phases_count: u8,
    pub remote_phases_info: PhaseInfo,
}

impl PhaseData {
    /// Writes the local count followed by the local phases
    pub fn send_ranging_phases(&self, buf: &mut [u8]) {
        let len = buf.len();
        match buf.get_mut(..RANGING_PHASES_PROTO_SIZE) {
            Some(dst) => {
                dst[0] = self.local_phases_count;
                dst[1..].copy_from_slice(&self.local_phases_info.to_bytes());
            }
            None => tracing::warn!("send_ranging_phases: slice of {} bytes too short", len),
        }
    }

    /// Stores the peer's count and phases
    pub fn receive_ranging_phases(&mut self, buf: &[u8]) {
        match buf.get(..RANGING_PHASES_PROTO_SIZE) {
            Some(src) => {
                self.remote_phases_count = src[0];
                self.remote_phases_info = PhaseInfo::from_bytes(&src[1..]);
            }
            None => tracing::warn!("receive_ranging_phases: slice of {} bytes too short", buf.len()),
        }
    }

    pub fn send_ranging_phase_count(&self, buf: &mut [u8]) {
        match buf.first_mut() {
            Some(dst) => *dst = self.local_phases_count,
            None => tracing::warn!("send_ranging_phase_count: empty slice"),
        }
    }

    /// Adopts the peer's count as the local one
    pub fn receive_ranging_phase_count(&mut self, buf: &[u8]) {
        match buf.first() {
            Some(src) => self.local_phases_count = *src,
            None => tracing::warn!("receive_ranging_phase_count: empty slice"),
        }
    }

    pub fn phases_protocol_cfg<C: AsMut<PhaseData>>() -> LinkProtocolCfg<C> {
        LinkProtocolCfg {
            size: RANGING_PHASES_PROTO_SIZE,
            send: |ctx: &mut C, buf: &mut [u8]| ctx.as_mut().send_ranging_phases(buf),
            receive: |ctx: &mut C, buf: &[u8]| ctx.as_mut().receive_ranging_phases(buf),
        }
    }

    pub fn phase_count_protocol_cfg<C: AsMut<PhaseData>>() -> LinkProtocolCfg<C> {
        LinkProtocolCfg {
            size: RANGING_PHASE_COUNT_PROTO_SIZE,
            send: |ctx: &mut C, buf: &mut [u8]| ctx.as_mut().send_ranging_phase_count(buf),
            receive: |ctx: &mut C, buf: &[u8]| ctx.as_mut().receive_ranging_phase_count(buf),
        }
    }
}

impl AsMut<PhaseData> for PhaseData {
    fn as_mut(&mut self) -> &mut PhaseData {
        self
    }
}
