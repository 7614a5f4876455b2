//! Random datarate offset.
//!
//! A small counter advanced on every frame and exchanged in the header, so that devices sharing
//! a channel drift apart in time instead of colliding repeatedly. The offset is added to the
//! MAC sleep time.

use crate::link_protocol::LinkProtocolCfg;

pub const DEFAULT_ROLLOVER: u16 = 15;

/// Bytes taken by the offset in the frame header (big-endian u16)
pub const RDO_PROTO_SIZE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRdo {
    offset: u16,
    enabled: bool,
    rollover_n: u16,
}

impl LinkRdo {
    /// A `target_rollover_value` of 0 selects `DEFAULT_ROLLOVER`
    pub fn new(target_rollover_value: u16) -> Self {
        let rollover_n = if target_rollover_value == 0 {
            DEFAULT_ROLLOVER
        } else {
            target_rollover_value
        };
        Self {
            offset: 0,
            enabled: true,
            rollover_n,
        }
    }

    fn update_offset(&mut self) {
        self.offset = (self.offset + 1) % self.rollover_n;
    }

    /// Advances the counter, then writes it big-endian into `buffer_to_send` if given.
    pub fn send_offset(&mut self, buffer_to_send: Option<&mut [u8]>) {
        self.update_offset();
        if let Some(buf) = buffer_to_send {
            let len = buf.len();
            match buf.get_mut(..RDO_PROTO_SIZE) {
                Some(dst) => dst.copy_from_slice(&self.offset.to_be_bytes()),
                None => tracing::warn!("send_offset: slice of {} bytes too short", len),
            }
        }
    }

    /// Advances the counter, then replaces it with the peer's value read from `buffer_received`
    /// if given. The received value is reduced modulo the local rollover.
    pub fn set_offset(&mut self, buffer_received: Option<&[u8]>) {
        self.update_offset();
        if let Some(buf) = buffer_received {
            match buf.get(..RDO_PROTO_SIZE) {
                Some(src) => {
                    let received = u16::from_be_bytes([src[0], src[1]]);
                    if received >= self.rollover_n {
                        tracing::debug!("set_offset: peer offset {} outside rollover {}", received, self.rollover_n);
                    }
                    self.offset = received % self.rollover_n;
                }
                None => tracing::warn!("set_offset: slice of {} bytes too short", buf.len()),
            }
        }
    }

    /// Offset to apply to timing; always 0 while disabled
    pub fn get_offset(&self) -> u16 {
        if self.enabled { self.offset } else { 0 }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn rollover(&self) -> u16 {
        self.rollover_n
    }

    /// Header registration for any context that can lend out its RDO instance
    pub fn protocol_cfg<C: AsMut<LinkRdo>>() -> LinkProtocolCfg<C> {
        LinkProtocolCfg {
            size: RDO_PROTO_SIZE,
            send: |ctx: &mut C, buf: &mut [u8]| ctx.as_mut().send_offset(Some(buf)),
            receive: |ctx: &mut C, buf: &[u8]| ctx.as_mut().set_offset(Some(buf)),
        }
    }
}

impl AsMut<LinkRdo> for LinkRdo {
    fn as_mut(&mut self) -> &mut LinkRdo {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link_protocol::{LinkProtocol, LinkProtocolInitCfg};

    #[test]
    fn test_rollover_sequence() {
        let mut rdo = LinkRdo::new(5);
        let mut seq = vec![];
        for _ in 0..10 {
            rdo.send_offset(None);
            seq.push(rdo.get_offset());
        }
        assert_eq!(seq, vec![1, 2, 3, 4, 0, 1, 2, 3, 4, 0]);
    }

    #[test]
    fn test_default_rollover() {
        let mut rdo = LinkRdo::new(0);
        assert_eq!(rdo.rollover(), 15);
        for _ in 0..15 {
            rdo.send_offset(None);
        }
        assert_eq!(rdo.get_offset(), 0);
    }

    #[test]
    fn test_wire_format_big_endian() {
        let mut rdo = LinkRdo::new(1000);
        for _ in 0..299 {
            rdo.send_offset(None);
        }
        let mut buf = [0u8; 2];
        rdo.send_offset(Some(&mut buf));
        assert_eq!(rdo.get_offset(), 300);
        assert_eq!(buf, [0x01, 0x2C]);
    }

    #[test]
    fn test_set_offset_replaces_counter() {
        let mut rdo = LinkRdo::new(1000);
        rdo.set_offset(Some(&[0x00, 0x07]));
        assert_eq!(rdo.get_offset(), 7);
        // Without a buffer only the local increment applies
        rdo.set_offset(None);
        assert_eq!(rdo.get_offset(), 8);
    }

    #[test]
    fn test_disabled_returns_zero() {
        let mut rdo = LinkRdo::new(5);
        rdo.set_enabled(false);
        for _ in 0..7 {
            rdo.send_offset(None);
            assert_eq!(rdo.get_offset(), 0);
        }
        rdo.set_enabled(true);
        assert_eq!(rdo.get_offset(), 2);
    }

    #[test]
    fn test_rdo_as_registered_protocol() {
        let mut lp: LinkProtocol<LinkRdo> = LinkProtocol::new(LinkProtocolInitCfg { buffer_size: RDO_PROTO_SIZE });
        lp.add(LinkRdo::protocol_cfg()).unwrap();

        let mut tx = LinkRdo::new(15);
        let mut rx = LinkRdo::new(15);
        let mut frame = [0u8; RDO_PROTO_SIZE];
        for _ in 0..20 {
            lp.send_buffer(&mut tx, &mut frame).unwrap();
            lp.receive_buffer(&mut rx, &frame).unwrap();
            assert_eq!(rx.get_offset(), tx.get_offset());
        }
    }
}
