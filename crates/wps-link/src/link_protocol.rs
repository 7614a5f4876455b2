//! Sub-protocol multiplexer for the link layer header.
//!
//! Several independent sub-protocols share one frame buffer. Each one owns a fixed-size slice,
//! placed right after the slice of the protocol registered before it. On transmit every
//! protocol serializes into its slice; on receive every protocol deserializes from it. Both ends
//! of a link must register the same protocols in the same order.
//!
//! The protocol callbacks do not hold their state themselves. The caller passes a context `C`
//! (typically the MAC instance) into `send_buffer` / `receive_buffer`, and each callback
//! borrows it for the duration of its call.

use heapless::Vec;
use wps_core::LinkError;

/// Maximum number of sub-protocols in one table
pub const MAX_NUMBER_OF_PROTOCOL: usize = 10;

/// Serializes into a slice of exactly the registered size
pub type SendFn<C> = fn(&mut C, &mut [u8]);
/// Deserializes from a slice of exactly the registered size
pub type ReceiveFn<C> = fn(&mut C, &[u8]);

#[derive(Debug, Clone, Copy)]
pub struct LinkProtocolInitCfg {
    /// Total bytes available to all sub-protocols
    pub buffer_size: usize,
}

/// Registration data for one sub-protocol
pub struct LinkProtocolCfg<C> {
    pub size: usize,
    pub send: SendFn<C>,
    pub receive: ReceiveFn<C>,
}

// Manual impls: fn pointers are Copy regardless of C
impl<C> Clone for LinkProtocolCfg<C> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<C> Copy for LinkProtocolCfg<C> {}

struct ProtocolInfo<C> {
    /// Byte offset of this protocol's slice in the frame
    index: usize,
    size: usize,
    send: SendFn<C>,
    receive: ReceiveFn<C>,
}

pub struct LinkProtocol<C, const N: usize = MAX_NUMBER_OF_PROTOCOL> {
    protocol_info: Vec<ProtocolInfo<C>, N>,
    max_buffer_size: usize,
    current_buffer_offset: usize,
}

impl<C, const N: usize> LinkProtocol<C, N> {
    /// Creates an empty table that may use up to `cfg.buffer_size` bytes
    pub fn new(cfg: LinkProtocolInitCfg) -> Self {
        Self {
            protocol_info: Vec::new(),
            max_buffer_size: cfg.buffer_size,
            current_buffer_offset: 0,
        }
    }

    /// Appends a sub-protocol. Its slice starts where the previous one ended.
    /// On error the table is left unchanged.
    pub fn add(&mut self, protocol_cfg: LinkProtocolCfg<C>) -> Result<(), LinkError> {
        if self.protocol_info.is_full() {
            return Err(LinkError::TooManyProtocols { max: N });
        }
        let available = self.max_buffer_size - self.current_buffer_offset;
        if protocol_cfg.size > available {
            return Err(LinkError::NoMoreSpace {
                requested: protocol_cfg.size,
                available,
            });
        }

        let info = ProtocolInfo {
            index: self.current_buffer_offset,
            size: protocol_cfg.size,
            send: protocol_cfg.send,
            receive: protocol_cfg.receive,
        };
        tracing::debug!(
            "add: protocol {} at [{}..{}] of {}",
            self.protocol_info.len(),
            info.index,
            info.index + info.size,
            self.max_buffer_size
        );
        if self.protocol_info.push(info).is_err() {
            // Unreachable, fullness was checked above
            return Err(LinkError::TooManyProtocols { max: N });
        }
        self.current_buffer_offset += protocol_cfg.size;
        Ok(())
    }

    /// Lets every protocol serialize into its slice, in registration order.
    /// Returns the number of header bytes produced.
    pub fn send_buffer(&self, ctx: &mut C, buffer_to_send: &mut [u8]) -> Result<usize, LinkError> {
        self.check_len(buffer_to_send.len())?;
        for proto in self.protocol_info.iter() {
            (proto.send)(ctx, &mut buffer_to_send[proto.index..proto.index + proto.size]);
        }
        tracing::trace!("send_buffer: {} bytes", self.current_buffer_offset);
        Ok(self.current_buffer_offset)
    }

    /// Lets every protocol deserialize from its slice, in registration order.
    pub fn receive_buffer(&self, ctx: &mut C, received_buffer: &[u8]) -> Result<(), LinkError> {
        self.check_len(received_buffer.len())?;
        for proto in self.protocol_info.iter() {
            (proto.receive)(ctx, &received_buffer[proto.index..proto.index + proto.size]);
        }
        tracing::trace!("receive_buffer: {} bytes", self.current_buffer_offset);
        Ok(())
    }

    fn check_len(&self, len: usize) -> Result<(), LinkError> {
        if len < self.current_buffer_offset {
            tracing::warn!("frame buffer of {} bytes, layout needs {}", len, self.current_buffer_offset);
            return Err(LinkError::BufferTooSmall {
                needed: self.current_buffer_offset,
                available: len,
            });
        }
        Ok(())
    }

    pub fn protocol_count(&self) -> usize {
        self.protocol_info.len()
    }

    /// Bytes used by the registered protocols
    pub fn buffer_size(&self) -> usize {
        self.current_buffer_offset
    }

    pub fn max_buffer_size(&self) -> usize {
        self.max_buffer_size
    }

    /// `(index, size)` of every registered protocol, in wire order
    pub fn layout(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.protocol_info.iter().map(|p| (p.index, p.size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counters {
        tx: [u8; 3],
        rx: [u8; 3],
        calls: usize,
    }

    fn send_a(c: &mut Counters, buf: &mut [u8]) {
        c.calls += 1;
        buf.fill(c.tx[0]);
    }
    fn recv_a(c: &mut Counters, buf: &[u8]) {
        c.rx[0] = buf[0];
    }
    fn send_b(c: &mut Counters, buf: &mut [u8]) {
        c.calls += 1;
        buf.fill(c.tx[1]);
    }
    fn recv_b(c: &mut Counters, buf: &[u8]) {
        assert!(buf.iter().all(|b| *b == buf[0]));
        c.rx[1] = buf[0];
    }
    fn send_c(c: &mut Counters, buf: &mut [u8]) {
        c.calls += 1;
        buf.fill(c.tx[2]);
    }
    fn recv_c(c: &mut Counters, buf: &[u8]) {
        c.rx[2] = buf[0];
    }

    fn cfg(size: usize, send: SendFn<Counters>, receive: ReceiveFn<Counters>) -> LinkProtocolCfg<Counters> {
        LinkProtocolCfg { size, send, receive }
    }

    #[test]
    fn test_layout_and_no_more_space() {
        let mut lp: LinkProtocol<Counters> = LinkProtocol::new(LinkProtocolInitCfg { buffer_size: 8 });
        lp.add(cfg(2, send_a, recv_a)).unwrap();
        lp.add(cfg(3, send_b, recv_b)).unwrap();
        lp.add(cfg(1, send_c, recv_c)).unwrap();
        assert_eq!(lp.layout().collect::<std::vec::Vec<_>>(), vec![(0, 2), (2, 3), (5, 1)]);
        assert_eq!(lp.buffer_size(), 6);

        let err = lp.add(cfg(3, send_a, recv_a)).unwrap_err();
        assert_eq!(err, LinkError::NoMoreSpace { requested: 3, available: 2 });
        assert_eq!(lp.protocol_count(), 3);
        assert_eq!(lp.buffer_size(), 6);

        // What is left still fits exactly
        lp.add(cfg(2, send_a, recv_a)).unwrap();
        assert_eq!(lp.buffer_size(), 8);
    }

    #[test]
    fn test_too_many_protocols() {
        let mut lp: LinkProtocol<Counters, 2> = LinkProtocol::new(LinkProtocolInitCfg { buffer_size: 100 });
        lp.add(cfg(1, send_a, recv_a)).unwrap();
        lp.add(cfg(1, send_b, recv_b)).unwrap();
        assert_eq!(lp.add(cfg(1, send_c, recv_c)), Err(LinkError::TooManyProtocols { max: 2 }));
        assert_eq!(lp.protocol_count(), 2);
        assert_eq!(lp.buffer_size(), 2);
    }

    #[test]
    fn test_send_receive_roundtrip() {
        let mut lp: LinkProtocol<Counters> = LinkProtocol::new(LinkProtocolInitCfg { buffer_size: 6 });
        lp.add(cfg(2, send_a, recv_a)).unwrap();
        lp.add(cfg(3, send_b, recv_b)).unwrap();
        lp.add(cfg(1, send_c, recv_c)).unwrap();

        let mut tx = Counters { tx: [0x11, 0x22, 0x33], ..Default::default() };
        let mut frame = [0u8; 6];
        assert_eq!(lp.send_buffer(&mut tx, &mut frame), Ok(6));
        assert_eq!(frame, [0x11, 0x11, 0x22, 0x22, 0x22, 0x33]);
        assert_eq!(tx.calls, 3);

        let mut rx = Counters::default();
        lp.receive_buffer(&mut rx, &frame).unwrap();
        assert_eq!(rx.rx, tx.tx);
    }

    #[test]
    fn test_short_buffer_rejected() {
        let mut lp: LinkProtocol<Counters> = LinkProtocol::new(LinkProtocolInitCfg { buffer_size: 6 });
        lp.add(cfg(2, send_a, recv_a)).unwrap();
        lp.add(cfg(3, send_b, recv_b)).unwrap();

        let mut ctx = Counters::default();
        let mut frame = [0u8; 4];
        assert_eq!(
            lp.send_buffer(&mut ctx, &mut frame),
            Err(LinkError::BufferTooSmall { needed: 5, available: 4 })
        );
        assert_eq!(ctx.calls, 0);
        assert!(lp.receive_buffer(&mut ctx, &frame).is_err());

        // Longer buffers are fine, trailing bytes belong to the payload
        let mut frame = [0xEEu8; 10];
        assert_eq!(lp.send_buffer(&mut ctx, &mut frame), Ok(5));
        assert_eq!(frame[5..], [0xEE; 5]);
    }

    #[test]
    fn test_empty_table() {
        let lp: LinkProtocol<Counters> = LinkProtocol::new(LinkProtocolInitCfg { buffer_size: 0 });
        let mut ctx = Counters::default();
        assert_eq!(lp.send_buffer(&mut ctx, &mut []), Ok(0));
        assert!(lp.receive_buffer(&mut ctx, &[]).is_ok());
    }
}
