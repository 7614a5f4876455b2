use wps_config::LinkConfig;
use wps_core::NodeRole;
use wps_link::{HeaderCfg, LinkMac, LinkProtocol, configure_header_connection};

/// Creates a default config for testing, with every header field enabled.
/// It can still be modified before passing it to `LinkPair::new`
pub fn default_test_config() -> LinkConfig {
    let mut cfg = LinkConfig::default();
    cfg.header.channel_index_enabled = true;
    cfg.header.rdo_enabled = true;
    cfg.header.ranging_phase_provider = true;
    cfg.header.ranging_phase_accumulator = true;
    cfg.rdo.rollover = 15;
    cfg
}

/// Both ends of one connection, each with its own header table built from the same config
pub struct LinkPair {
    pub coord: LinkMac,
    pub node: LinkMac,
    coord_header: LinkProtocol<LinkMac>,
    node_header: LinkProtocol<LinkMac>,
    pub frame: Vec<u8>,
}

impl LinkPair {
    pub fn new(cfg: &LinkConfig) -> Self {
        let header_cfg = HeaderCfg::from(&cfg.header);
        let coord_header = configure_header_connection(&header_cfg).unwrap();
        let node_header = configure_header_connection(&header_cfg).unwrap();
        let frame = vec![0u8; coord_header.max_buffer_size()];
        Self {
            coord: LinkMac::new(NodeRole::Coordinator, cfg).unwrap(),
            node: LinkMac::new(NodeRole::Node, cfg).unwrap(),
            coord_header,
            node_header,
            frame,
        }
    }

    /// Coordinator builds a header, node parses it. Returns the header length.
    pub fn coord_to_node(&mut self) -> usize {
        let len = self.coord_header.send_buffer(&mut self.coord, &mut self.frame).unwrap();
        self.node_header.receive_buffer(&mut self.node, &self.frame[..len]).unwrap();
        len
    }

    /// Node builds a header, coordinator parses it. Returns the header length.
    pub fn node_to_coord(&mut self) -> usize {
        let len = self.node_header.send_buffer(&mut self.node, &mut self.frame).unwrap();
        self.coord_header.receive_buffer(&mut self.coord, &self.frame[..len]).unwrap();
        len
    }

    pub fn header_layout(&self) -> Vec<(usize, usize)> {
        self.coord_header.layout().collect()
    }
}
