pub mod channel_hopping;
pub mod header;
pub mod link_protocol;
pub mod lqi;
pub mod multi_radio;
pub mod ranging;
pub mod rdo;
pub mod saw_arq;
pub mod tdma_sync;

pub use channel_hopping::ChannelHopping;
pub use header::{HeaderCfg, LinkMac, configure_header_connection, header_size};
pub use link_protocol::{LinkProtocol, LinkProtocolCfg, LinkProtocolInitCfg, MAX_NUMBER_OF_PROTOCOL};
pub use lqi::{Lqi, LqiSample};
pub use multi_radio::MultiRadio;
pub use ranging::{PhaseData, PhaseInfo};
pub use rdo::LinkRdo;
pub use saw_arq::SawArq;
pub use tdma_sync::{SyncState, TdmaSync};
