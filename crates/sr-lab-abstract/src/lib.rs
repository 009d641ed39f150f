pub mod config;
pub mod interface;
pub mod packet;
pub mod scenario;

pub use interface::{Counters, ProtocolError, SystemContext, TransportProtocol};
pub use packet::{MESSAGE_LEN, Message, MessageError, NOT_IN_USE, Packet, SrHeader};

pub use config::{ConfigError, ProtocolConfig, SimConfig};
pub use scenario::{
    ProtocolConfigOverride, SimConfigOverride, TestAction, TestAssertion, TestScenario,
};
