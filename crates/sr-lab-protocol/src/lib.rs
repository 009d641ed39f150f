//! Selective Repeat sender and receiver state machines.
//! Provides the checksum and sequence-space helpers both sides share.

pub mod checksum;
pub mod receiver;
pub mod sender;
pub mod seq;
pub mod window;

#[cfg(test)]
mod test_support;

pub use receiver::SrReceiver;
pub use sender::{SenderState, SrSender};
pub use sr_lab_abstract::{
    ConfigError, Message, Packet, ProtocolConfig, SystemContext, TransportProtocol,
};
pub use window::Slot;

pub fn sender(config: ProtocolConfig) -> Result<Box<dyn TransportProtocol>, ConfigError> {
    Ok(Box::new(SrSender::new(config)?))
}

pub fn receiver(config: ProtocolConfig) -> Result<Box<dyn TransportProtocol>, ConfigError> {
    Ok(Box::new(SrReceiver::new(config)?))
}
