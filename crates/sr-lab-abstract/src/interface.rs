use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::packet::{Message, Packet};

/// Non-fatal outcomes a protocol entity reports back to its driver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The send window is full; the message was not accepted and the caller owns the retry.
    #[error("send window full ({outstanding} packets outstanding)")]
    WindowFull { outstanding: usize },
    /// A packet arrived outside both the receive window and the duplicate window.
    #[error("sequence number {seq} outside receive and duplicate windows (base {base})")]
    OutOfWindow { seq: u32, base: u32 },
    #[error("operation not supported by this entity: {0}")]
    Unsupported(&'static str),
}

/// Event counters exported by an entity. Read-only to reporting.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Counters {
    /// Packets handed to the channel, retransmissions included
    pub packets_sent: u64,
    /// Timeout-triggered retransmissions
    pub packets_resent: u64,
    pub total_acks_received: u64,
    pub new_acks: u64,
    /// Submissions rejected because the window was full
    pub window_full: u64,
    /// Payloads handed to the application
    pub delivered: u64,
    pub acks_sent: u64,
    pub corrupted_dropped: u64,
}

/// The capability the simulator hands to a protocol entity for the duration of one event.
/// Entities use it to reach the channel, their timer and the application layer.
pub trait SystemContext {
    /// Hand a packet to the unreliable channel.
    fn send_packet(&mut self, packet: Packet);

    /// Arm this entity's one-shot timer. The timer must not already be running.
    fn start_timer(&mut self, delay: u64);

    /// Disarm this entity's timer. The timer must be running.
    fn stop_timer(&mut self);

    /// Deliver a payload to the application layer, in order.
    fn deliver_data(&mut self, message: &Message);

    /// Log a message to the simulator's debug output.
    fn log(&mut self, message: &str);

    /// Current simulation time
    fn now(&self) -> u64;

    /// Record a numeric sample for the report (e.g. outstanding packets).
    fn record_metric(&mut self, _name: &str, _value: f64) {}
}

/// Event handlers of one protocol entity.
pub trait TransportProtocol {
    /// Called once before any other handler.
    fn init(&mut self, _ctx: &mut dyn SystemContext) {}

    /// Called when a packet arrives from the channel.
    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet)
    -> Result<(), ProtocolError>;

    /// Called when this entity's timer expires.
    fn on_timer(&mut self, _ctx: &mut dyn SystemContext) {}

    /// Called when the application layer submits a message for reliable delivery.
    fn on_app_data(
        &mut self,
        _ctx: &mut dyn SystemContext,
        _message: &Message,
    ) -> Result<(), ProtocolError> {
        Err(ProtocolError::Unsupported("application data"))
    }

    fn counters(&self) -> Counters {
        Counters::default()
    }
}
