use serde::Serialize;
use std::collections::HashMap;
use sr_lab_abstract::{Counters, Message, ProtocolConfig, SimConfig};

use crate::engine::{LinkEventSummary, NodeId};

/// What happened to packets handed to the channel.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ChannelStats {
    pub forwarded: u64,
    pub lost: u64,
    pub corrupted: u64,
}

/// A protocol error surfaced by an entity during the run.
#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    pub time: u64,
    pub node: NodeId,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub protocol: ProtocolConfig,
    pub duration: u64,
    pub accepted_data: Vec<Message>,
    pub delivered_data: Vec<Message>,
    pub sender_packet_count: u64,
    pub rejected_submissions: u64,
    pub sender: Counters,
    pub receiver: Counters,
    pub channel: ChannelStats,
    pub violations: Vec<Violation>,
    pub metrics: HashMap<String, Vec<(u64, f64)>>,
    pub link_events: Vec<LinkEventSummary>,
}
