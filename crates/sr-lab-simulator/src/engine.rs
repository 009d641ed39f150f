use crate::trace::{ChannelStats, SimulationReport, Violation};
use rand::Rng;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use sr_lab_abstract::{
    MESSAGE_LEN, Message, Packet, ProtocolConfig, ProtocolError, SimConfig, SystemContext,
    TransportProtocol,
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeId {
    Sender,
    Receiver,
}

impl NodeId {
    pub fn peer(&self) -> Self {
        match self {
            NodeId::Sender => NodeId::Receiver,
            NodeId::Receiver => NodeId::Sender,
        }
    }
}

#[derive(Debug)]
pub enum EventType {
    PacketArrival { to: NodeId, packet: Packet },
    TimerExpiry { node: NodeId, generation: u64 },
    AppSend { message: Message },
}

#[derive(Debug)]
struct Event {
    time: u64,
    event_type: EventType,
    id: u64, // Unique ID to differentiate events at same time
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// A compact textual summary of important link-layer events.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEventSummary {
    pub time: u64,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerCommand {
    Start(u64),
    Stop,
}

/// Actions buffered during one protocol callback
#[derive(Default)]
struct ActionBuffer {
    outgoing_packets: Vec<Packet>,
    timer_commands: Vec<TimerCommand>,
    logs: Vec<String>,
    delivered_data: Vec<Message>,
    metrics: Vec<(String, f64)>,
}

struct ScopedContext<'a> {
    buffer: &'a mut ActionBuffer,
    now: u64,
}

impl<'a> SystemContext for ScopedContext<'a> {
    fn send_packet(&mut self, packet: Packet) {
        self.buffer.outgoing_packets.push(packet);
    }

    fn start_timer(&mut self, delay: u64) {
        self.buffer.timer_commands.push(TimerCommand::Start(delay));
    }

    fn stop_timer(&mut self) {
        self.buffer.timer_commands.push(TimerCommand::Stop);
    }

    fn deliver_data(&mut self, message: &Message) {
        self.buffer.delivered_data.push(*message);
    }

    fn log(&mut self, message: &str) {
        self.buffer.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        self.now
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.buffer.metrics.push((name.to_string(), value));
    }
}

/// One logical timer per entity. The generation stamps expiry events so a
/// stopped or re-armed timer never fires stale.
#[derive(Debug, Default, Clone, Copy)]
struct TimerSlot {
    generation: u64,
    armed: bool,
}

/// How a corrupted packet was damaged. The checksum field is never touched.
#[derive(Debug, Clone, Copy)]
enum Damage {
    Payload(usize),
    SeqNum,
    AckNum,
}

pub struct Simulator {
    time: u64,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,

    config: SimConfig,
    protocol: ProtocolConfig,
    rng: rand::rngs::StdRng,

    pub sender: Box<dyn TransportProtocol>,
    pub receiver: Box<dyn TransportProtocol>,

    /// Messages the sender accepted, in acceptance order
    pub accepted_data: Vec<Message>,
    pub delivered_data: Vec<Message>,
    pub sender_packet_count: u64,
    pub rejected_submissions: u64,
    pub channel: ChannelStats,
    pub violations: Vec<Violation>,

    /// Time-series recorded via `SystemContext::record_metric`.
    /// Key: metric name (e.g. "outstanding"), Value: Vec<(time, value)>
    pub metrics: HashMap<String, Vec<(u64, f64)>>,

    drop_sender_seq_once: Vec<u32>,
    drop_receiver_ack_once: Vec<u32>,
    corrupt_sender_seq_once: Vec<u32>,

    pub link_events: Vec<LinkEventSummary>,

    timers: HashMap<NodeId, TimerSlot>,
    /// Latest arrival time scheduled per source, so the channel stays FIFO.
    last_arrival: HashMap<NodeId, u64>,
}

impl Simulator {
    pub fn new(
        config: SimConfig,
        protocol: ProtocolConfig,
        sender: Box<dyn TransportProtocol>,
        receiver: Box<dyn TransportProtocol>,
    ) -> Self {
        use rand::SeedableRng;
        let rng = rand::rngs::StdRng::seed_from_u64(config.seed);

        Self {
            time: 0,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            config,
            protocol,
            rng,
            sender,
            receiver,
            accepted_data: Vec::new(),
            delivered_data: Vec::new(),
            sender_packet_count: 0,
            rejected_submissions: 0,
            channel: ChannelStats::default(),
            violations: Vec::new(),
            metrics: HashMap::new(),
            drop_sender_seq_once: Vec::new(),
            drop_receiver_ack_once: Vec::new(),
            corrupt_sender_seq_once: Vec::new(),
            link_events: Vec::new(),
            timers: HashMap::new(),
            last_arrival: HashMap::new(),
        }
    }

    /// Register a deterministic fault: drop the first packet sent by Sender whose seq equals `seq`.
    pub fn add_drop_sender_seq_once(&mut self, seq: u32) {
        self.drop_sender_seq_once.push(seq);
    }

    /// Register a deterministic fault: drop the first ACK sent by Receiver whose ack equals `ack`.
    pub fn add_drop_receiver_ack_once(&mut self, ack: u32) {
        self.drop_receiver_ack_once.push(ack);
    }

    /// Register a deterministic fault: damage the payload of the first packet sent by Sender
    /// whose seq equals `seq`.
    pub fn add_corrupt_sender_seq_once(&mut self, seq: u32) {
        self.corrupt_sender_seq_once.push(seq);
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn protocol_config(&self) -> &ProtocolConfig {
        &self.protocol
    }

    /// Return a slice of (time, value) samples for a named metric, if present.
    pub fn metric_series(&self, name: &str) -> Option<&[(u64, f64)]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    fn push_event(&mut self, time: u64, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    pub fn schedule_app_send(&mut self, time: u64, message: Message) {
        self.push_event(time, EventType::AppSend { message });
    }

    /// Schedule `count` generated messages starting at `start`, one every `interval`.
    /// Message `i` is twenty copies of the letter `'a' + i % 26`.
    pub fn schedule_generated(&mut self, start: u64, count: usize, interval: u64) {
        for i in 0..count {
            let letter = b'a' + (i % 26) as u8;
            self.schedule_app_send(start + i as u64 * interval, Message::filled(letter));
        }
    }

    pub fn init(&mut self) {
        {
            let mut buffer = ActionBuffer::default();
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
                now: self.time,
            };
            self.sender.init(&mut ctx);
            self.process_actions(NodeId::Sender, buffer);
        }
        {
            let mut buffer = ActionBuffer::default();
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
                now: self.time,
            };
            self.receiver.init(&mut ctx);
            self.process_actions(NodeId::Receiver, buffer);
        }
    }

    pub fn peek_next_event_time(&self) -> Option<u64> {
        self.event_queue.peek().map(|e| e.time)
    }

    pub fn current_time(&self) -> u64 {
        self.time
    }

    pub fn remaining_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Process the next event. Returns true if an event was processed, false if queue is empty.
    pub fn step(&mut self) -> bool {
        let event = match self.event_queue.pop() {
            Some(e) => e,
            None => return false,
        };

        self.time = event.time;
        debug!("Processing event at {}: {:?}", self.time, event.event_type);

        match event.event_type {
            EventType::PacketArrival { to, packet } => {
                let mut buffer = ActionBuffer::default();
                let result = {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        now: self.time,
                    };
                    match to {
                        NodeId::Sender => self.sender.on_packet(&mut ctx, packet),
                        NodeId::Receiver => self.receiver.on_packet(&mut ctx, packet),
                    }
                };
                self.process_actions(to, buffer);
                if let Err(err) = result {
                    self.record_violation(to, err);
                }
            }
            EventType::TimerExpiry { node, generation } => {
                let slot = self.timers.entry(node).or_default();
                if !slot.armed || slot.generation != generation {
                    debug!("Skipping stale timer event for {:?}", node);
                    return true;
                }
                slot.armed = false;

                let mut buffer = ActionBuffer::default();
                {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        now: self.time,
                    };
                    match node {
                        NodeId::Sender => self.sender.on_timer(&mut ctx),
                        NodeId::Receiver => self.receiver.on_timer(&mut ctx),
                    }
                }
                self.process_actions(node, buffer);
            }
            EventType::AppSend { message } => {
                let mut buffer = ActionBuffer::default();
                let result = {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        now: self.time,
                    };
                    self.sender.on_app_data(&mut ctx, &message)
                };
                self.process_actions(NodeId::Sender, buffer);
                match result {
                    Ok(()) => self.accepted_data.push(message),
                    Err(ProtocolError::WindowFull { outstanding }) => {
                        self.rejected_submissions += 1;
                        debug!("Submission rejected, {} outstanding", outstanding);
                        if let Some(delay) = self.config.resubmit_delay {
                            self.schedule_app_send(self.time + delay, message);
                        }
                    }
                    Err(err) => self.record_violation(NodeId::Sender, err),
                }
            }
        }
        true
    }

    fn record_violation(&mut self, node: NodeId, error: ProtocolError) {
        warn!("[{:?}] protocol violation: {}", node, error);
        self.violations.push(Violation {
            time: self.time,
            node,
            description: error.to_string(),
        });
    }

    /// Produce a serializable snapshot of the current simulation state.
    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            protocol: self.protocol,
            duration: self.time,
            accepted_data: self.accepted_data.clone(),
            delivered_data: self.delivered_data.clone(),
            sender_packet_count: self.sender_packet_count,
            rejected_submissions: self.rejected_submissions,
            sender: self.sender.counters(),
            receiver: self.receiver.counters(),
            channel: self.channel,
            violations: self.violations.clone(),
            metrics: self.metrics.clone(),
            link_events: self.link_events.clone(),
        }
    }

    pub fn run_until_complete(&mut self) {
        self.init();
        while self.step() {}
    }

    fn process_actions(&mut self, source_node: NodeId, buffer: ActionBuffer) {
        for (name, value) in buffer.metrics {
            self.metrics
                .entry(name)
                .or_default()
                .push((self.time, value));
        }

        for log in buffer.logs {
            info!("[{:?}] {}", source_node, log);
        }

        for data in buffer.delivered_data {
            info!(
                "[{:?}] DELIVERED {:?}",
                source_node,
                String::from_utf8_lossy(data.trimmed())
            );
            self.link_events.push(LinkEventSummary {
                time: self.time,
                description: format!("[{:?}] DELIVERED to application", source_node),
            });
            self.delivered_data.push(data);
        }

        for command in buffer.timer_commands {
            self.apply_timer(source_node, command);
        }

        for packet in buffer.outgoing_packets {
            self.transmit(source_node, packet);
        }
    }

    fn apply_timer(&mut self, node: NodeId, command: TimerCommand) {
        let slot = self.timers.entry(node).or_default();
        match command {
            TimerCommand::Start(delay) => {
                if slot.armed {
                    warn!("[{:?}] start_timer while timer already running", node);
                }
                slot.generation += 1;
                slot.armed = true;
                let generation = slot.generation;
                self.push_event(self.time + delay, EventType::TimerExpiry { node, generation });
            }
            TimerCommand::Stop => {
                if !slot.armed {
                    warn!("[{:?}] stop_timer while no timer running", node);
                }
                slot.generation += 1;
                slot.armed = false;
            }
        }
    }

    fn transmit(&mut self, source_node: NodeId, mut packet: Packet) {
        if source_node == NodeId::Sender {
            self.sender_packet_count += 1;

            if let Some(pos) = self
                .drop_sender_seq_once
                .iter()
                .position(|s| *s == packet.header.seq_num)
            {
                self.drop_sender_seq_once.remove(pos);
                self.note_loss(source_node, &packet, "deterministic seq");
                return;
            }

            if let Some(pos) = self
                .corrupt_sender_seq_once
                .iter()
                .position(|s| *s == packet.header.seq_num)
            {
                self.corrupt_sender_seq_once.remove(pos);
                self.damage(source_node, &mut packet, Damage::Payload(0));
            }
        }

        if source_node == NodeId::Receiver
            && let Some(ack) = packet.header.ack()
            && let Some(pos) = self.drop_receiver_ack_once.iter().position(|a| *a == ack)
        {
            self.drop_receiver_ack_once.remove(pos);
            self.note_loss(source_node, &packet, "deterministic ack");
            return;
        }

        // 1. Check Loss
        if self.rng.random::<f64>() < self.config.loss_rate {
            self.note_loss(source_node, &packet, "random loss");
            return;
        }

        // 2. Check Corruption
        if self.rng.random::<f64>() < self.config.corrupt_rate {
            let damage = match self.rng.random_range(0..8u8) {
                0..=5 => Damage::Payload(self.rng.random_range(0..MESSAGE_LEN)),
                6 => Damage::SeqNum,
                _ => Damage::AckNum,
            };
            self.damage(source_node, &mut packet, damage);
        }

        // 3. Latency, never overtaking an earlier packet from the same source
        let latency = self
            .rng
            .random_range(self.config.min_latency..=self.config.max_latency);
        let earliest = self
            .last_arrival
            .get(&source_node)
            .copied()
            .unwrap_or(0)
            .max(self.time);
        let arrival_time = earliest + latency;
        self.last_arrival.insert(source_node, arrival_time);

        let target_node = source_node.peer();
        self.channel.forwarded += 1;
        self.link_events.push(LinkEventSummary {
            time: self.time,
            description: format!(
                "[{:?}->{:?}] SEND seq={} ack={} (arrives {})",
                source_node,
                target_node,
                packet.header.seq_num,
                packet.header.ack_num,
                arrival_time
            ),
        });

        self.push_event(
            arrival_time,
            EventType::PacketArrival {
                to: target_node,
                packet,
            },
        );
    }

    fn note_loss(&mut self, source_node: NodeId, packet: &Packet, reason: &str) {
        self.channel.lost += 1;
        self.link_events.push(LinkEventSummary {
            time: self.time,
            description: format!(
                "[{:?}->{:?}] DROP ({}) seq={} ack={}",
                source_node,
                source_node.peer(),
                reason,
                packet.header.seq_num,
                packet.header.ack_num
            ),
        });
        debug!("Packet lost in channel ({})", reason);
    }

    fn damage(&mut self, source_node: NodeId, packet: &mut Packet, damage: Damage) {
        self.channel.corrupted += 1;
        match damage {
            Damage::Payload(idx) => {
                let byte = &mut packet.payload.data[idx];
                *byte = if *byte == b'z' { b'Z' } else { b'z' };
            }
            Damage::SeqNum => packet.header.seq_num = 999_999,
            Damage::AckNum => packet.header.ack_num = 999_999,
        }
        self.link_events.push(LinkEventSummary {
            time: self.time,
            description: format!(
                "[{:?}->{:?}] CORRUPT {:?} seq={} ack={}",
                source_node,
                source_node.peer(),
                damage,
                packet.header.seq_num,
                packet.header.ack_num
            ),
        });
        debug!("Packet corrupted in channel: {:?}", damage);
    }
}
