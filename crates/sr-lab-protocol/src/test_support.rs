use sr_lab_abstract::{Message, Packet, SystemContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCall {
    Start(u64),
    Stop,
}

/// Context that records every action instead of performing it.
#[derive(Default)]
pub struct RecordingContext {
    pub sent: Vec<Packet>,
    pub timers: Vec<TimerCall>,
    pub delivered: Vec<Message>,
    pub logs: Vec<String>,
    pub metrics: Vec<(String, f64)>,
}

impl SystemContext for RecordingContext {
    fn send_packet(&mut self, packet: Packet) {
        self.sent.push(packet);
    }

    fn start_timer(&mut self, delay: u64) {
        self.timers.push(TimerCall::Start(delay));
    }

    fn stop_timer(&mut self) {
        self.timers.push(TimerCall::Stop);
    }

    fn deliver_data(&mut self, message: &Message) {
        self.delivered.push(*message);
    }

    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        0
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.metrics.push((name.to_string(), value));
    }
}
