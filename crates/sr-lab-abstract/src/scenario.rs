use crate::config::{ProtocolConfig, SimConfig};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: SimConfigOverride,
    #[serde(default)]
    pub protocol: ProtocolConfigOverride,
    #[serde(default)]
    pub actions: Vec<TestAction>,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SimConfigOverride {
    pub loss_rate: Option<f64>,
    pub corrupt_rate: Option<f64>,
    pub min_latency: Option<u64>,
    pub max_latency: Option<u64>,
    pub seed: Option<u64>,
    pub resubmit_delay: Option<u64>,
}

impl SimConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(v) = self.loss_rate {
            config.loss_rate = v;
        }
        if let Some(v) = self.corrupt_rate {
            config.corrupt_rate = v;
        }
        if let Some(v) = self.min_latency {
            config.min_latency = v;
        }
        if let Some(v) = self.max_latency {
            config.max_latency = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if self.resubmit_delay.is_some() {
            config.resubmit_delay = self.resubmit_delay;
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ProtocolConfigOverride {
    pub window_size: Option<usize>,
    pub seq_space: Option<u32>,
    pub rtt: Option<u64>,
}

impl ProtocolConfigOverride {
    pub fn apply_to(&self, config: &mut ProtocolConfig) {
        if let Some(v) = self.window_size {
            config.window_size = v;
        }
        if let Some(v) = self.seq_space {
            config.seq_space = v;
        }
        if let Some(v) = self.rtt {
            config.rtt = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAction {
    /// Application submits a message (at most 20 bytes, zero-padded) at a specific time
    AppSend { time: u64, data: String },
    /// Application submits `count` generated messages, one every `interval`
    Generate { start: u64, count: usize, interval: u64 },
    /// Deterministically drop the first packet sent by Sender with given seq number
    DropNextFromSenderSeq { seq: u32 },
    /// Deterministically drop the first ACK sent by Receiver with given ack number
    DropNextFromReceiverAck { ack: u32 },
    /// Deterministically corrupt the first packet sent by Sender with given seq number
    CorruptNextFromSenderSeq { seq: u32 },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// Assert that specific data was delivered to the application layer
    DataDelivered { data: String },
    /// Assert that exactly these messages were delivered, in this order
    DeliveredInOrder { data: Vec<String> },
    /// Assert the number of messages delivered to the application layer
    DeliveredCount { count: usize },
    /// Assert that the total number of packets sent by Sender is within range
    SenderPacketCount { min: u64, max: Option<u64> },
    /// Assert that the number of timeout retransmissions is within range
    PacketsResent { min: u64, max: Option<u64> },
    /// Assert that the number of rejected submissions is within range
    WindowFullCount { min: u64, max: Option<u64> },
    /// Assert that simulation finishes within time
    MaxDuration { ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scenario_with_overrides() {
        let text = r#"
            name = "lost ack"
            [config]
            loss_rate = 0.0
            seed = 7
            [protocol]
            window_size = 4
            seq_space = 8

            [[actions]]
            type = "app_send"
            time = 0
            data = "hello"

            [[actions]]
            type = "drop_next_from_receiver_ack"
            ack = 0

            [[assertions]]
            type = "delivered_in_order"
            data = ["hello"]
        "#;
        let scenario: TestScenario = toml::from_str(text).unwrap();
        assert_eq!(scenario.actions.len(), 2);

        let mut protocol = ProtocolConfig::default();
        scenario.protocol.apply_to(&mut protocol);
        assert_eq!(protocol.window_size, 4);
        assert_eq!(protocol.seq_space, 8);
        assert_eq!(protocol.rtt, 16);

        let mut sim = SimConfig::default();
        scenario.config.apply_to(&mut sim);
        assert_eq!(sim.seed, 7);
        assert!(matches!(
            scenario.assertions[0],
            TestAssertion::DeliveredInOrder { .. }
        ));
    }
}
