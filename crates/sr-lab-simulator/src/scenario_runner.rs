use anyhow::{Context, Result, anyhow, bail};
use sr_lab_abstract::{
    Message, ProtocolConfig, SimConfig, TestAction, TestAssertion, TestScenario,
    TransportProtocol,
};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::{SimulationReport, Simulator};

const DEFAULT_MAX_DURATION: u64 = 100_000;

pub fn load_scenario(path: &Path) -> Result<TestScenario> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    toml::from_str(&content).context("Failed to parse scenario file")
}

/// Protocol parameters for a scenario: defaults with the `[protocol]` table applied.
pub fn protocol_config(scenario: &TestScenario) -> Result<ProtocolConfig> {
    let mut config = ProtocolConfig::default();
    scenario.protocol.apply_to(&mut config);
    config
        .validate()
        .with_context(|| format!("Invalid [protocol] table in scenario {:?}", scenario.name))?;
    Ok(config)
}

/// Build a simulator with the scenario's channel settings and actions applied.
pub fn build_simulator(
    scenario: &TestScenario,
    sender: Box<dyn TransportProtocol>,
    receiver: Box<dyn TransportProtocol>,
) -> Result<Simulator> {
    let mut config = SimConfig::default();
    scenario.config.apply_to(&mut config);

    let mut sim = Simulator::new(config, protocol_config(scenario)?, sender, receiver);
    for action in &scenario.actions {
        match action {
            TestAction::AppSend { time, data } => {
                let message = Message::from_bytes(data.as_bytes())
                    .with_context(|| format!("Invalid app_send data {data:?}"))?;
                sim.schedule_app_send(*time, message);
            }
            TestAction::Generate {
                start,
                count,
                interval,
            } => sim.schedule_generated(*start, *count, *interval),
            TestAction::DropNextFromSenderSeq { seq } => sim.add_drop_sender_seq_once(*seq),
            TestAction::DropNextFromReceiverAck { ack } => sim.add_drop_receiver_ack_once(*ack),
            TestAction::CorruptNextFromSenderSeq { seq } => sim.add_corrupt_sender_seq_once(*seq),
        }
    }
    Ok(sim)
}

pub fn run_scenario(
    scenario: &TestScenario,
    sender: Box<dyn TransportProtocol>,
    receiver: Box<dyn TransportProtocol>,
) -> Result<SimulationReport> {
    info!("Running Scenario: {}", scenario.name);
    if !scenario.description.is_empty() {
        info!("Description: {}", scenario.description);
    }

    let mut sim = build_simulator(scenario, sender, receiver)?;
    sim.init();

    let max_duration = scenario
        .assertions
        .iter()
        .find_map(|a| match a {
            TestAssertion::MaxDuration { ms } => Some(*ms),
            _ => None,
        })
        .unwrap_or(DEFAULT_MAX_DURATION);

    while sim.step() {
        if sim.current_time() > max_duration {
            bail!("Test timed out after {} time units", max_duration);
        }
    }

    let report = sim.export_report();
    check_assertions(&scenario.assertions, &report)?;
    info!("Test Scenario Passed!");
    Ok(report)
}

fn check_range(what: &str, value: u64, min: u64, max: Option<u64>) -> Result<()> {
    if value < min {
        bail!("Assertion Failed: {what} was {value}, expected min {min}");
    }
    if let Some(max) = max
        && value > max
    {
        bail!("Assertion Failed: {what} was {value}, expected max {max}");
    }
    Ok(())
}

pub fn check_assertions(assertions: &[TestAssertion], report: &SimulationReport) -> Result<()> {
    for assertion in assertions {
        match assertion {
            TestAssertion::DataDelivered { data } => {
                let found = report
                    .delivered_data
                    .iter()
                    .any(|m| m.trimmed() == data.as_bytes());
                if !found {
                    return Err(anyhow!(
                        "Assertion Failed: Data {:?} was not delivered",
                        data
                    ));
                }
            }
            TestAssertion::DeliveredInOrder { data } => {
                let delivered: Vec<&[u8]> =
                    report.delivered_data.iter().map(Message::trimmed).collect();
                let expected: Vec<&[u8]> = data.iter().map(|d| d.as_bytes()).collect();
                if delivered != expected {
                    let shown: Vec<_> = delivered
                        .iter()
                        .map(|d| String::from_utf8_lossy(d))
                        .collect();
                    bail!("Assertion Failed: delivered {:?}, expected {:?}", shown, data);
                }
            }
            TestAssertion::DeliveredCount { count } => {
                if report.delivered_data.len() != *count {
                    bail!(
                        "Assertion Failed: {} messages delivered, expected {}",
                        report.delivered_data.len(),
                        count
                    );
                }
            }
            TestAssertion::SenderPacketCount { min, max } => {
                check_range("Sender packet count", report.sender_packet_count, *min, *max)?
            }
            TestAssertion::PacketsResent { min, max } => {
                check_range("Packets resent", report.sender.packets_resent, *min, *max)?
            }
            TestAssertion::WindowFullCount { min, max } => {
                check_range("Rejected submissions", report.rejected_submissions, *min, *max)?
            }
            TestAssertion::MaxDuration { .. } => {} // Already checked
        }
    }
    Ok(())
}
