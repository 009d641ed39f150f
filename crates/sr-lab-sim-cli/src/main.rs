use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use sr_lab_abstract::{ProtocolConfig, SimConfig};
use sr_lab_protocol::{receiver, sender};
use sr_lab_simulator::{SimulationReport, Simulator, scenario_runner};

#[derive(Parser, Debug)]
#[command(author, version, about = "Selective Repeat protocol simulator")]
struct Args {
    /// Load a scenario from disk instead of generating traffic.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Number of generated application messages.
    #[arg(long, default_value_t = 20)]
    messages: usize,

    /// Time between generated messages.
    #[arg(long, default_value_t = 10)]
    interval: u64,

    #[arg(long, default_value_t = 0.0)]
    loss: f64,
    #[arg(long, default_value_t = 0.0)]
    corrupt: f64,
    #[arg(long, default_value_t = 1)]
    min_latency: u64,
    #[arg(long, default_value_t = 10)]
    max_latency: u64,
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Resubmit messages rejected by a full window after this delay.
    #[arg(long)]
    resubmit_delay: Option<u64>,

    /// Window size (W).
    #[arg(long, default_value_t = 6)]
    window: usize,
    /// Sequence space size (S); at least 2W and a multiple of W.
    #[arg(long, default_value_t = 12)]
    seq_space: u32,
    /// Retransmission timeout.
    #[arg(long, default_value_t = 16)]
    rtt: u64,

    /// Write a JSON report of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();
    info!("sr-lab-sim-cli starting…");

    let report = if let Some(path) = &args.scenario {
        run_scenario_file(path)?
    } else {
        run_generated(&args)?
    };

    log_summary(&report);

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

impl Args {
    fn sim_config(&self) -> SimConfig {
        SimConfig {
            loss_rate: self.loss,
            corrupt_rate: self.corrupt,
            min_latency: self.min_latency,
            max_latency: self.max_latency,
            seed: self.seed,
            resubmit_delay: self.resubmit_delay,
        }
    }

    fn protocol_config(&self) -> ProtocolConfig {
        ProtocolConfig {
            window_size: self.window,
            seq_space: self.seq_space,
            rtt: self.rtt,
        }
    }
}

fn run_scenario_file(path: &Path) -> Result<SimulationReport> {
    let scenario = scenario_runner::load_scenario(path)?;
    let protocol = scenario_runner::protocol_config(&scenario)?;
    let sender = sender(protocol)?;
    let receiver = receiver(protocol)?;
    scenario_runner::run_scenario(&scenario, sender, receiver)
}

fn run_generated(args: &Args) -> Result<SimulationReport> {
    let protocol = args.protocol_config();
    let sender = sender(protocol).context("Invalid protocol parameters")?;
    let receiver = receiver(protocol)?;

    let mut sim = Simulator::new(args.sim_config(), protocol, sender, receiver);
    sim.schedule_generated(0, args.messages, args.interval);

    info!(
        "Starting headless simulation: {} messages, W={}, S={}, RTT={}",
        args.messages, protocol.window_size, protocol.seq_space, protocol.rtt
    );
    sim.run_until_complete();
    info!("Simulation complete.");
    Ok(sim.export_report())
}

fn log_summary(report: &SimulationReport) {
    info!(
        "Duration: {} | accepted: {} | rejected: {} | delivered: {}",
        report.duration,
        report.accepted_data.len(),
        report.rejected_submissions,
        report.delivered_data.len()
    );
    info!(
        "Sender: sent {} | resent {} | ACKs {} ({} new)",
        report.sender.packets_sent,
        report.sender.packets_resent,
        report.sender.total_acks_received,
        report.sender.new_acks
    );
    info!(
        "Channel: forwarded {} | lost {} | corrupted {}",
        report.channel.forwarded, report.channel.lost, report.channel.corrupted
    );
    for violation in &report.violations {
        warn!(
            "[{:?}] at {}: {}",
            violation.node, violation.time, violation.description
        );
    }
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
