use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use rdt_auction_proto::config::{DEFAULT_CHUNK_SIZE, DEFAULT_TIMEOUT_MS};
use rdt_auction_proto::{
    ArqConfig, LinkConfigOverride, PayloadSpec, TransferAssertion, TransferScenario,
};
use rdt_auction_simulator::TransferReport;
use rdt_auction_simulator::scenario_runner::{self, EndpointLoss, build_payload};
use tracing::{Level, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Simulate a stop-and-wait file transfer over a lossy link")]
struct Args {
    /// Load a scenario from disk; the link and ARQ flags below are then ignored.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Size of a random payload.
    #[arg(long, default_value_t = 20_000)]
    size: usize,

    /// Send this file instead of a random payload.
    #[arg(long)]
    payload_file: Option<PathBuf>,

    /// Channel loss rate in both directions.
    #[arg(long, default_value_t = 0.1)]
    loss: f64,

    /// Probability the sender discards an inbound ack.
    #[arg(long)]
    ack_loss: Option<f64>,

    /// Probability the receiver discards an inbound frame.
    #[arg(long)]
    frame_loss: Option<f64>,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    info!("rdt-sim starting…");

    let report = match &args.scenario {
        Some(path) => scenario_runner::run_scenario(path)?,
        None => {
            let (scenario, payload) = args.build_transfer()?;
            let loss = EndpointLoss {
                ack: args.ack_loss,
                frame: args.frame_loss,
            };
            scenario_runner::run_transfer_with_loss(&scenario, payload, loss)?
        }
    };

    println!(
        "{}: {} / {} bytes delivered ({}), {} frames sent, {} retransmissions, {} ms simulated",
        report.scenario,
        report.delivered_len,
        report.payload_len,
        if report.intact { "intact" } else { "CORRUPTED" },
        report.link.sender_frame_count,
        report.sender.retransmissions,
        report.link.duration_ms
    );

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    if !report.intact {
        anyhow::bail!("delivered payload differs from the one sent");
    }
    Ok(())
}

impl Args {
    fn build_transfer(&self) -> Result<(TransferScenario, Bytes)> {
        let payload_spec = PayloadSpec::Random { size: self.size };
        let payload = match &self.payload_file {
            Some(path) => Bytes::from(
                fs::read(path)
                    .with_context(|| format!("Failed to read payload file {}", path.display()))?,
            ),
            None => build_payload(&payload_spec, self.seed),
        };

        let scenario = TransferScenario {
            name: "cli".to_string(),
            description: String::new(),
            link: LinkConfigOverride {
                loss_rate: Some(self.loss),
                seed: Some(self.seed),
                ..LinkConfigOverride::default()
            },
            arq: ArqConfig {
                timeout_ms: self.timeout_ms,
                chunk_size: self.chunk_size,
                loss_rate: None,
            },
            payload: payload_spec,
            actions: Vec::new(),
            assertions: vec![TransferAssertion::PayloadDelivered],
        };
        Ok((scenario, payload))
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn write_trace(path: &Path, report: &TransferReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
