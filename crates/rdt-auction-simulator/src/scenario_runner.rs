use std::fs;
use std::path::Path;

use anyhow::Context;
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rdt_auction_arq::{ArqReceiver, ArqSender, LossSimulator};
use rdt_auction_proto::{
    LinkConfig, PayloadSpec, SeqBit, TransferAction, TransferAssertion, TransferScenario,
};
use thiserror::Error;
use tracing::info;

use crate::engine::{NodeId, Simulator};
use crate::trace::TransferReport;

/// Simulated time allowed when a scenario sets no `max_duration`.
pub const DEFAULT_TIME_LIMIT_MS: u64 = 600_000;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("sequence bit must be 0 or 1, got {0}")]
    InvalidSeq(u8),
    #[error("transfer did not complete within {0} ms")]
    TimedOut(u64),
    #[error("assertion failed: {0}")]
    AssertionFailed(String),
}

pub fn load_scenario(path: &Path) -> anyhow::Result<TransferScenario> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    toml::from_str(&content).context("Failed to parse scenario")
}

pub fn run_scenario(path: &Path) -> anyhow::Result<TransferReport> {
    let scenario = load_scenario(path)?;
    let payload = build_payload(&scenario.payload, scenario.link.seed.unwrap_or_default());
    run_transfer(&scenario, payload)
}

/// Materialize a scenario payload; random payloads are reproducible per seed.
pub fn build_payload(spec: &PayloadSpec, seed: u64) -> Bytes {
    match spec {
        PayloadSpec::Text { data } => Bytes::copy_from_slice(data.as_bytes()),
        PayloadSpec::Random { size } => {
            let mut data = vec![0u8; *size];
            StdRng::seed_from_u64(seed).fill_bytes(&mut data);
            Bytes::from(data)
        }
    }
}

fn seq_bit(seq: u8) -> Result<SeqBit, ScenarioError> {
    SeqBit::try_from(seq).map_err(|_| ScenarioError::InvalidSeq(seq))
}

/// Loss probabilities applied inside the endpoints, on top of link loss.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndpointLoss {
    /// Inbound acks discarded by the sender.
    pub ack: Option<f64>,
    /// Inbound frames discarded by the receiver.
    pub frame: Option<f64>,
}

impl EndpointLoss {
    pub fn uniform(rate: Option<f64>) -> Self {
        Self {
            ack: rate,
            frame: rate,
        }
    }
}

/// Simulate sending `payload` under `scenario` and check its assertions.
pub fn run_transfer(
    scenario: &TransferScenario,
    payload: Bytes,
) -> anyhow::Result<TransferReport> {
    run_transfer_with_loss(scenario, payload, EndpointLoss::uniform(scenario.arq.loss_rate))
}

pub fn run_transfer_with_loss(
    scenario: &TransferScenario,
    payload: Bytes,
    loss: EndpointLoss,
) -> anyhow::Result<TransferReport> {
    info!("Running Scenario: {}", scenario.name);
    if !scenario.description.is_empty() {
        info!("Description: {}", scenario.description);
    }

    let mut config = LinkConfig::default();
    scenario.link.apply_to(&mut config);

    let arq = &scenario.arq;
    let sender = ArqSender::new(NodeId::Receiver.addr(), payload.clone(), arq)
        .context("Failed to prepare sender")?
        .with_ack_loss(LossSimulator::seeded(loss.ack, config.seed.wrapping_add(1)));
    let receiver = ArqReceiver::new(Some(NodeId::Sender.addr().ip()), arq)
        .with_frame_loss(LossSimulator::seeded(loss.frame, config.seed.wrapping_add(2)));

    let mut sim = Simulator::new(config, sender, receiver);
    for action in &scenario.actions {
        match action {
            TransferAction::DropNextDataFrame { seq } => sim.add_drop_data_once(seq_bit(*seq)?),
            TransferAction::DropNextControlFrame { seq } => {
                sim.add_drop_control_once(seq_bit(*seq)?)
            }
            TransferAction::DropNextAck { seq } => sim.add_drop_ack_once(seq_bit(*seq)?),
        }
    }

    let limit = scenario
        .assertions
        .iter()
        .find_map(|a| match a {
            TransferAssertion::MaxDuration { ms } => Some(*ms),
            _ => None,
        })
        .unwrap_or(DEFAULT_TIME_LIMIT_MS);

    if !sim.run_until(limit) {
        return Err(ScenarioError::TimedOut(limit).into());
    }

    let link = sim.export_report();
    let delivered = sim.receiver.payload();
    let report = TransferReport {
        scenario: scenario.name.clone(),
        payload_len: payload.len(),
        delivered_len: delivered.len(),
        intact: delivered == payload.as_ref(),
        sender: sim.sender.stats().clone(),
        receiver: sim.receiver.stats().clone(),
        link,
    };
    info!(
        "Delivered {} / {} bytes in {} ms, {} retransmissions",
        report.delivered_len,
        report.payload_len,
        report.link.duration_ms,
        report.sender.retransmissions
    );

    check_assertions(&scenario.assertions, &report)?;
    info!("Scenario passed");
    Ok(report)
}

fn check_assertions(
    assertions: &[TransferAssertion],
    report: &TransferReport,
) -> Result<(), ScenarioError> {
    for assertion in assertions {
        match assertion {
            TransferAssertion::PayloadDelivered => {
                if !report.intact {
                    return Err(ScenarioError::AssertionFailed(format!(
                        "receiver holds {} bytes that differ from the {} bytes sent",
                        report.delivered_len, report.payload_len
                    )));
                }
            }
            TransferAssertion::MaxSenderFrames { max } => {
                if report.link.sender_frame_count > *max {
                    return Err(ScenarioError::AssertionFailed(format!(
                        "sender sent {} frames, expected at most {}",
                        report.link.sender_frame_count, max
                    )));
                }
            }
            TransferAssertion::MinRetransmissions { min } => {
                if report.sender.retransmissions < *min {
                    return Err(ScenarioError::AssertionFailed(format!(
                        "sender retransmitted {} times, expected at least {}",
                        report.sender.retransmissions, min
                    )));
                }
            }
            // Enforced as the run's time limit.
            TransferAssertion::MaxDuration { .. } => {}
        }
    }
    Ok(())
}
