use crate::config::{ArqConfig, LinkConfig};
use serde::Deserialize;

/// A simulated transfer described in TOML.
#[derive(Deserialize, Debug, Clone)]
pub struct TransferScenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub link: LinkConfigOverride,
    #[serde(default)]
    pub arq: ArqConfig,
    pub payload: PayloadSpec,
    #[serde(default)]
    pub actions: Vec<TransferAction>,
    #[serde(default)]
    pub assertions: Vec<TransferAssertion>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct LinkConfigOverride {
    pub loss_rate: Option<f64>,
    pub min_latency: Option<u64>,
    pub max_latency: Option<u64>,
    pub seed: Option<u64>,
}

impl LinkConfigOverride {
    pub fn apply_to(&self, config: &mut LinkConfig) {
        if let Some(v) = self.loss_rate {
            config.loss_rate = v;
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
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PayloadSpec {
    /// Literal UTF-8 text.
    Text { data: String },
    /// `size` pseudo-random bytes derived from the link seed.
    Random { size: usize },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferAction {
    /// Drop the first data frame the sender transmits with the given sequence bit.
    DropNextDataFrame { seq: u8 },
    /// Drop the first control frame (start/fin) the sender transmits with the given bit.
    DropNextControlFrame { seq: u8 },
    /// Drop the first ack the receiver transmits for the given bit.
    DropNextAck { seq: u8 },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferAssertion {
    /// The receiver reassembled exactly the payload that was sent.
    PayloadDelivered,
    /// The sender put at most `max` frames on the link.
    MaxSenderFrames { max: u32 },
    /// The sender retransmitted at least `min` times.
    MinRetransmissions { min: u64 },
    /// The transfer completed within `ms` simulated milliseconds.
    MaxDuration { ms: u64 },
}
