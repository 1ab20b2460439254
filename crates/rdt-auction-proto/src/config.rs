use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_CHUNK_SIZE: usize = 2000;
/// Largest datagram a receiver reads in one call.
pub const RECV_BUFFER_LEN: usize = 2048;

/// Parameters of one stop-and-wait transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArqConfig {
    /// Retransmission timeout; also the receiver's idle poll interval.
    pub timeout_ms: u64,
    pub chunk_size: usize,
    /// Probability in `[0.0, 1.0]` of discarding an inbound ack (sender) or
    /// an inbound frame (receiver). `None` disables the simulation.
    pub loss_rate: Option<f64>,
}

impl ArqConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ArqConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            loss_rate: None,
        }
    }
}

/// Behaviour of the simulated link between two endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    pub loss_rate: f64,
    pub min_latency: u64,
    pub max_latency: u64,
    pub seed: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            min_latency: 10,
            max_latency: 100,
            seed: 0,
        }
    }
}
