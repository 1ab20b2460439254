use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;

use crate::receiver::ReceiverStats;
use crate::sender::SenderStats;

/// Bits per second, or `None` when no time has elapsed.
pub fn throughput_bps(bytes: usize, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    (secs > 0.0).then(|| (bytes as f64 * 8.0) / secs)
}

#[derive(Debug, Clone, Serialize)]
pub struct SendReport {
    pub bytes_sent: usize,
    pub elapsed: Duration,
    pub stats: SenderStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiveReport {
    #[serde(skip)]
    pub payload: Bytes,
    pub declared_size: Option<u64>,
    pub elapsed: Duration,
    pub stats: ReceiverStats,
    /// Datagrams that failed to decode.
    pub malformed: u64,
}

impl ReceiveReport {
    pub fn bytes_received(&self) -> usize {
        self.payload.len()
    }

    pub fn throughput_bps(&self) -> Option<f64> {
        throughput_bps(self.bytes_received(), self.elapsed)
    }

    /// `"<bytes> bytes / <secs> seconds = <bps> bps"`
    pub fn summary(&self) -> String {
        match self.throughput_bps() {
            Some(bps) => format!(
                "{} bytes / {:.6} seconds = {:.6} bps",
                self.bytes_received(),
                self.elapsed.as_secs_f64(),
                bps
            ),
            None => format!("{} bytes (no measurable duration)", self.bytes_received()),
        }
    }
}
