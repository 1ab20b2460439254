use rdt_auction_arq::{ReceiverStats, SenderStats};
use rdt_auction_proto::LinkConfig;
use serde::Serialize;

use crate::engine::LinkEventSummary;

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: LinkConfig,
    pub duration_ms: u64,
    /// Simulated time at which each endpoint reported completion.
    pub sender_finished_at: Option<u64>,
    pub receiver_finished_at: Option<u64>,
    pub sender_frame_count: u32,
    pub receiver_frame_count: u32,
    pub link_events: Vec<LinkEventSummary>,
}

/// Outcome of one simulated file transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReport {
    pub scenario: String,
    pub payload_len: usize,
    pub delivered_len: usize,
    pub intact: bool,
    pub sender: SenderStats,
    pub receiver: ReceiverStats,
    pub link: SimulationReport,
}
