use std::net::SocketAddr;
use std::time::Duration;

use rdt_auction_proto::{Frame, LinkContext};

/// Captures everything an endpoint asks of its link.
#[derive(Debug, Default)]
pub struct RecordingContext {
    pub sent: Vec<(SocketAddr, Frame)>,
    pub timer: Option<Duration>,
}

impl LinkContext for RecordingContext {
    fn send_frame(&mut self, to: SocketAddr, frame: Frame) {
        self.sent.push((to, frame));
    }

    fn start_timer(&mut self, delay: Duration) {
        self.timer = Some(delay);
    }

    fn cancel_timer(&mut self) {
        self.timer = None;
    }
}
