use std::net::SocketAddr;
use std::time::Duration;

use crate::frame::Frame;

/// The capabilities a transfer endpoint gets from whatever is driving it,
/// either a real datagram socket or the discrete-event simulator.
pub trait LinkContext {
    /// Send a frame over the unreliable channel.
    fn send_frame(&mut self, to: SocketAddr, frame: Frame);

    /// Arm the endpoint's single retransmission timer, replacing any running one.
    fn start_timer(&mut self, delay: Duration);

    /// Disarm the retransmission timer. No-op when none is running.
    fn cancel_timer(&mut self);
}

/// A stop-and-wait endpoint driven by frame arrivals and timer expiry.
pub trait ArqEndpoint {
    /// Called once before any frame is delivered.
    fn on_start(&mut self, _ctx: &mut dyn LinkContext) {}

    /// Called for every decoded frame arriving from the network.
    fn on_frame(&mut self, ctx: &mut dyn LinkContext, from: SocketAddr, frame: Frame);

    /// Called when the retransmission timer expires.
    fn on_timeout(&mut self, ctx: &mut dyn LinkContext);

    /// True once the endpoint has completed its side of the transfer.
    fn is_finished(&self) -> bool;
}
