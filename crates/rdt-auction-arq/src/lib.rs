//! Stop-and-wait reliable transfer over an unreliable datagram channel.
//!
//! [`ArqSender`] and [`ArqReceiver`] are event-driven endpoints; the
//! [`driver`] module runs them over a real socket and the simulator crate
//! runs them over a simulated lossy link.

pub mod channel;
pub mod driver;
pub mod error;
pub mod loss;
pub mod receiver;
pub mod report;
pub mod sender;

#[cfg(test)]
mod testing;

pub use channel::DatagramChannel;
pub use driver::{receive, run_receiver, run_sender, send, send_file};
pub use error::TransferError;
pub use loss::{LossSimulator, should_drop};
pub use receiver::{ArqReceiver, ReceiverStats};
pub use report::{ReceiveReport, SendReport, throughput_bps};
pub use sender::{ArqSender, MAX_CHUNK_SIZE, SenderStats};
