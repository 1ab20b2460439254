pub mod coordinator;
pub mod pricing;
pub mod server;
pub mod session;

pub use coordinator::{Admission, BidOutcome, ConnId, Coordinator, RequestOutcome, RoundStatus};
pub use server::AuctionServer;
