pub mod config;
pub mod control;
pub mod frame;
pub mod interface;
pub mod notice;
pub mod request;
pub mod scenario;

pub use config::{ArqConfig, LinkConfig};
pub use control::{ControlError, ControlMessage};
pub use frame::{Frame, FrameError, FrameKind, HEADER_LEN, SeqBit};
pub use interface::{ArqEndpoint, LinkContext};
pub use notice::Notice;
pub use request::{AuctionKind, AuctionRequest, RequestError, parse_bid};

pub use scenario::{
    LinkConfigOverride, PayloadSpec, TransferAction, TransferAssertion, TransferScenario,
};
