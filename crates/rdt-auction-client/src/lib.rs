//! Auction client: plays the role the server assigns, then moves the item
//! file between seller and winner.

pub mod control;
pub mod error;
pub mod roles;
pub mod transfer;

use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, Lines};
use tracing::info;

pub use control::ControlChannel;
pub use error::ClientError;
pub use roles::{BuyerOutcome, Outcome, SellerOutcome, negotiate};
pub use transfer::{TransferSettings, collect_item, deliver_item};

/// Run one auction over `stream` with answers read from `input`, then
/// perform the file transfer if this client sold or won the item.
pub async fn run_client<S, I>(
    stream: S,
    input: &mut Lines<I>,
    settings: &TransferSettings,
) -> Result<Outcome, ClientError>
where
    S: AsyncRead + AsyncWrite,
    I: AsyncBufRead + Unpin,
{
    let mut channel = ControlChannel::new(stream);
    let outcome = negotiate(&mut channel, input).await?;
    // The auction is over for this client either way.
    let _ = channel.close().await;

    match &outcome {
        Outcome::Seller(SellerOutcome::Sold { buyer_ip, .. }) => {
            info!("Delivering item to winning buyer at {}", buyer_ip);
            deliver_item(*buyer_ip, settings).await?;
        }
        Outcome::Buyer(BuyerOutcome::Won { seller_ip, .. }) => {
            info!("Collecting item from seller at {}", seller_ip);
            collect_item(*seller_ip, settings).await?;
        }
        _ => {}
    }
    Ok(outcome)
}
