use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use rdt_auction_proto::Notice;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::unbounded_channel;
use tracing::{debug, info};

use crate::coordinator::{Admission, BidOutcome, ConnId, Coordinator, RequestOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Seller { submitted: bool },
    Buyer { ordinal: usize, bid_placed: bool },
    Rejected,
}

/// Serve one control-channel connection until the coordinator drops its
/// outbox or the peer goes away.
pub async fn run_session<S>(
    coordinator: Arc<Coordinator>,
    conn: ConnId,
    addr: SocketAddr,
    stream: S,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();
    let (outbox, mut notices) = unbounded_channel();

    let mut role = match coordinator.connect(conn, addr, outbox) {
        Admission::Seller => Role::Seller { submitted: false },
        Admission::Buyer { ordinal } => Role::Buyer {
            ordinal,
            bid_placed: false,
        },
        Admission::Busy | Admission::InProgress => Role::Rejected,
    };
    // Bids typed before "Bidding start!" are replayed once it is written.
    let mut early_bids: VecDeque<String> = VecDeque::new();

    loop {
        tokio::select! {
            biased;
            notice = notices.recv() => {
                let Some(notice) = notice else {
                    debug!("Connection {} from {} released by the coordinator", conn, addr);
                    writer.shutdown().await?;
                    return Ok(());
                };
                writer.write_all(format!("{notice}\n").as_bytes()).await?;
                writer.flush().await?;
                if notice == Notice::BiddingStart {
                    while let Some(line) = early_bids.pop_front() {
                        handle_line(&coordinator, conn, &mut role, line, &mut early_bids);
                    }
                }
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        handle_line(&coordinator, conn, &mut role, line, &mut early_bids)
                    }
                    Ok(None) | Err(_) => {
                        connection_lost(&coordinator, conn, addr, role);
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn handle_line(
    coordinator: &Coordinator,
    conn: ConnId,
    role: &mut Role,
    line: String,
    early_bids: &mut VecDeque<String>,
) {
    if line.trim().is_empty() {
        return;
    }
    match role {
        Role::Seller { submitted: false } => {
            let outcome = coordinator.submit_seller_request(conn, &line);
            if let RequestOutcome::Accepted(request) = outcome {
                debug!("Seller request accepted: {}", request);
                *role = Role::Seller { submitted: true };
            }
        }
        Role::Buyer {
            ordinal,
            bid_placed: false,
        } => match coordinator.submit_bid(conn, &line) {
            BidOutcome::Accepted { .. } | BidOutcome::Duplicate => {
                *role = Role::Buyer {
                    ordinal: *ordinal,
                    bid_placed: true,
                };
            }
            BidOutcome::NotBidding => early_bids.push_back(line),
            BidOutcome::Invalid | BidOutcome::NotBuyer => {}
        },
        _ => debug!("Ignoring line from connection {}: {:?}", conn, line),
    }
}

fn connection_lost(coordinator: &Coordinator, conn: ConnId, addr: SocketAddr, role: Role) {
    match role {
        Role::Seller { .. } => {
            info!("Seller at {} disconnected", addr);
            coordinator.seller_lost(conn);
        }
        Role::Buyer { ordinal, .. } => {
            info!("Buyer {} at {} disconnected", ordinal, addr);
            coordinator.buyer_lost(conn);
        }
        Role::Rejected => {}
    }
}
