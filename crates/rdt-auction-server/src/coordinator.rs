//! The single live auction round and every transition it goes through.
//!
//! Sessions never touch the round directly. They call one of the operations
//! below, which take the coordinator-wide lock, update the round and queue
//! the resulting notices on the affected connections' outboxes. A session
//! only learns from the return value what role it now plays.

use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rdt_auction_proto::{AuctionRequest, Notice, RequestError, parse_bid};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::pricing::{self, Resolution};

pub type ConnId = u64;

/// Per-connection queue of lines to write; dropping it closes the session.
pub type Outbox = UnboundedSender<Notice>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundStatus {
    AwaitingSeller,
    AwaitingBuyers,
    Bidding,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Seller,
    Buyer { ordinal: usize },
    /// The seller has not submitted its request yet.
    Busy,
    /// The roster is already full.
    InProgress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Accepted(AuctionRequest),
    Invalid(RequestError),
    NotSeller,
    AlreadySubmitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidOutcome {
    Accepted { amount: u64, resolved: bool },
    Invalid,
    /// This buyer's bid is already recorded.
    Duplicate,
    /// Bidding has not started for this buyer yet.
    NotBidding,
    NotBuyer,
}

struct Party {
    conn: ConnId,
    addr: SocketAddr,
    outbox: Outbox,
}

impl Party {
    fn notify(&self, notice: Notice) {
        if self.outbox.send(notice).is_err() {
            debug!("Connection {} already closed, notice discarded", self.conn);
        }
    }
}

struct Buyer {
    party: Party,
    ordinal: usize,
}

struct AuctionRound {
    status: RoundStatus,
    seller: Option<Party>,
    request: Option<AuctionRequest>,
    buyers: Vec<Buyer>,
    /// Accepted bids in arrival order, at most one per buyer.
    bids: Vec<(ConnId, u64)>,
    buyers_admitted: usize,
}

impl AuctionRound {
    fn new() -> Self {
        Self {
            status: RoundStatus::AwaitingSeller,
            seller: None,
            request: None,
            buyers: Vec::new(),
            bids: Vec::new(),
            buyers_admitted: 0,
        }
    }

    fn is_seller(&self, conn: ConnId) -> bool {
        self.seller.as_ref().is_some_and(|s| s.conn == conn)
    }

    fn buyer(&self, conn: ConnId) -> Option<&Buyer> {
        self.buyers.iter().find(|b| b.party.conn == conn)
    }

    fn notify_seller(&self, notice: Notice) {
        if let Some(seller) = &self.seller {
            seller.notify(notice);
        }
    }

    fn admit_buyer(&mut self, conn: ConnId, addr: SocketAddr, outbox: Outbox) -> Admission {
        let target = self.request.as_ref().map_or(0, |r| r.target_buyers);
        if self.status != RoundStatus::AwaitingBuyers || self.buyers.len() >= target {
            info!("Extra Buyer tried to join. Informing that the auction is full.");
            // The outbox is dropped after this notice, which closes the connection.
            let _ = outbox.send(Notice::AuctionInProgress);
            return Admission::InProgress;
        }

        self.buyers_admitted += 1;
        let ordinal = self.buyers_admitted;
        info!("Buyer {} is connected from {}", ordinal, addr);
        let party = Party { conn, addr, outbox };
        party.notify(Notice::WaitingForBuyers);
        self.buyers.push(Buyer { party, ordinal });

        if self.buyers.len() == target {
            info!("Requested number of bidders arrived. Let's start bidding!");
            self.status = RoundStatus::Bidding;
            for buyer in &self.buyers {
                buyer.party.notify(Notice::BiddingStart);
            }
        }
        Admission::Buyer { ordinal }
    }

    fn resolve(&mut self) {
        let (Some(request), Some(seller)) = (&self.request, &self.seller) else {
            warn!("Resolution without a seller request; resetting");
            return;
        };
        self.status = RoundStatus::Resolved;

        match pricing::resolve(request.kind, request.reserve_price, &self.bids) {
            Resolution::Sold {
                winner,
                highest,
                payment,
            } => {
                info!(
                    ">> Item sold! The highest bid is ${}. The actual payment is ${}",
                    highest, payment
                );
                let Some(winner) = self.buyer(winner) else {
                    warn!("Winning bid from a buyer no longer on the roster");
                    return;
                };
                let buyer_ip = winner.party.addr.ip();
                let seller_ip = seller.addr.ip();

                seller.notify(Notice::Sold {
                    item: request.item_name.clone(),
                    payment,
                    buyer_ip,
                });
                seller.notify(Notice::WinningBuyerIp(buyer_ip));

                winner.party.notify(Notice::AuctionFinished);
                winner.party.notify(Notice::Won {
                    item: request.item_name.clone(),
                    payment,
                    seller_ip,
                });
                winner.party.notify(Notice::Disconnecting);
                winner.party.notify(Notice::SellerIp(seller_ip));
                info!(
                    "Buyer {} at {} won; exchanged addresses with seller at {}",
                    winner.ordinal, buyer_ip, seller_ip
                );

                for loser in self.buyers.iter().filter(|b| b.party.conn != winner.party.conn) {
                    notify_loser(&loser.party);
                }
            }
            Resolution::Unsold { .. } => {
                info!(
                    ">> All bids are below the minimum price of ${}. The item is not sold.",
                    request.reserve_price
                );
                seller.notify(Notice::NotSold {
                    reserve_price: request.reserve_price,
                });
                for buyer in &self.buyers {
                    notify_loser(&buyer.party);
                }
            }
        }
    }
}

fn notify_loser(party: &Party) {
    party.notify(Notice::AuctionFinished);
    party.notify(Notice::DidNotWin);
    party.notify(Notice::Disconnecting);
}

/// Owner of the process-wide auction round.
pub struct Coordinator {
    round: Mutex<AuctionRound>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            round: Mutex::new(AuctionRound::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AuctionRound> {
        // No transition leaves the round half-updated.
        self.round.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> RoundStatus {
        self.lock().status
    }

    /// The accepted request of the current round, if any.
    pub fn current_request(&self) -> Option<AuctionRequest> {
        self.lock().request.clone()
    }

    /// Assign a role to a new connection. Rejected connections get their
    /// notice queued and their outbox dropped.
    pub fn connect(&self, conn: ConnId, addr: SocketAddr, outbox: Outbox) -> Admission {
        let mut round = self.lock();
        match round.status {
            RoundStatus::AwaitingSeller => {
                info!("Seller is connected from {}", addr);
                let seller = Party { conn, addr, outbox };
                seller.notify(Notice::SubmitRequest);
                round.seller = Some(seller);
                round.status = RoundStatus::AwaitingBuyers;
                Admission::Seller
            }
            RoundStatus::AwaitingBuyers if round.request.is_none() => {
                info!("Buyer tried to connect before auction request submission.");
                let _ = outbox.send(Notice::ServerBusy);
                Admission::Busy
            }
            _ => round.admit_buyer(conn, addr, outbox),
        }
    }

    pub fn submit_seller_request(&self, conn: ConnId, line: &str) -> RequestOutcome {
        let parsed = line.parse::<AuctionRequest>();
        let echo = line.trim().to_string();

        let mut round = self.lock();
        if !round.is_seller(conn) {
            return RequestOutcome::NotSeller;
        }
        if round.request.is_some() {
            return RequestOutcome::AlreadySubmitted;
        }
        match parsed {
            Ok(request) => {
                round.notify_seller(Notice::RequestReceived(echo));
                info!("Auction request received. Now waiting for Buyers.");
                round.request = Some(request.clone());
                RequestOutcome::Accepted(request)
            }
            Err(err) => {
                debug!("Rejecting auction request {:?}: {}", echo, err);
                round.notify_seller(Notice::InvalidRequest);
                RequestOutcome::Invalid(err)
            }
        }
    }

    /// Record a buyer's bid; the last missing bid resolves the round and
    /// resets it before the lock is released.
    pub fn submit_bid(&self, conn: ConnId, text: &str) -> BidOutcome {
        let amount = parse_bid(text);

        let mut round = self.lock();
        let Some(buyer) = round.buyer(conn) else {
            return BidOutcome::NotBuyer;
        };
        if round.status != RoundStatus::Bidding {
            return BidOutcome::NotBidding;
        }
        if round.bids.iter().any(|(bidder, _)| *bidder == conn) {
            return BidOutcome::Duplicate;
        }
        let Some(amount) = amount else {
            buyer.party.notify(Notice::InvalidBid);
            return BidOutcome::Invalid;
        };

        info!(">> Buyer {} bid ${}", buyer.ordinal, amount);
        buyer.party.notify(Notice::BidReceived);
        round.bids.push((conn, amount));

        let target = round.request.as_ref().map_or(0, |r| r.target_buyers);
        let resolved = round.bids.len() == target;
        if resolved {
            round.resolve();
            *round = AuctionRound::new();
        }
        BidOutcome::Accepted { amount, resolved }
    }

    /// Discard the current round; every session still attached to it is
    /// closed once its queued notices are written.
    pub fn reset(&self) {
        *self.lock() = AuctionRound::new();
    }

    pub fn seller_lost(&self, conn: ConnId) {
        let mut round = self.lock();
        if !round.is_seller(conn) {
            return;
        }
        if round.request.is_none() {
            info!("Seller left before submitting a request; waiting for a new seller");
            *round = AuctionRound::new();
        } else {
            warn!("Seller disconnected during the auction; its results will be discarded");
        }
    }

    pub fn buyer_lost(&self, conn: ConnId) {
        let mut round = self.lock();
        let Some(pos) = round.buyers.iter().position(|b| b.party.conn == conn) else {
            return;
        };
        match round.status {
            RoundStatus::AwaitingBuyers => {
                let buyer = round.buyers.remove(pos);
                info!("Buyer {} left before bidding started", buyer.ordinal);
            }
            _ => warn!(
                "Buyer {} disconnected during bidding; the round waits for its bid",
                round.buyers[pos].ordinal
            ),
        }
    }
}
