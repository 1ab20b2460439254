//! The seller and buyer sides of the control-channel conversation.

use std::net::IpAddr;

use rdt_auction_proto::Notice;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, Lines};
use tracing::debug;

use crate::control::ControlChannel;
use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SellerOutcome {
    Sold {
        item: String,
        payment: u64,
        buyer_ip: IpAddr,
    },
    NotSold {
        reserve_price: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuyerOutcome {
    Won {
        item: String,
        payment: u64,
        seller_ip: IpAddr,
    },
    Lost,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The server turned the connection away with this notice.
    Rejected(Notice),
    Seller(SellerOutcome),
    Buyer(BuyerOutcome),
}

/// Take part in one auction round: the first notice decides the role.
pub async fn negotiate<S, I>(
    channel: &mut ControlChannel<S>,
    input: &mut Lines<I>,
) -> Result<Outcome, ClientError>
where
    S: AsyncRead + AsyncWrite,
    I: AsyncBufRead + Unpin,
{
    match channel.recv().await? {
        Some(Notice::SubmitRequest) => {
            println!("Your role is: [Seller]");
            seller(channel, input).await.map(Outcome::Seller)
        }
        Some(Notice::WaitingForBuyers) => {
            println!("Your role is: [Buyer]");
            println!("The Auctioneer is still waiting for other Buyers to connect...");
            buyer(channel, input).await.map(Outcome::Buyer)
        }
        Some(other) => {
            println!("{other}");
            Ok(Outcome::Rejected(other))
        }
        None => {
            println!("Server is busy. Try to connect again later.");
            Ok(Outcome::Rejected(Notice::ServerBusy))
        }
    }
}

async fn ask<I: AsyncBufRead + Unpin>(
    input: &mut Lines<I>,
    question: &str,
) -> Result<String, ClientError> {
    loop {
        println!("{question}");
        match input.next_line().await? {
            Some(line) if line.trim().is_empty() => continue,
            Some(line) => return Ok(line.trim().to_string()),
            None => return Err(ClientError::InputClosed),
        }
    }
}

async fn expect_notice<S: AsyncRead + AsyncWrite>(
    channel: &mut ControlChannel<S>,
) -> Result<Notice, ClientError> {
    channel.recv().await?.ok_or(ClientError::ServerClosed)
}

async fn seller<S, I>(
    channel: &mut ControlChannel<S>,
    input: &mut Lines<I>,
) -> Result<SellerOutcome, ClientError>
where
    S: AsyncRead + AsyncWrite,
    I: AsyncBufRead + Unpin,
{
    loop {
        let request = ask(input, "Please submit auction request:").await?;
        channel.send(&request).await?;
        match expect_notice(channel).await? {
            Notice::RequestReceived(_) => {
                println!("Server: Auction start.");
                break;
            }
            Notice::InvalidRequest => println!("Server: {}", Notice::InvalidRequest),
            other => debug!("Unexpected reply to auction request: {}", other),
        }
    }

    let mut sold: Option<SellerOutcome> = None;
    while let Some(notice) = channel.recv().await? {
        match notice {
            Notice::Sold {
                item,
                payment,
                buyer_ip,
            } => {
                println!("Auction finished!");
                println!(
                    "Success! Your item {item} has been sold for ${payment} Buyer IP: {buyer_ip}"
                );
                println!("Disconnecting from the Auctioneer server. Auction is over!");
                sold = Some(SellerOutcome::Sold {
                    item,
                    payment,
                    buyer_ip,
                });
            }
            Notice::WinningBuyerIp(ip) => {
                if let Some(SellerOutcome::Sold { buyer_ip, .. }) = &mut sold {
                    *buyer_ip = ip;
                }
                break;
            }
            Notice::NotSold { reserve_price } => {
                println!("Auction finished!");
                println!(
                    "Unfortunately, your item was not sold as all bids were below the minimum price."
                );
                println!("Disconnecting from the Auctioneer server. Auction is over!");
                return Ok(SellerOutcome::NotSold { reserve_price });
            }
            other => debug!("Seller ignoring notice: {}", other),
        }
    }
    sold.ok_or(ClientError::ServerClosed)
}

async fn buyer<S, I>(
    channel: &mut ControlChannel<S>,
    input: &mut Lines<I>,
) -> Result<BuyerOutcome, ClientError>
where
    S: AsyncRead + AsyncWrite,
    I: AsyncBufRead + Unpin,
{
    loop {
        match expect_notice(channel).await? {
            Notice::BiddingStart => break,
            other => debug!("Waiting for bidding, got: {}", other),
        }
    }
    println!("The bidding has started!");

    loop {
        let bid = ask(input, "Please submit your bid:").await?;
        channel.send(&bid).await?;
        let reply = expect_notice(channel).await?;
        println!("Server: {reply}");
        match reply {
            Notice::BidReceived => break,
            Notice::InvalidBid => continue,
            other => debug!("Unexpected reply to bid: {}", other),
        }
    }

    let mut won: Option<(String, u64, IpAddr)> = None;
    let mut seller_ip: Option<IpAddr> = None;
    let mut lost = false;
    while let Some(notice) = channel.recv().await? {
        match notice {
            Notice::Won {
                item,
                payment,
                seller_ip: ip,
            } => {
                println!("Server: You won the item '{item}'! Your payment due is ${payment}.");
                won = Some((item, payment, ip));
            }
            Notice::SellerIp(ip) => {
                seller_ip = Some(ip);
                break;
            }
            Notice::DidNotWin => {
                println!("Server: {}", Notice::DidNotWin);
                lost = true;
            }
            other => println!("Server: {other}"),
        }
    }

    match won {
        Some((item, payment, announced)) => Ok(BuyerOutcome::Won {
            item,
            payment,
            seller_ip: seller_ip.unwrap_or(announced),
        }),
        None if lost => Ok(BuyerOutcome::Lost),
        None => Err(ClientError::ServerClosed),
    }
}
