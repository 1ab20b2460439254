//! Server-to-client lines of the control channel.
//!
//! Clients find their way through the conversation by looking for fixed
//! phrases ("sold for $", "SELLER_IP ", ...). Those
//! phrases are reproduced verbatim by [`Notice`]'s `Display` impl, and
//! [`Notice::parse`] turns a received line back into a variant so that no
//! other code has to search free text.

use std::fmt;
use std::net::IpAddr;

pub const SUBMIT_REQUEST: &str = "submit an auction request";
pub const INVALID_REQUEST: &str = "Invalid auction request!";
pub const REQUEST_RECEIVED: &str = "Auction request received: ";
pub const SERVER_BUSY: &str = "Server is busy. Try to connect again later.";
pub const AUCTION_IN_PROGRESS: &str = "Server busy, auction in progress!";
pub const WAITING_FOR_BUYERS: &str = "waiting for other Buyers";
pub const BIDDING_START: &str = "Bidding start! Please submit your bid.";
pub const INVALID_BID: &str = "Invalid bid. Please submit a positive integer!";
pub const BID_RECEIVED: &str = "Bid received. Please wait...";
pub const AUCTION_FINISHED: &str = "Auction finished!";
pub const DID_NOT_WIN: &str = "Unfortunately you did not win in the last round.";
pub const DISCONNECTING: &str = "Disconnecting from the Auctioneer server. Auction is over!";
pub const SELLER_IP: &str = "SELLER_IP";
pub const WINNING_BUYER_IP: &str = "WINNING_BUYER_IP";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// First line a seller sees.
    SubmitRequest,
    InvalidRequest,
    /// Echo of the accepted request line.
    RequestReceived(String),
    /// Rejection while the seller has not submitted its request yet.
    ServerBusy,
    /// Rejection once the roster is full.
    AuctionInProgress,
    /// First line a buyer sees.
    WaitingForBuyers,
    BiddingStart,
    InvalidBid,
    BidReceived,
    AuctionFinished,
    /// Seller's sale report.
    Sold {
        item: String,
        payment: u64,
        buyer_ip: IpAddr,
    },
    NotSold {
        reserve_price: u64,
    },
    /// Winner's notice.
    Won {
        item: String,
        payment: u64,
        seller_ip: IpAddr,
    },
    DidNotWin,
    Disconnecting,
    SellerIp(IpAddr),
    WinningBuyerIp(IpAddr),
    /// Anything this client does not recognise.
    Other(String),
}

impl Notice {
    pub fn parse(line: &str) -> Notice {
        let line = line.trim();
        match line {
            SUBMIT_REQUEST => return Notice::SubmitRequest,
            INVALID_REQUEST => return Notice::InvalidRequest,
            SERVER_BUSY => return Notice::ServerBusy,
            AUCTION_IN_PROGRESS => return Notice::AuctionInProgress,
            WAITING_FOR_BUYERS => return Notice::WaitingForBuyers,
            BIDDING_START => return Notice::BiddingStart,
            INVALID_BID => return Notice::InvalidBid,
            BID_RECEIVED => return Notice::BidReceived,
            AUCTION_FINISHED => return Notice::AuctionFinished,
            DID_NOT_WIN => return Notice::DidNotWin,
            DISCONNECTING => return Notice::Disconnecting,
            _ => {}
        }

        if let Some(echo) = line.strip_prefix(REQUEST_RECEIVED.trim_end()) {
            return Notice::RequestReceived(echo.trim().to_string());
        }
        if let Some(ip) = address_after(line, SELLER_IP) {
            return Notice::SellerIp(ip);
        }
        if let Some(ip) = address_after(line, WINNING_BUYER_IP) {
            return Notice::WinningBuyerIp(ip);
        }
        if line.contains("Item not sold")
            && let Some(reserve_price) = line
                .rsplit_once('$')
                .and_then(|(_, tail)| tail.trim_end_matches('.').parse().ok())
        {
            return Notice::NotSold { reserve_price };
        }
        if line.contains("sold for $")
            && line.contains("Winning buyer IP")
            && let Some(notice) = parse_sold(line)
        {
            return notice;
        }
        if line.contains("You won the item")
            && let Some(notice) = parse_won(line)
        {
            return notice;
        }
        Notice::Other(line.to_string())
    }
}

fn address_after(line: &str, tag: &str) -> Option<IpAddr> {
    let mut words = line.split_whitespace();
    if words.next()? != tag {
        return None;
    }
    let ip = words.next()?.parse().ok()?;
    words.next().is_none().then_some(ip)
}

fn quoted_item(line: &str) -> Option<String> {
    let (_, rest) = line.split_once('\'')?;
    let (item, _) = rest.rsplit_once('\'')?;
    Some(item.to_string())
}

fn amount_after(line: &str, marker: &str) -> Option<u64> {
    let (_, rest) = line.split_once(marker)?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn parse_sold(line: &str) -> Option<Notice> {
    let item = quoted_item(line)?;
    let payment = amount_after(line, "sold for $")?;
    let (_, ip) = line.rsplit_once("Winning buyer IP:")?;
    Some(Notice::Sold {
        item,
        payment,
        buyer_ip: ip.trim().parse().ok()?,
    })
}

fn parse_won(line: &str) -> Option<Notice> {
    let item = quoted_item(line)?;
    let payment = amount_after(line, "payment due is $")?;
    let (_, ip) = line.rsplit_once("Seller IP:")?;
    Some(Notice::Won {
        item,
        payment,
        seller_ip: ip.trim().parse().ok()?,
    })
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::SubmitRequest => f.write_str(SUBMIT_REQUEST),
            Notice::InvalidRequest => f.write_str(INVALID_REQUEST),
            Notice::RequestReceived(echo) => write!(f, "{REQUEST_RECEIVED}{echo}"),
            Notice::ServerBusy => f.write_str(SERVER_BUSY),
            Notice::AuctionInProgress => f.write_str(AUCTION_IN_PROGRESS),
            Notice::WaitingForBuyers => f.write_str(WAITING_FOR_BUYERS),
            Notice::BiddingStart => f.write_str(BIDDING_START),
            Notice::InvalidBid => f.write_str(INVALID_BID),
            Notice::BidReceived => f.write_str(BID_RECEIVED),
            Notice::AuctionFinished => f.write_str(AUCTION_FINISHED),
            Notice::Sold {
                item,
                payment,
                buyer_ip,
            } => write!(
                f,
                "{AUCTION_FINISHED} Item '{item}' sold for ${payment}. Winning buyer IP: {buyer_ip}"
            ),
            Notice::NotSold { reserve_price } => write!(
                f,
                "Item not sold. All bids were below the minimum price of ${reserve_price}."
            ),
            Notice::Won {
                item,
                payment,
                seller_ip,
            } => write!(
                f,
                "You won the item '{item}'! Your payment due is ${payment}. Seller IP: {seller_ip}"
            ),
            Notice::DidNotWin => f.write_str(DID_NOT_WIN),
            Notice::Disconnecting => f.write_str(DISCONNECTING),
            Notice::SellerIp(ip) => write!(f, "{SELLER_IP} {ip}"),
            Notice::WinningBuyerIp(ip) => write!(f, "{WINNING_BUYER_IP} {ip}"),
            Notice::Other(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const BUYER: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7));
    const SELLER: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

    #[test]
    fn sale_report_keeps_wire_phrases() {
        let notice = Notice::Sold {
            item: "lamp".into(),
            payment: 55,
            buyer_ip: BUYER,
        };
        let line = notice.to_string();
        assert!(line.contains("sold for $55"));
        assert!(line.contains("Winning buyer IP: 10.0.0.7"));
        assert_eq!(Notice::parse(&line), notice);
    }

    #[test]
    fn winner_notice_parses_payment_and_seller() {
        let line = "You won the item 'old lamp'! Your payment due is $70. Seller IP: 10.0.0.2";
        assert_eq!(
            Notice::parse(line),
            Notice::Won {
                item: "old lamp".into(),
                payment: 70,
                seller_ip: SELLER,
            }
        );
    }

    #[test]
    fn address_exchange_lines() {
        assert_eq!(Notice::parse("SELLER_IP 10.0.0.2\n"), Notice::SellerIp(SELLER));
        assert_eq!(
            Notice::WinningBuyerIp(BUYER).to_string(),
            "WINNING_BUYER_IP 10.0.0.7"
        );
        assert!(matches!(Notice::parse("SELLER_IP nowhere"), Notice::Other(_)));
    }

    #[test]
    fn not_sold_reports_reserve() {
        let line = Notice::NotSold { reserve_price: 50 }.to_string();
        assert!(line.contains("Item not sold"));
        assert_eq!(Notice::parse(&line), Notice::NotSold { reserve_price: 50 });
    }

    #[test]
    fn fixed_phrases() {
        assert_eq!(Notice::parse(BIDDING_START), Notice::BiddingStart);
        assert_eq!(Notice::parse("waiting for other Buyers"), Notice::WaitingForBuyers);
        assert_eq!(
            Notice::parse("Auction request received: 1 10 2 lamp"),
            Notice::RequestReceived("1 10 2 lamp".into())
        );
        assert_eq!(Notice::parse("hello"), Notice::Other("hello".into()));
    }
}
