use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pricing rule of a round. On the wire `1` selects first price and `0`
/// second price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionKind {
    FirstPrice,
    SecondPrice,
}

impl AuctionKind {
    pub fn wire_value(self) -> u8 {
        match self {
            AuctionKind::FirstPrice => 1,
            AuctionKind::SecondPrice => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("expected 4 fields, got {0}")]
    FieldCount(usize),
    #[error("unknown auction type {0:?}")]
    Kind(String),
    #[error("reserve price {0:?} is not a non-negative integer")]
    ReservePrice(String),
    #[error("buyer count {0:?} is not a positive integer")]
    BuyerCount(String),
}

/// The seller's parameters for one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionRequest {
    pub kind: AuctionKind,
    pub reserve_price: u64,
    pub target_buyers: usize,
    pub item_name: String,
}

impl FromStr for AuctionRequest {
    type Err = RequestError;

    /// Parses `<type> <reserve> <buyers> <item>`; the item name is a single
    /// whitespace-free token.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        let [kind, reserve, buyers, item] = fields[..] else {
            return Err(RequestError::FieldCount(fields.len()));
        };

        let kind = match kind {
            "1" => AuctionKind::FirstPrice,
            "0" => AuctionKind::SecondPrice,
            other => return Err(RequestError::Kind(other.to_string())),
        };
        let reserve_price = reserve
            .parse()
            .map_err(|_| RequestError::ReservePrice(reserve.to_string()))?;
        let target_buyers = buyers
            .parse()
            .ok()
            .filter(|n: &usize| *n > 0)
            .ok_or_else(|| RequestError::BuyerCount(buyers.to_string()))?;

        Ok(Self {
            kind,
            reserve_price,
            target_buyers,
            item_name: item.to_string(),
        })
    }
}

impl fmt::Display for AuctionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.kind.wire_value(),
            self.reserve_price,
            self.target_buyers,
            self.item_name
        )
    }
}

/// A bid must be a positive decimal integer and nothing else.
pub fn parse_bid(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok().filter(|bid| *bid > 0)
}
