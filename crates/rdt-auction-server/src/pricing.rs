use rdt_auction_proto::AuctionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<B> {
    Sold { winner: B, highest: u64, payment: u64 },
    /// The highest bid was below the reserve price.
    Unsold { highest: u64 },
}

/// Decide a sealed-bid round. `bids` must be in the order they were accepted;
/// the earliest of several equal highest bids wins.
pub fn resolve<B: Copy>(
    kind: AuctionKind,
    reserve_price: u64,
    bids: &[(B, u64)],
) -> Resolution<B> {
    let mut best: Option<(B, u64)> = None;
    for &(bidder, amount) in bids {
        if best.is_none_or(|(_, top)| amount > top) {
            best = Some((bidder, amount));
        }
    }
    let Some((winner, highest)) = best else {
        return Resolution::Unsold { highest: 0 };
    };
    if highest < reserve_price {
        return Resolution::Unsold { highest };
    }

    let payment = match kind {
        AuctionKind::FirstPrice => highest,
        AuctionKind::SecondPrice => second_price(reserve_price, bids),
    };
    Resolution::Sold {
        winner,
        highest,
        payment,
    }
}

/// Second-highest value among all bids and the reserve price.
fn second_price<B>(reserve_price: u64, bids: &[(B, u64)]) -> u64 {
    let mut values: Vec<u64> = bids.iter().map(|&(_, amount)| amount).collect();
    values.push(reserve_price);
    values.sort_unstable_by(|a, b| b.cmp(a));
    values.get(1).copied().unwrap_or(reserve_price)
}
