//! Order book types and depth analysis.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::id::TokenId;
use super::money::{Price, Volume};
use crate::core::num::{mid_price, safe_divide, spread};

/// A single price level in the order book.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLevel {
    price: Price,
    size: Volume,
}

impl PriceLevel {
    /// Create a new price level.
    #[must_use]
    pub const fn new(price: Price, size: Volume) -> Self {
        Self { price, size }
    }

    /// Get the price.
    #[must_use]
    pub const fn price(&self) -> Price {
        self.price
    }

    /// Get the size at this level.
    #[must_use]
    pub const fn size(&self) -> Volume {
        self.size
    }
}

/// Order book for a single token: bids descending, asks ascending.
#[derive(Debug, Clone)]
pub struct OrderBook {
    token_id: TokenId,
    bids: Vec<PriceLevel>,
    asks: Vec<PriceLevel>,
    timestamp: DateTime<Utc>,
}

impl OrderBook {
    /// Build a book from unsorted levels, normalizing the sort orders.
    #[must_use]
    pub fn from_unsorted(
        token_id: TokenId,
        mut bids: Vec<PriceLevel>,
        mut asks: Vec<PriceLevel>,
    ) -> Self {
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        Self {
            token_id,
            bids,
            asks,
            timestamp: Utc::now(),
        }
    }

    /// Get the token ID.
    #[must_use]
    pub const fn token_id(&self) -> &TokenId {
        &self.token_id
    }

    /// All bid levels, best first.
    #[must_use]
    pub fn bids(&self) -> &[PriceLevel] {
        &self.bids
    }

    /// All ask levels, best first.
    #[must_use]
    pub fn asks(&self) -> &[PriceLevel] {
        &self.asks
    }

    /// When this snapshot was taken.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Best bid (highest buy price).
    #[must_use]
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    /// Best ask (lowest sell price).
    #[must_use]
    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// Best bid and ask prices together, when both sides exist.
    #[must_use]
    pub fn top(&self) -> Option<(Price, Price)> {
        Some((self.best_bid()?.price(), self.best_ask()?.price()))
    }

    /// Mid price, when both sides exist.
    #[must_use]
    pub fn mid(&self) -> Option<Price> {
        self.top().map(|(bid, ask)| mid_price(bid, ask))
    }

    /// Analyze depth within a relative price range of the top of book.
    ///
    /// Sums level sizes of at least `min_size` on each side within
    /// `[best_bid * (1 - pct_range), best_ask * (1 + pct_range)]`
    /// (`pct_range` is a fraction, 0.1 = 10%). Returns `None` when either
    /// side is empty.
    #[must_use]
    pub fn depth(&self, min_size: Volume, pct_range: Decimal) -> Option<DepthSummary> {
        let best_bid = self.best_bid()?;
        let best_ask = self.best_ask()?;

        let bid_floor = best_bid.price() * (Decimal::ONE - pct_range);
        let ask_ceiling = best_ask.price() * (Decimal::ONE + pct_range);

        let bid_depth = self
            .bids
            .iter()
            .filter(|l| l.price() >= bid_floor && l.size() >= min_size)
            .map(PriceLevel::size)
            .sum();
        let ask_depth: Volume = self
            .asks
            .iter()
            .filter(|l| l.price() <= ask_ceiling && l.size() >= min_size)
            .map(PriceLevel::size)
            .sum();

        Some(DepthSummary {
            best_bid: best_bid.price(),
            best_ask: best_ask.price(),
            best_bid_size: best_bid.size(),
            best_ask_size: best_ask.size(),
            second_best_bid: self.bids.get(1).map_or(best_bid.price(), PriceLevel::price),
            second_best_ask: self.asks.get(1).map_or(best_ask.price(), PriceLevel::price),
            bid_depth,
            ask_depth,
            spread: spread(best_bid.price(), best_ask.price()),
            mid_price: mid_price(best_bid.price(), best_ask.price()),
            liquidity_ratio: safe_divide(bid_depth, ask_depth, Decimal::ZERO),
        })
    }
}

/// Depth analysis of one book within a price range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthSummary {
    pub best_bid: Price,
    pub best_ask: Price,
    pub best_bid_size: Volume,
    pub best_ask_size: Volume,
    pub second_best_bid: Price,
    pub second_best_ask: Price,
    pub bid_depth: Volume,
    pub ask_depth: Volume,
    pub spread: Price,
    pub mid_price: Price,
    /// Bid depth over ask depth; zero when ask depth is zero.
    pub liquidity_ratio: Decimal,
}
