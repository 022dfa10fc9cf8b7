//! WebSocket frame types.

use serde::{Deserialize, Serialize};

use crate::core::domain::{OrderBook, Price, PriceLevel, Side, TokenId, Volume};
use crate::core::exchange::RawLevel;

/// Subscription request for one token's book channel.
#[derive(Debug, Serialize)]
pub struct BookSubscription<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub channel: &'static str,
    pub market: &'a str,
}

impl<'a> BookSubscription<'a> {
    #[must_use]
    pub fn new(token: &'a TokenId) -> Self {
        Self {
            kind: "subscribe",
            channel: "book",
            market: token.as_str(),
        }
    }
}

/// Subscription request for the private user channel.
#[derive(Debug, Serialize)]
pub struct UserSubscription {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub channel: &'static str,
}

impl UserSubscription {
    #[must_use]
    pub fn new() -> Self {
        Self {
            kind: "subscribe",
            channel: "user",
        }
    }
}

impl Default for UserSubscription {
    fn default() -> Self {
        Self::new()
    }
}

/// Frames on the public market stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MarketFrame {
    Book(BookFrame),
    Trade(TradeFrame),
    #[serde(other)]
    Unknown,
}

/// Full book snapshot for one token.
#[derive(Debug, Deserialize)]
pub struct BookFrame {
    pub market: String,
    #[serde(default)]
    pub bids: Vec<RawLevel>,
    #[serde(default)]
    pub asks: Vec<RawLevel>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl BookFrame {
    /// Convert into a domain book, dropping malformed levels.
    #[must_use]
    pub fn to_order_book(&self) -> OrderBook {
        let parse = |levels: &[RawLevel]| {
            levels
                .iter()
                .filter_map(|l| Some(PriceLevel::new(l.price.parse().ok()?, l.size.parse().ok()?)))
                .collect()
        };
        OrderBook::from_unsorted(
            TokenId::new(self.market.clone()),
            parse(&self.bids),
            parse(&self.asks),
        )
    }
}

/// A trade print on the market stream.
#[derive(Debug, Deserialize)]
pub struct TradeFrame {
    pub market: String,
    pub price: String,
    pub size: String,
    pub side: String,
}

impl TradeFrame {
    /// Parse into typed fields; `None` drops a malformed frame.
    #[must_use]
    pub fn parsed(&self) -> Option<(TokenId, Price, Volume, Side)> {
        Some((
            TokenId::new(self.market.clone()),
            self.price.parse().ok()?,
            self.size.parse().ok()?,
            self.side.parse().ok()?,
        ))
    }
}

/// Frames on the private user stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UserFrame {
    Fill(FillFrame),
    Order(OrderFrame),
    Cancel(CancelFrame),
    #[serde(other)]
    Unknown,
}

/// One of our orders (partially) filled.
#[derive(Debug, Deserialize)]
pub struct FillFrame {
    pub order_id: String,
    pub market: String,
    pub side: String,
    pub price: String,
    pub size: String,
}

impl FillFrame {
    /// Parse into typed fields; `None` drops a malformed frame.
    #[must_use]
    pub fn parsed(&self) -> Option<(TokenId, Side, Volume, Price)> {
        Some((
            TokenId::new(self.market.clone()),
            self.side.parse().ok()?,
            self.size.parse().ok()?,
            self.price.parse().ok()?,
        ))
    }
}

/// One of our orders resting on the book.
#[derive(Debug, Deserialize)]
pub struct OrderFrame {
    pub order_id: String,
    pub market: String,
    pub side: String,
    pub price: String,
    pub size: String,
}

impl OrderFrame {
    /// Parse into typed fields; `None` drops a malformed frame.
    #[must_use]
    pub fn parsed(&self) -> Option<(TokenId, Side, Price, Volume)> {
        Some((
            TokenId::new(self.market.clone()),
            self.side.parse().ok()?,
            self.price.parse().ok()?,
            self.size.parse().ok()?,
        ))
    }
}

/// One of our orders cancelled.
#[derive(Debug, Deserialize)]
pub struct CancelFrame {
    pub order_id: String,
    pub market: String,
    #[serde(default)]
    pub side: Option<String>,
}
