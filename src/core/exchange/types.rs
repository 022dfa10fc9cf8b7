//! CLOB REST wire types and their normalized forms.
//!
//! The exchange serializes decimals as strings and sizes in base units
//! (x 1e6); wire records keep the strings and normalization happens in
//! one place.

use async_trait::async_trait;
use serde::Deserialize;

use crate::core::domain::{from_base_units, MarketId, Price, Side, TokenId, Volume};
use crate::error::Result;

/// Arguments for a new order, already unit-normalized and quantized.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderArgs {
    pub token_id: TokenId,
    pub side: Side,
    pub price: Price,
    pub size: Volume,
    pub neg_risk: bool,
}

/// Descriptor returned by the exchange for an accepted order.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderDescriptor {
    #[serde(alias = "orderID")]
    pub order_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// An open order as returned by the REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiOrder {
    pub id: String,
    pub asset_id: String,
    pub side: String,
    /// Human-unit price, decimal string.
    pub price: String,
    /// Base-unit size, decimal string.
    pub size: String,
}

impl ApiOrder {
    /// Parse into a normalized record; `None` drops malformed rows.
    #[must_use]
    pub fn normalize(&self) -> Option<OpenOrder> {
        Some(OpenOrder {
            id: self.id.clone(),
            token_id: TokenId::new(self.asset_id.clone()),
            side: self.side.parse().ok()?,
            price: self.price.parse().ok()?,
            size: from_base_units(self.size.parse().ok()?),
        })
    }
}

/// A normalized open order: typed side, human units.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOrder {
    pub id: String,
    pub token_id: TokenId,
    pub side: Side,
    pub price: Price,
    pub size: Volume,
}

/// An on-chain position as returned by the REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiPosition {
    pub asset_id: String,
    /// Base-unit size, decimal string.
    pub size: String,
    /// Human-unit average entry, decimal string.
    pub avg_entry_price: String,
}

impl ApiPosition {
    /// Parse into a normalized record; `None` drops malformed rows.
    #[must_use]
    pub fn normalize(&self) -> Option<AccountPosition> {
        let size_base: u64 = self.size.parse().ok()?;
        Some(AccountPosition {
            token_id: TokenId::new(self.asset_id.clone()),
            size_base,
            size: from_base_units(size_base),
            avg_price: self.avg_entry_price.parse().ok()?,
        })
    }
}

/// A normalized account position in both unit systems.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountPosition {
    pub token_id: TokenId,
    pub size_base: u64,
    pub size: Volume,
    pub avg_price: Price,
}

/// Price level as received over REST (strings, not decimals).
#[derive(Debug, Clone, Deserialize)]
pub struct RawLevel {
    pub price: String,
    pub size: String,
}

/// Order-book snapshot as returned by the REST API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiBook {
    #[serde(default)]
    pub bids: Vec<RawLevel>,
    #[serde(default)]
    pub asks: Vec<RawLevel>,
}

/// Raw exchange operations, in exchange units.
///
/// The trait is the seam between the engine and the venue: production
/// uses [`super::HttpClobApi`], tests drive the trading stack through a
/// mock.
#[async_trait]
pub trait ClobApi: Send + Sync {
    async fn create_order(&self, args: &OrderArgs) -> Result<OrderDescriptor>;

    async fn cancel_order(&self, order_id: &str) -> Result<()>;

    async fn open_orders(&self) -> Result<Vec<ApiOrder>>;

    async fn positions(&self) -> Result<Vec<ApiPosition>>;

    async fn order_book(&self, token: &TokenId) -> Result<ApiBook>;

    /// Merge `amount_base` base units of the market's two tokens back
    /// into collateral.
    async fn merge_positions(
        &self,
        amount_base: u64,
        condition_id: &MarketId,
        neg_risk: bool,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn api_order_normalizes_units_and_side() {
        let order = ApiOrder {
            id: "o-1".to_string(),
            asset_id: "tok".to_string(),
            side: "buy".to_string(),
            price: "0.42".to_string(),
            size: "50000000".to_string(),
        };
        let open = order.normalize().unwrap();
        assert_eq!(open.side, Side::Buy);
        assert_eq!(open.price, dec!(0.42));
        assert_eq!(open.size, dec!(50));
    }

    #[test]
    fn malformed_order_rows_are_dropped() {
        let order = ApiOrder {
            id: "o-1".to_string(),
            asset_id: "tok".to_string(),
            side: "hold".to_string(),
            price: "0.42".to_string(),
            size: "50000000".to_string(),
        };
        assert!(order.normalize().is_none());
    }

    #[test]
    fn api_position_normalizes_base_units() {
        let pos = ApiPosition {
            asset_id: "tok".to_string(),
            size: "30000000".to_string(),
            avg_entry_price: "0.4333".to_string(),
        };
        let norm = pos.normalize().unwrap();
        assert_eq!(norm.size_base, 30_000_000);
        assert_eq!(norm.size, dec!(30));
        assert_eq!(norm.avg_price, dec!(0.4333));
    }

    #[test]
    fn api_book_deserializes_with_missing_sides() {
        let book: ApiBook = serde_json::from_str(r#"{"bids": [{"price": "0.4", "size": "10"}]}"#)
            .unwrap();
        assert_eq!(book.bids.len(), 1);
        assert!(book.asks.is_empty());
    }
}
