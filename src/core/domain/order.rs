//! Resting-order records and the buy/sell discriminator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::money::{Price, Volume};

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Uppercase wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("buy") {
            Ok(Side::Buy)
        } else if s.eq_ignore_ascii_case("sell") {
            Ok(Side::Sell)
        } else {
            Err(format!("invalid side: {s}"))
        }
    }
}

/// One tracked resting quote: the last known `(price, size)` on a side.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RestingOrder {
    pub price: Price,
    pub size: Volume,
}

impl RestingOrder {
    #[must_use]
    pub fn new(price: Price, size: Volume) -> Self {
        Self { price, size }
    }

    /// True when nothing is resting on this side.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size.is_zero()
    }
}

/// Both sides' resting quotes for one token.
///
/// The exchange may carry several orders per side; tracking aggregates
/// them: buy sizes sum under the highest buy price, sell sizes sum under
/// the lowest sell price.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TokenOrders {
    pub buy: RestingOrder,
    pub sell: RestingOrder,
}

impl TokenOrders {
    /// Fold one open order from the exchange into the aggregate.
    pub fn absorb(&mut self, side: Side, price: Price, size: Volume) {
        match side {
            Side::Buy => {
                self.buy.size += size;
                self.buy.price = self.buy.price.max(price);
            }
            Side::Sell => {
                self.sell.size += size;
                // 0 marks "no sell yet"; live sell prices are at least one tick.
                self.sell.price = if self.sell.price.is_zero() {
                    price
                } else {
                    self.sell.price.min(price)
                };
            }
        }
    }

    /// Record of one side.
    #[must_use]
    pub fn side(&self, side: Side) -> RestingOrder {
        match side {
            Side::Buy => self.buy,
            Side::Sell => self.sell,
        }
    }

    /// Overwrite one side's record.
    pub fn set_side(&mut self, side: Side, order: RestingOrder) {
        match side {
            Side::Buy => self.buy = order,
            Side::Sell => self.sell = order,
        }
    }

    /// True if anything is resting on either side.
    #[must_use]
    pub fn has_any(&self) -> bool {
        !self.buy.is_empty() || !self.sell.is_empty()
    }

    /// Zero both sides.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn side_parses_case_insensitively() {
        assert_eq!("buy".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!("SELL".parse::<Side>().unwrap(), Side::Sell);
        assert_eq!("Buy".parse::<Side>().unwrap(), Side::Buy);
        assert!("hold".parse::<Side>().is_err());
    }

    #[test]
    fn absorb_keeps_max_buy_price_and_sums_sizes() {
        let mut orders = TokenOrders::default();
        orders.absorb(Side::Buy, dec!(0.42), dec!(50));
        orders.absorb(Side::Buy, dec!(0.44), dec!(25));
        orders.absorb(Side::Buy, dec!(0.40), dec!(10));

        assert_eq!(orders.buy.price, dec!(0.44));
        assert_eq!(orders.buy.size, dec!(85));
    }

    #[test]
    fn absorb_keeps_min_sell_price_and_sums_sizes() {
        let mut orders = TokenOrders::default();
        orders.absorb(Side::Sell, dec!(0.55), dec!(30));
        orders.absorb(Side::Sell, dec!(0.51), dec!(20));
        orders.absorb(Side::Sell, dec!(0.58), dec!(5));

        assert_eq!(orders.sell.price, dec!(0.51));
        assert_eq!(orders.sell.size, dec!(55));
    }

    #[test]
    fn has_any_and_clear() {
        let mut orders = TokenOrders::default();
        assert!(!orders.has_any());

        orders.set_side(Side::Buy, RestingOrder::new(dec!(0.42), dec!(100)));
        assert!(orders.has_any());

        orders.clear();
        assert!(!orders.has_any());
        assert_eq!(orders.buy.price, Decimal::ZERO);
    }
}
