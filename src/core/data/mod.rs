//! In-memory market-data aggregator.
//!
//! Keeps per-token order books, a bounded mid-price history, and a
//! bounded trade history, and answers the analytics queries the risk and
//! strategy code ask: depth, rolling volatility, price change, VWAP, and
//! data freshness.

mod history;

pub use history::History;

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use crate::core::domain::{DepthSummary, OrderBook, Price, Side, TokenId, Volume};

/// Retained mid-price points per token.
const PRICE_HISTORY_CAP: usize = 1000;
/// Retained trades per token.
const TRADE_HISTORY_CAP: usize = 500;
/// Minimum samples inside the window for a volatility estimate.
const MIN_VOLATILITY_SAMPLES: usize = 10;

#[derive(Debug, Clone, Copy)]
struct PricePoint {
    price: Price,
    timestamp: DateTime<Utc>,
}

/// One observed trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeRecord {
    pub price: Price,
    pub size: Volume,
    pub side: Side,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    books: HashMap<TokenId, OrderBook>,
    prices: HashMap<TokenId, History<PricePoint>>,
    trades: HashMap<TokenId, History<TradeRecord>>,
    last_update: HashMap<TokenId, DateTime<Utc>>,
}

/// Thread-safe aggregator over everything the streams deliver.
#[derive(Default)]
pub struct MarketData {
    inner: RwLock<Inner>,
}

impl MarketData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt a fresh book snapshot: store it, extend the mid-price
    /// history, and stamp the token's last update.
    pub fn update_book(&self, book: OrderBook) {
        let token = book.token_id().clone();
        let mid = book.mid();
        let now = Utc::now();

        let mut inner = self.inner.write();
        if let Some(mid) = mid {
            inner
                .prices
                .entry(token.clone())
                .or_insert_with(|| History::new(PRICE_HISTORY_CAP))
                .push(PricePoint {
                    price: mid,
                    timestamp: now,
                });
        }
        inner.last_update.insert(token.clone(), now);
        inner.books.insert(token, book);
    }

    /// Record a trade print.
    pub fn record_trade(&self, token: &TokenId, price: Price, size: Volume, side: Side) {
        self.inner
            .write()
            .trades
            .entry(token.clone())
            .or_insert_with(|| History::new(TRADE_HISTORY_CAP))
            .push(TradeRecord {
                price,
                size,
                side,
                timestamp: Utc::now(),
            });
    }

    /// Snapshot of a token's book.
    #[must_use]
    pub fn book(&self, token: &TokenId) -> Option<OrderBook> {
        self.inner.read().books.get(token).cloned()
    }

    /// Best bid and ask prices, `(None, None)` when the book is missing.
    #[must_use]
    pub fn best_bid_ask(&self, token: &TokenId) -> (Option<Price>, Option<Price>) {
        let inner = self.inner.read();
        let Some(book) = inner.books.get(token) else {
            return (None, None);
        };
        (
            book.best_bid().map(|l| l.price()),
            book.best_ask().map(|l| l.price()),
        )
    }

    /// Depth analysis of a token's book. See [`OrderBook::depth`].
    #[must_use]
    pub fn depth(
        &self,
        token: &TokenId,
        min_size: Volume,
        pct_range: Decimal,
    ) -> Option<DepthSummary> {
        self.inner.read().books.get(token)?.depth(min_size, pct_range)
    }

    /// Standard deviation of simple returns over the window, in percent.
    /// Undefined below [`MIN_VOLATILITY_SAMPLES`] samples.
    #[must_use]
    pub fn volatility(&self, token: &TokenId, window_hours: i64) -> Option<Decimal> {
        let cutoff = Utc::now() - Duration::hours(window_hours);
        let inner = self.inner.read();
        let prices: Vec<f64> = inner
            .prices
            .get(token)?
            .iter()
            .filter(|p| p.timestamp > cutoff)
            .filter_map(|p| p.price.to_f64())
            .collect();

        if prices.len() < MIN_VOLATILITY_SAMPLES {
            return None;
        }

        let returns: Vec<f64> = prices
            .windows(2)
            .filter(|w| w[0] != 0.0)
            .map(|w| (w[1] - w[0]) / w[0])
            .collect();
        if returns.is_empty() {
            return None;
        }

        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance =
            returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
        Decimal::from_f64_retain(variance.sqrt() * 100.0)
    }

    /// Percent change between the first and last mid inside the window.
    /// Undefined with fewer than two samples.
    #[must_use]
    pub fn price_change(&self, token: &TokenId, window_minutes: i64) -> Option<Decimal> {
        let cutoff = Utc::now() - Duration::minutes(window_minutes);
        let inner = self.inner.read();
        let mut recent = inner
            .prices
            .get(token)?
            .iter()
            .filter(|p| p.timestamp > cutoff);

        let first = recent.next()?.price;
        let last = recent.last()?.price;
        if first.is_zero() {
            return None;
        }
        Some((last - first) / first * Decimal::ONE_HUNDRED)
    }

    /// Trades inside the window, oldest first.
    #[must_use]
    pub fn recent_trades(&self, token: &TokenId, window_minutes: i64) -> Vec<TradeRecord> {
        let cutoff = Utc::now() - Duration::minutes(window_minutes);
        self.inner
            .read()
            .trades
            .get(token)
            .map(|history| {
                history
                    .iter()
                    .filter(|t| t.timestamp > cutoff)
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Volume-weighted average trade price over the window. Undefined
    /// when no volume traded.
    #[must_use]
    pub fn vwap(&self, token: &TokenId, window_minutes: i64) -> Option<Decimal> {
        let trades = self.recent_trades(token, window_minutes);
        let total_volume: Volume = trades.iter().map(|t| t.size).sum();
        if total_volume.is_zero() {
            return None;
        }
        let notional: Decimal = trades.iter().map(|t| t.price * t.size).sum();
        Some(notional / total_volume)
    }

    /// True when the token's book was updated within `max_age_secs`.
    #[must_use]
    pub fn is_fresh(&self, token: &TokenId, max_age_secs: i64) -> bool {
        self.inner
            .read()
            .last_update
            .get(token)
            .map(|ts| Utc::now() - *ts <= Duration::seconds(max_age_secs))
            .unwrap_or(false)
    }

    /// Drop books and update stamps older than `max_age_minutes`.
    pub fn clear_stale(&self, max_age_minutes: i64) {
        let cutoff = Utc::now() - Duration::minutes(max_age_minutes);
        let mut inner = self.inner.write();
        let stale: Vec<TokenId> = inner
            .last_update
            .iter()
            .filter(|(_, ts)| **ts < cutoff)
            .map(|(token, _)| token.clone())
            .collect();

        for token in &stale {
            inner.books.remove(token);
            inner.last_update.remove(token);
        }
        if !stale.is_empty() {
            debug!(count = stale.len(), "Cleared stale order books");
        }
    }

    #[cfg(test)]
    fn push_mid_at(&self, token: &TokenId, price: Price, timestamp: DateTime<Utc>) {
        self.inner
            .write()
            .prices
            .entry(token.clone())
            .or_insert_with(|| History::new(PRICE_HISTORY_CAP))
            .push(PricePoint { price, timestamp });
    }

    #[cfg(test)]
    fn stamp_update_at(&self, token: &TokenId, timestamp: DateTime<Utc>) {
        self.inner
            .write()
            .last_update
            .insert(token.clone(), timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::PriceLevel;
    use rust_decimal_macros::dec;

    fn book(token: &str, bid: Decimal, ask: Decimal) -> OrderBook {
        OrderBook::from_unsorted(
            TokenId::new(token),
            vec![PriceLevel::new(bid, dec!(100))],
            vec![PriceLevel::new(ask, dec!(100))],
        )
    }

    #[test]
    fn update_book_tracks_best_and_mid_history() {
        let data = MarketData::new();
        let token = TokenId::new("tok");
        data.update_book(book("tok", dec!(0.48), dec!(0.49)));

        assert_eq!(
            data.best_bid_ask(&token),
            (Some(dec!(0.48)), Some(dec!(0.49)))
        );
        assert!(data.is_fresh(&token, 60));

        // A 60-minute window sees the single mid just pushed.
        assert!(data.price_change(&token, 60).is_none()); // one sample only
        data.update_book(book("tok", dec!(0.50), dec!(0.51)));
        let change = data.price_change(&token, 60).unwrap();
        // (0.505 - 0.485) / 0.485 * 100
        assert!(change > dec!(4.1) && change < dec!(4.2));
    }

    #[test]
    fn missing_token_reads_as_absent() {
        let data = MarketData::new();
        let token = TokenId::new("ghost");
        assert_eq!(data.best_bid_ask(&token), (None, None));
        assert!(data.book(&token).is_none());
        assert!(!data.is_fresh(&token, 60));
        assert!(data.volatility(&token, 3).is_none());
        assert!(data.vwap(&token, 60).is_none());
    }

    #[test]
    fn volatility_requires_minimum_samples() {
        let data = MarketData::new();
        let token = TokenId::new("tok");
        let now = Utc::now();

        for i in 0..9i64 {
            data.push_mid_at(&token, dec!(0.50) + Decimal::new(i, 3), now);
        }
        assert!(data.volatility(&token, 3).is_none());

        data.push_mid_at(&token, dec!(0.52), now);
        assert!(data.volatility(&token, 3).is_some());
    }

    #[test]
    fn volatility_zero_for_constant_prices() {
        let data = MarketData::new();
        let token = TokenId::new("tok");
        let now = Utc::now();
        for _ in 0..20 {
            data.push_mid_at(&token, dec!(0.50), now);
        }
        assert_eq!(data.volatility(&token, 3).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn volatility_ignores_samples_outside_window() {
        let data = MarketData::new();
        let token = TokenId::new("tok");
        let now = Utc::now();

        // Plenty of old samples, too few recent ones.
        for _ in 0..20 {
            data.push_mid_at(&token, dec!(0.50), now - Duration::hours(5));
        }
        for _ in 0..5 {
            data.push_mid_at(&token, dec!(0.51), now);
        }
        assert!(data.volatility(&token, 3).is_none());
    }

    #[test]
    fn vwap_weights_by_size() {
        let data = MarketData::new();
        let token = TokenId::new("tok");
        data.record_trade(&token, dec!(0.40), dec!(10), Side::Buy);
        data.record_trade(&token, dec!(0.50), dec!(30), Side::Sell);

        // (0.4*10 + 0.5*30) / 40 = 0.475
        assert_eq!(data.vwap(&token, 60).unwrap(), dec!(0.475));
        assert_eq!(data.recent_trades(&token, 60).len(), 2);
    }

    #[test]
    fn clear_stale_drops_old_books() {
        let data = MarketData::new();
        let stale = TokenId::new("stale");
        let fresh = TokenId::new("fresh");

        data.update_book(book("stale", dec!(0.4), dec!(0.5)));
        data.update_book(book("fresh", dec!(0.4), dec!(0.5)));
        data.stamp_update_at(&stale, Utc::now() - Duration::minutes(120));

        data.clear_stale(60);
        assert!(data.book(&stale).is_none());
        assert!(data.book(&fresh).is_some());
    }
}
