//! Shared bot state.
//!
//! A single mutex guards every shared field. Accessors hold the lock only
//! for map/set manipulation and copy values out; no I/O and no caller
//! code runs under the lock.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::domain::{
    Market, MarketId, ParameterProfile, Position, Price, RestingOrder, Side, TokenId, TokenOrders,
    Volume,
};

/// Kind of mutating exchange operation tracked in the in-flight set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Buy,
    Sell,
    Cancel,
}

impl OpKind {
    /// Lowercase label for logging.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            OpKind::Buy => "buy",
            OpKind::Sell => "sell",
            OpKind::Cancel => "cancel",
        }
    }
}

impl From<Side> for OpKind {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => OpKind::Buy,
            Side::Sell => OpKind::Sell,
        }
    }
}

/// Operation id for the in-flight set: one slot per token and kind.
#[must_use]
pub fn op_id(token: &TokenId, kind: OpKind) -> String {
    format!("{token}:{}", kind.as_str())
}

#[derive(Default)]
struct StateInner {
    markets: Vec<Market>,
    profiles: HashMap<String, ParameterProfile>,
    positions: HashMap<TokenId, Position>,
    orders: HashMap<TokenId, TokenOrders>,
    in_flight: HashMap<OpKind, HashMap<String, Instant>>,
    market_stream_up: bool,
    user_stream_up: bool,
}

/// Thread-safe container for everything the trading tasks share.
#[derive(Default)]
pub struct BotState {
    inner: Mutex<StateInner>,
}

impl BotState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- positions ---

    /// Position for a token, flat if untracked.
    #[must_use]
    pub fn position(&self, token: &TokenId) -> Position {
        self.inner
            .lock()
            .positions
            .get(token)
            .copied()
            .unwrap_or_default()
    }

    /// Apply a fill to a token's position and return the new record.
    pub fn apply_fill(&self, token: &TokenId, side: Side, size: Volume, price: Price) -> Position {
        let mut inner = self.inner.lock();
        let position = inner.positions.entry(token.clone()).or_default();
        match side {
            Side::Buy => position.apply_buy(size, price),
            Side::Sell => position.apply_sell(size),
        }
        *position
    }

    /// Replace one token's position wholesale (snapshot reconcile).
    pub fn set_position(&self, token: &TokenId, position: Position) {
        self.inner.lock().positions.insert(token.clone(), position);
    }

    /// Update only the average entry of an already-tracked token.
    pub fn set_avg_price(&self, token: &TokenId, avg_price: Price) {
        if let Some(position) = self.inner.lock().positions.get_mut(token) {
            position.set_avg_price(avg_price);
        }
    }

    /// Number of tracked positions.
    #[must_use]
    pub fn position_count(&self) -> usize {
        self.inner.lock().positions.len()
    }

    /// Sum of cost bases across all tracked positions.
    #[must_use]
    pub fn total_exposure(&self) -> Price {
        self.inner
            .lock()
            .positions
            .values()
            .map(Position::notional)
            .sum()
    }

    // --- resting orders ---

    /// Tracked resting orders for a token, empty if untracked.
    #[must_use]
    pub fn orders(&self, token: &TokenId) -> TokenOrders {
        self.inner
            .lock()
            .orders
            .get(token)
            .copied()
            .unwrap_or_default()
    }

    /// Overwrite one side's tracked resting order.
    pub fn set_order(&self, token: &TokenId, side: Side, order: RestingOrder) {
        self.inner
            .lock()
            .orders
            .entry(token.clone())
            .or_default()
            .set_side(side, order);
    }

    /// Drop one side's tracked resting order.
    pub fn clear_order_side(&self, token: &TokenId, side: Side) {
        if let Some(orders) = self.inner.lock().orders.get_mut(token) {
            orders.set_side(side, RestingOrder::default());
        }
    }

    /// Drop both sides for a token.
    pub fn clear_orders(&self, token: &TokenId) {
        if let Some(orders) = self.inner.lock().orders.get_mut(token) {
            orders.clear();
        }
    }

    /// Replace the whole resting-order map (order reconcile).
    pub fn replace_orders(&self, orders: HashMap<TokenId, TokenOrders>) {
        self.inner.lock().orders = orders;
    }

    /// Number of tokens with tracked orders.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.inner.lock().orders.len()
    }

    // --- catalog & profiles ---

    /// Replace the selected-markets catalog.
    pub fn set_markets(&self, markets: Vec<Market>) {
        self.inner.lock().markets = markets;
    }

    /// Look up a market by condition id.
    #[must_use]
    pub fn market(&self, market_id: &MarketId) -> Option<Market> {
        self.inner
            .lock()
            .markets
            .iter()
            .find(|m| m.condition_id == *market_id)
            .cloned()
    }

    /// The market a token belongs to.
    #[must_use]
    pub fn market_for_token(&self, token: &TokenId) -> Option<Market> {
        self.inner
            .lock()
            .markets
            .iter()
            .find(|m| m.token1 == *token || m.token2 == *token)
            .cloned()
    }

    /// Snapshot of the catalog.
    #[must_use]
    pub fn markets(&self) -> Vec<Market> {
        self.inner.lock().markets.clone()
    }

    /// Every token across enabled markets, token1 before token2.
    #[must_use]
    pub fn watched_tokens(&self) -> Vec<TokenId> {
        self.inner
            .lock()
            .markets
            .iter()
            .filter(|m| m.enabled)
            .flat_map(|m| [m.token1.clone(), m.token2.clone()])
            .collect()
    }

    /// Replace the parameter-profile table.
    pub fn set_profiles(&self, profiles: HashMap<String, ParameterProfile>) {
        self.inner.lock().profiles = profiles;
    }

    /// Look up a parameter profile by name.
    #[must_use]
    pub fn profile(&self, name: &str) -> Option<ParameterProfile> {
        self.inner.lock().profiles.get(name).cloned()
    }

    // --- in-flight operations ---

    /// Mark an operation as in flight.
    pub fn begin_op(&self, kind: OpKind, id: String) {
        self.inner
            .lock()
            .in_flight
            .entry(kind)
            .or_default()
            .insert(id, Instant::now());
    }

    /// Clear an in-flight marker.
    pub fn end_op(&self, kind: OpKind, id: &str) {
        if let Some(ops) = self.inner.lock().in_flight.get_mut(&kind) {
            ops.remove(id);
        }
    }

    /// True while the marker is held.
    #[must_use]
    pub fn is_op_in_flight(&self, kind: OpKind, id: &str) -> bool {
        self.inner
            .lock()
            .in_flight
            .get(&kind)
            .is_some_and(|ops| ops.contains_key(id))
    }

    /// Drop markers older than `max_age`, returning what was swept so the
    /// caller can log it.
    pub fn sweep_stale_ops(&self, max_age: Duration) -> Vec<(OpKind, String, Duration)> {
        let mut swept = Vec::new();
        let now = Instant::now();
        let mut inner = self.inner.lock();
        for (kind, ops) in &mut inner.in_flight {
            ops.retain(|id, started| {
                let age = now.duration_since(*started);
                if age > max_age {
                    swept.push((*kind, id.clone(), age));
                    false
                } else {
                    true
                }
            });
        }
        swept
    }

    // --- stream health ---

    pub fn set_market_stream_up(&self, up: bool) {
        self.inner.lock().market_stream_up = up;
    }

    pub fn set_user_stream_up(&self, up: bool) {
        self.inner.lock().user_stream_up = up;
    }

    /// `(market_stream_up, user_stream_up)`.
    #[must_use]
    pub fn stream_health(&self) -> (bool, bool) {
        let inner = self.inner.lock();
        (inner.market_stream_up, inner.user_stream_up)
    }
}
