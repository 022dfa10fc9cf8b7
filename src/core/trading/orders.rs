//! Order management with a significance filter to avoid churn.
//!
//! Every placement first passes the significance filter (skip updates
//! that barely move price or size), then cancels the token's resting
//! orders, then places. The tracked record mirrors the last successful
//! placement; the periodic reconcile replaces the whole map from the
//! exchange's view.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, error, info};

use crate::app::state::BotState;
use crate::core::domain::{MarketId, Price, RestingOrder, Side, TokenId, TokenOrders, Volume};
use crate::core::exchange::ExchangeClient;

/// Price moves of at most half a cent are not worth re-quoting.
const PRICE_UPDATE_THRESHOLD: Decimal = dec!(0.005);
/// Size moves of at most 10% of the new size are not worth re-quoting.
const SIZE_UPDATE_THRESHOLD_PCT: Decimal = dec!(0.10);

/// Places, updates, and cancels resting orders.
pub struct OrderManager {
    state: Arc<BotState>,
    client: Arc<ExchangeClient>,
}

impl OrderManager {
    #[must_use]
    pub fn new(state: Arc<BotState>, client: Arc<ExchangeClient>) -> Self {
        Self { state, client }
    }

    /// Tracked resting orders for a token.
    #[must_use]
    pub fn orders(&self, token: &TokenId) -> TokenOrders {
        self.state.orders(token)
    }

    /// Significance filter: re-quote only when there is no resting order,
    /// the price moved more than half a cent, or the size moved more
    /// than 10% of the new size.
    #[must_use]
    pub fn should_update(
        &self,
        token: &TokenId,
        side: Side,
        new_price: Price,
        new_size: Volume,
    ) -> bool {
        let current = self.state.orders(token).side(side);
        if current.is_empty() {
            return true;
        }

        let price_diff = (current.price - new_price).abs();
        if price_diff > PRICE_UPDATE_THRESHOLD {
            debug!(
                token = %token,
                side = %side,
                price_diff = %price_diff,
                "Significant price move"
            );
            return true;
        }

        let size_diff = (current.size - new_size).abs();
        if size_diff > new_size * SIZE_UPDATE_THRESHOLD_PCT {
            debug!(
                token = %token,
                side = %side,
                size_diff = %size_diff,
                "Significant size move"
            );
            return true;
        }

        false
    }

    /// Place a buy, replacing the token's resting orders when the change
    /// is significant. Returns true only when a new order rests.
    pub async fn place_buy(
        &self,
        token: &TokenId,
        price: Price,
        size: Volume,
        neg_risk: bool,
    ) -> bool {
        self.place(token, Side::Buy, price, size, neg_risk).await
    }

    /// Place a sell, replacing the token's resting orders when the change
    /// is significant. Returns true only when a new order rests.
    pub async fn place_sell(
        &self,
        token: &TokenId,
        price: Price,
        size: Volume,
        neg_risk: bool,
    ) -> bool {
        self.place(token, Side::Sell, price, size, neg_risk).await
    }

    async fn place(
        &self,
        token: &TokenId,
        side: Side,
        price: Price,
        size: Volume,
        neg_risk: bool,
    ) -> bool {
        if !self.should_update(token, side, price, size) {
            debug!(token = %token, side = %side, "Skipping order update, change below thresholds");
            return false;
        }

        if self.state.orders(token).has_any() {
            info!(token = %token, "Cancelling existing orders before re-quote");
            self.client.cancel_by_asset(token).await;
        }

        match self.client.create_order(token, side, price, size, neg_risk).await {
            Some(_) => {
                self.state
                    .set_order(token, side, RestingOrder::new(price, size));
                true
            }
            None => {
                error!(token = %token, side = %side, "Failed to place order");
                false
            }
        }
    }

    /// Rebuild the resting-order map from the exchange's open orders.
    pub async fn reconcile(&self) {
        let open = self.client.open_orders(None).await;
        let mut orders: HashMap<TokenId, TokenOrders> = HashMap::new();
        for order in open {
            orders
                .entry(order.token_id.clone())
                .or_default()
                .absorb(order.side, order.price, order.size);
        }
        debug!(tokens = orders.len(), "Reconciled resting orders");
        self.state.replace_orders(orders);
    }

    /// Cancel everything resting on both of a market's tokens.
    pub async fn cancel_market(&self, market_id: &MarketId) -> bool {
        let Some(market) = self.state.market(market_id) else {
            return false;
        };

        info!(market = %market_id, "Cancelling all orders for market");
        let mut all = true;
        for token in market.tokens() {
            all &= self.cancel_token(token).await;
        }
        all
    }

    /// Cancel everything resting on one token and zero its record.
    pub async fn cancel_token(&self, token: &TokenId) -> bool {
        info!(token = %token, "Cancelling all orders for token");
        let cancelled = self.client.cancel_by_asset(token).await;
        if cancelled {
            self.state.clear_orders(token);
        }
        cancelled
    }
}
