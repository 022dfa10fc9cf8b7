//! Per-market trading passes.
//!
//! A pass runs under the market's advisory lock so the cancel/place
//! sequence on a token is never interleaved with another pass on the
//! same market: merge check first, then for each token the exit (sell)
//! path followed by the entry (buy) path.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, error, info, warn};

use super::orders::OrderManager;
use super::positions::PositionManager;
use super::risk::{self, RiskManager};
use crate::app::state::BotState;
use crate::core::data::MarketData;
use crate::core::domain::{
    Market, MarketId, ParameterProfile, Position, Price, RiskEvent, TokenId, Volume,
};
use crate::core::num::{mid_price, pnl_pct, spread_pct};

/// Window for the VWAP reference used by the entry-price deviation guard.
const VWAP_WINDOW_MINUTES: i64 = 60;
/// Maximum tolerated deviation of an entry quote from the VWAP reference.
const MAX_PRICE_DEVIATION: Price = dec!(0.05);

/// The per-market decision loop.
pub struct Strategy {
    state: Arc<BotState>,
    data: Arc<MarketData>,
    positions: Arc<PositionManager>,
    orders: Arc<OrderManager>,
    risk: Arc<RiskManager>,
    locks: Mutex<HashMap<MarketId, Arc<tokio::sync::Mutex<()>>>>,
}

impl Strategy {
    #[must_use]
    pub fn new(
        state: Arc<BotState>,
        data: Arc<MarketData>,
        positions: Arc<PositionManager>,
        orders: Arc<OrderManager>,
        risk: Arc<RiskManager>,
    ) -> Self {
        Self {
            state,
            data,
            positions,
            orders,
            risk,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The market's advisory lock, created lazily and kept for the
    /// process lifetime.
    fn lock_for(&self, market_id: &MarketId) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(market_id.clone())
            .or_default()
            .clone()
    }

    /// Fire a pass for a market as a background task.
    pub fn spawn_pass(self: &Arc<Self>, market_id: MarketId) {
        let strategy = Arc::clone(self);
        tokio::spawn(async move {
            strategy.run_pass(&market_id).await;
        });
    }

    /// Run one pass, skipping when the market's previous pass is still
    /// outstanding.
    pub async fn run_pass(&self, market_id: &MarketId) {
        let lock = self.lock_for(market_id);
        let Ok(_guard) = lock.try_lock() else {
            debug!(market = %market_id, "Pass already in progress, skipping");
            return;
        };
        self.pass(market_id).await;
    }

    async fn pass(&self, market_id: &MarketId) {
        let Some(market) = self.state.market(market_id) else {
            warn!(market = %market_id, "Market not in catalog, skipping pass");
            return;
        };
        let Some(profile) = self.state.profile(&market.param_type) else {
            warn!(
                market = %market_id,
                param_type = %market.param_type,
                "No parameter profile, skipping pass"
            );
            return;
        };

        info!(market = %market_id, question = %market.question, "Trading pass");

        self.check_merge(&market).await;

        for token in [market.token1.clone(), market.token2.clone()] {
            self.trade_token(&token, &market, &profile).await;
        }
    }

    async fn check_merge(&self, market: &Market) {
        if let Some(candidate) = self.positions.check_merge_opportunity(&market.condition_id) {
            info!(
                market = %market.condition_id,
                amount = %candidate.amount,
                "Merge opportunity detected"
            );
            if !self
                .positions
                .merge_positions(&market.condition_id, market.neg_risk)
                .await
            {
                warn!(market = %market.condition_id, "Position merge failed");
            }
        }
    }

    async fn trade_token(&self, token: &TokenId, market: &Market, profile: &ParameterProfile) {
        let position = self.positions.position(token);
        let orders = self.orders.orders(token);

        let Some(book) = self.data.book(token) else {
            debug!(token = %token, "No order book yet, skipping token");
            return;
        };
        let Some((best_bid, best_ask)) = book.top() else {
            debug!(token = %token, "One-sided book, skipping token");
            return;
        };

        info!(
            token = %token,
            outcome = market.outcome(token),
            position = %position.size(),
            avg = %position.avg_price(),
            resting_buy = %orders.buy.size,
            resting_sell = %orders.sell.size,
            best_bid = %best_bid,
            best_ask = %best_ask,
            "Token snapshot"
        );

        let other_position = market
            .opposite_token(token)
            .map(|other| self.positions.position(other))
            .unwrap_or_default();

        let knobs = market.knobs(profile);
        let (buy_amount, sell_amount) =
            risk::order_sizes(position.size(), other_position.size(), &knobs);
        debug!(buy = %buy_amount, sell = %sell_amount, "Calculated order sizes");

        if sell_amount > Decimal::ZERO
            && !position.is_flat()
            && position.avg_price() > Decimal::ZERO
        {
            let stopped = self
                .handle_sell(token, market, profile, &position, sell_amount, best_bid, best_ask)
                .await;
            if stopped {
                return;
            }
        }

        if buy_amount > Decimal::ZERO {
            self.handle_buy(token, market, profile, &position, buy_amount, best_bid, best_ask)
                .await;
        }
    }

    /// Exit path. Returns true when a stop-loss fired and the token is
    /// done for this pass.
    #[allow(clippy::too_many_arguments)]
    async fn handle_sell(
        &self,
        token: &TokenId,
        market: &Market,
        profile: &ParameterProfile,
        position: &Position,
        sell_amount: Volume,
        best_bid: Price,
        best_ask: Price,
    ) -> bool {
        let mid = mid_price(best_bid, best_ask);
        let spread = spread_pct(best_bid, best_ask);

        if risk::should_stop_loss(position, mid, spread, profile) {
            warn!(token = %token, outcome = market.outcome(token), "Emergency exit at best bid");

            let placed = self
                .orders
                .place_sell(token, best_bid, sell_amount, market.neg_risk)
                .await;
            if placed {
                let sleep_secs = (profile.sleep_period_hours * dec!(3600))
                    .to_i64()
                    .unwrap_or(3600);
                self.positions.save_risk_event(
                    &market.condition_id,
                    &RiskEvent::StopLoss {
                        time: Utc::now(),
                        question: market.question.clone(),
                        token_id: token.clone(),
                        outcome: market.outcome(token).to_string(),
                        exit_price: best_bid,
                        pnl_pct: pnl_pct(position.avg_price(), mid),
                        sleep_till: Utc::now() + chrono::Duration::seconds(sleep_secs),
                    },
                );
                self.orders.cancel_market(&market.condition_id).await;
            } else {
                error!(token = %token, "Failed to place emergency sell");
            }
            return true;
        }

        let price = risk::sell_price(position.avg_price(), profile, market.tick_size, best_ask);
        debug!(token = %token, price = %price, "Placing take-profit sell");
        self.orders
            .place_sell(token, price, sell_amount, market.neg_risk)
            .await;
        false
    }

    /// Entry path: composite risk gate, position limits, then a bid one
    /// tick over the best bid.
    #[allow(clippy::too_many_arguments)]
    async fn handle_buy(
        &self,
        token: &TokenId,
        market: &Market,
        profile: &ParameterProfile,
        position: &Position,
        buy_amount: Volume,
        best_bid: Price,
        best_ask: Price,
    ) {
        if !self.risk.should_enter(market, profile, token) {
            info!(token = %token, "Entry checks failed, pulling quotes");
            self.orders.cancel_token(token).await;
            return;
        }

        let knobs = market.knobs(profile);
        if !self
            .risk
            .position_within_limits(position.size(), buy_amount, knobs.max_size)
        {
            info!(token = %token, "Position limits reached");
            return;
        }

        let Some(price) = risk::entry_price(best_bid, best_ask, market.tick_size) else {
            return;
        };

        if let Some(reference) = self.data.vwap(token, VWAP_WINDOW_MINUTES) {
            if !risk::price_deviation_ok(price, reference, MAX_PRICE_DEVIATION) {
                info!(token = %token, "Entry price too far from recent trading");
                return;
            }
        }

        debug!(token = %token, price = %price, size = %buy_amount, "Placing entry buy");
        self.orders
            .place_buy(token, price, buy_amount, market.neg_risk)
            .await;
    }
}
