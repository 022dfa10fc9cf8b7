//! Risk controls: sizing, stop-loss, take-profit and entry pricing,
//! liquidity and position-limit checks, and the cool-down gate.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info, warn};

use super::positions::PositionManager;
use crate::core::data::MarketData;
use crate::core::domain::{
    DepthSummary, Market, MarketKnobs, ParameterProfile, Position, Price, TokenId, Volume,
};
use crate::core::num::{pnl_pct, round_up, tick_decimals};

/// Minimum size at the top of book on each side to quote into.
pub const MIN_LIQUIDITY: Volume = dec!(100);
/// Hard cap on any single-token position, independent of configuration.
pub const ABSOLUTE_POSITION_CAP: Volume = dec!(250);
/// Minimum bid/ask depth ratio; zero disables the check unless configured.
const MIN_BOOK_RATIO: Decimal = Decimal::ZERO;
/// Entry prices live in this band; outside it the edge is not worth quoting.
const ENTRY_PRICE_FLOOR: Price = dec!(0.1);
const ENTRY_PRICE_CEILING: Price = dec!(0.9);
/// Depth-query knobs: count levels of at least this size...
const DEPTH_MIN_SIZE: Volume = dec!(10);
/// ...within this fraction of the top of book.
const DEPTH_PRICE_RANGE: Decimal = dec!(0.1);
/// Window for the rolling volatility estimate, matching the `3_hour`
/// stat column.
const VOLATILITY_WINDOW_HOURS: i64 = 3;

/// Buy/sell sizing for one token.
///
/// Buys top the position up to `max_size`, but only when the opposing
/// token's position is below `min_size` (otherwise a merge is the better
/// trade); top-ups smaller than `min_size` are dropped. Sells always
/// offer the full position as one exit order.
#[must_use]
pub fn order_sizes(position: Volume, other_position: Volume, knobs: &MarketKnobs) -> (Volume, Volume) {
    let mut buy = Decimal::ZERO;
    if position < knobs.max_size && other_position < knobs.min_size {
        buy = (knobs.max_size - position).max(Decimal::ZERO);
        if buy < knobs.min_size {
            buy = Decimal::ZERO;
        }
    }

    let sell = position.max(Decimal::ZERO);
    (buy, sell)
}

/// Stop-loss trigger: held position under water past the threshold, and
/// a spread tight enough to exit into.
#[must_use]
pub fn should_stop_loss(
    position: &Position,
    mid: Price,
    spread_pct: Decimal,
    profile: &ParameterProfile,
) -> bool {
    if position.is_flat() || position.avg_price() <= Decimal::ZERO {
        return false;
    }

    let pnl = pnl_pct(position.avg_price(), mid);
    if pnl < profile.stop_loss_threshold && spread_pct <= profile.spread_threshold {
        warn!(
            pnl_pct = %pnl,
            threshold = %profile.stop_loss_threshold,
            spread_pct = %spread_pct,
            "Stop-loss triggered"
        );
        return true;
    }
    false
}

/// Take-profit price: average entry marked up by the threshold, rounded
/// up to the tick.
#[must_use]
pub fn take_profit_price(avg_price: Price, profile: &ParameterProfile, tick_size: Decimal) -> Price {
    let tp = avg_price * (Decimal::ONE + profile.take_profit_threshold / Decimal::ONE_HUNDRED);
    round_up(tp, tick_decimals(tick_size))
}

/// Exit quote: the better of take-profit and the current best ask,
/// rounded up to the tick.
#[must_use]
pub fn sell_price(
    avg_price: Price,
    profile: &ParameterProfile,
    tick_size: Decimal,
    best_ask: Price,
) -> Price {
    let tp = take_profit_price(avg_price, profile, tick_size);
    round_up(tp.max(best_ask), tick_decimals(tick_size))
}

/// Entry quote: one tick above the best bid, capped at mid, rounded to
/// the tick. `None` when the result leaves the tradeable band.
#[must_use]
pub fn entry_price(best_bid: Price, best_ask: Price, tick_size: Decimal) -> Option<Price> {
    let mid = (best_bid + best_ask) / Decimal::TWO;
    let bid = (best_bid + tick_size).min(mid).round_dp(tick_decimals(tick_size));

    if bid < ENTRY_PRICE_FLOOR || bid >= ENTRY_PRICE_CEILING {
        warn!(price = %bid, "Entry price outside tradeable band");
        return None;
    }
    Some(bid)
}

/// Liquidity gate: spread within the market's tolerance and real size on
/// both sides of the top of book. `max_spread_pct` is in percent.
#[must_use]
pub fn check_liquidity(depth: &DepthSummary, max_spread_pct: Decimal, min_liquidity: Volume) -> bool {
    let max_spread = max_spread_pct / Decimal::ONE_HUNDRED;
    if depth.spread > max_spread {
        warn!(spread = %depth.spread, max = %max_spread, "Spread too wide");
        return false;
    }
    if depth.best_bid_size < min_liquidity || depth.best_ask_size < min_liquidity {
        warn!(
            bid_size = %depth.best_bid_size,
            ask_size = %depth.best_ask_size,
            "Insufficient top-of-book liquidity"
        );
        return false;
    }
    true
}

/// Book-ratio gate: bid depth over ask depth must reach `min_ratio`.
/// An empty ask side passes (nothing to be run over by).
#[must_use]
pub fn check_book_ratio(depth: &DepthSummary, min_ratio: Decimal) -> bool {
    if depth.ask_depth.is_zero() {
        return true;
    }
    if depth.liquidity_ratio < min_ratio {
        warn!(ratio = %depth.liquidity_ratio, min = %min_ratio, "Order book ratio too low");
        return false;
    }
    true
}

/// Position-limit gate: the filled order must not push the position past
/// the market's cap, the configured per-position cap, nor the absolute
/// cap.
#[must_use]
pub fn within_position_limits(
    current: Volume,
    order_size: Volume,
    max_size: Volume,
    position_cap: Volume,
) -> bool {
    let resulting = current + order_size;
    if resulting > max_size {
        warn!(resulting = %resulting, max = %max_size, "Position limit exceeded");
        return false;
    }
    if resulting > position_cap {
        warn!(resulting = %resulting, cap = %position_cap, "Configured position cap exceeded");
        return false;
    }
    if resulting > ABSOLUTE_POSITION_CAP {
        warn!(resulting = %resulting, cap = %ABSOLUTE_POSITION_CAP, "Absolute position cap exceeded");
        return false;
    }
    true
}

/// Reference-price guard: a proposed quote must stay near the reference
/// when one is known. A non-positive reference disables the check.
#[must_use]
pub fn price_deviation_ok(proposed: Price, reference: Price, max_deviation: Price) -> bool {
    if reference <= Decimal::ZERO {
        return true;
    }
    let deviation = (proposed - reference).abs();
    if deviation > max_deviation {
        warn!(deviation = %deviation, max = %max_deviation, "Price deviates too far from reference");
        return false;
    }
    true
}

/// Stateful risk gates: cool-down files, rolling volatility, position
/// and exposure caps.
pub struct RiskManager {
    positions: Arc<PositionManager>,
    data: Arc<MarketData>,
    max_position_size: Volume,
    max_total_exposure: Price,
}

impl RiskManager {
    #[must_use]
    pub fn new(
        positions: Arc<PositionManager>,
        data: Arc<MarketData>,
        max_position_size: Volume,
        max_total_exposure: Price,
    ) -> Self {
        Self {
            positions,
            data,
            max_position_size,
            max_total_exposure,
        }
    }

    /// Position-limit gate against the market's cap and the configured
    /// per-position cap. See [`within_position_limits`].
    #[must_use]
    pub fn position_within_limits(
        &self,
        current: Volume,
        order_size: Volume,
        max_size: Volume,
    ) -> bool {
        within_position_limits(current, order_size, max_size, self.max_position_size)
    }

    /// True while the market's persisted risk event is active. Expired
    /// events are cleared on the way through.
    #[must_use]
    pub fn in_cooldown(&self, market: &Market) -> bool {
        let Some(event) = self.positions.risk_event(&market.condition_id) else {
            return false;
        };

        let now = chrono::Utc::now();
        if event.is_active(now) {
            let remaining = event.sleep_till() - now;
            info!(
                market = %market.condition_id,
                hours_left = remaining.num_minutes() as f64 / 60.0,
                "Market in risk-off period"
            );
            true
        } else {
            self.positions.clear_risk_event(&market.condition_id);
            false
        }
    }

    /// True when the token's rolling volatility exceeds the profile's
    /// threshold. Unknown volatility (too few samples) passes.
    #[must_use]
    pub fn volatility_too_high(&self, token: &TokenId, profile: &ParameterProfile) -> bool {
        match self.data.volatility(token, VOLATILITY_WINDOW_HOURS) {
            Some(vol) if vol > profile.volatility_threshold => {
                warn!(
                    token = %token,
                    volatility = %vol,
                    threshold = %profile.volatility_threshold,
                    "High volatility, blocking entries"
                );
                true
            }
            _ => false,
        }
    }

    /// Composite entry gate: no cool-down, calm volatility, a liquid
    /// book with an acceptable bid/ask ratio, and total exposure under
    /// the cap.
    #[must_use]
    pub fn should_enter(
        &self,
        market: &Market,
        profile: &ParameterProfile,
        token: &TokenId,
    ) -> bool {
        if self.in_cooldown(market) {
            return false;
        }
        if self.volatility_too_high(token, profile) {
            return false;
        }

        let Some(depth) = self.data.depth(token, DEPTH_MIN_SIZE, DEPTH_PRICE_RANGE) else {
            debug!(token = %token, "No depth data, blocking entry");
            return false;
        };

        let knobs = market.knobs(profile);
        if !check_liquidity(&depth, knobs.max_spread, MIN_LIQUIDITY) {
            return false;
        }
        if !check_book_ratio(&depth, MIN_BOOK_RATIO) {
            return false;
        }

        let exposure = self.positions.total_exposure();
        if exposure >= self.max_total_exposure {
            warn!(
                exposure = %exposure,
                cap = %self.max_total_exposure,
                "Total exposure cap reached"
            );
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::state::BotState;
    use crate::core::domain::{MarketId, OrderBook, PriceLevel, RiskEvent};
    use crate::core::exchange::{
        ApiBook, ApiOrder, ApiPosition, ClobApi, ExchangeClient, OrderArgs, OrderDescriptor,
    };
    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    fn knobs() -> MarketKnobs {
        MarketKnobs {
            trade_size: dec!(100),
            max_size: dec!(100),
            min_size: dec!(10),
            max_spread: dec!(5),
        }
    }

    fn depth(bid: Decimal, ask: Decimal, bid_size: Decimal, ask_size: Decimal) -> DepthSummary {
        OrderBook::from_unsorted(
            TokenId::new("tok"),
            vec![PriceLevel::new(bid, bid_size)],
            vec![PriceLevel::new(ask, ask_size)],
        )
        .depth(dec!(10), dec!(0.1))
        .unwrap()
    }

    #[test]
    fn sizing_tops_up_to_max() {
        let (buy, sell) = order_sizes(dec!(30), dec!(0), &knobs());
        assert_eq!(buy, dec!(70));
        assert_eq!(sell, dec!(30));
    }

    #[test]
    fn sizing_skips_buy_when_opposing_position_held() {
        let (buy, sell) = order_sizes(dec!(30), dec!(50), &knobs());
        assert_eq!(buy, Decimal::ZERO);
        assert_eq!(sell, dec!(30));
    }

    #[test]
    fn sizing_drops_dust_top_ups() {
        // 100 - 95 = 5 < min_size 10.
        let (buy, _) = order_sizes(dec!(95), dec!(0), &knobs());
        assert_eq!(buy, Decimal::ZERO);
    }

    #[test]
    fn sizing_no_buy_at_max() {
        let (buy, sell) = order_sizes(dec!(100), dec!(0), &knobs());
        assert_eq!(buy, Decimal::ZERO);
        assert_eq!(sell, dec!(100));
    }

    #[test]
    fn stop_loss_fires_below_threshold_with_tight_spread() {
        let position = Position::new(dec!(100), dec!(0.50));
        let profile = ParameterProfile::default(); // stop at -2%, spread gate 3%

        // mid 0.485 -> -3% PnL, spread 2.06% of mid.
        assert!(should_stop_loss(
            &position,
            dec!(0.485),
            dec!(2.06),
            &profile
        ));
    }

    #[test]
    fn stop_loss_held_back_by_wide_spread() {
        let position = Position::new(dec!(100), dec!(0.50));
        let profile = ParameterProfile::default();
        assert!(!should_stop_loss(
            &position,
            dec!(0.485),
            dec!(4.5),
            &profile
        ));
    }

    #[test]
    fn stop_loss_ignores_flat_and_small_losses() {
        let profile = ParameterProfile::default();
        assert!(!should_stop_loss(
            &Position::flat(),
            dec!(0.40),
            dec!(1),
            &profile
        ));

        let position = Position::new(dec!(100), dec!(0.50));
        // -1% is above the -2% threshold.
        assert!(!should_stop_loss(&position, dec!(0.495), dec!(1), &profile));
    }

    #[test]
    fn take_profit_rounds_up_to_tick() {
        let profile = ParameterProfile::default(); // +1%
        // 0.50 * 1.01 = 0.505 -> up to 0.51 on a 0.01 tick.
        assert_eq!(take_profit_price(dec!(0.50), &profile, dec!(0.01)), dec!(0.51));
        // Finer tick keeps the exact value.
        assert_eq!(
            take_profit_price(dec!(0.50), &profile, dec!(0.001)),
            dec!(0.505)
        );
    }

    #[test]
    fn sell_price_takes_the_better_of_tp_and_ask() {
        let profile = ParameterProfile::default();
        // TP 0.51 beats ask 0.50.
        assert_eq!(
            sell_price(dec!(0.50), &profile, dec!(0.01), dec!(0.50)),
            dec!(0.51)
        );
        // Ask 0.60 beats TP 0.51.
        assert_eq!(
            sell_price(dec!(0.50), &profile, dec!(0.01), dec!(0.60)),
            dec!(0.60)
        );
    }

    #[test]
    fn entry_price_one_tick_over_bid_capped_at_mid() {
        // bid+tick = 0.45 < mid 0.47.
        assert_eq!(entry_price(dec!(0.44), dec!(0.50), dec!(0.01)), Some(dec!(0.45)));
        // bid+tick = 0.49 > mid 0.485 -> capped, rounded to tick.
        assert_eq!(entry_price(dec!(0.48), dec!(0.49), dec!(0.01)), Some(dec!(0.48)));
    }

    #[test]
    fn entry_price_rejected_outside_band() {
        assert_eq!(entry_price(dec!(0.05), dec!(0.07), dec!(0.01)), None);
        assert_eq!(entry_price(dec!(0.93), dec!(0.95), dec!(0.01)), None);
    }

    #[test]
    fn liquidity_gate() {
        let d = depth(dec!(0.48), dec!(0.49), dec!(150), dec!(150));
        assert!(check_liquidity(&d, dec!(5), MIN_LIQUIDITY));

        // Spread 0.01 > 0.5% of a dollar.
        assert!(!check_liquidity(&d, dec!(0.5), MIN_LIQUIDITY));

        let thin = depth(dec!(0.48), dec!(0.49), dec!(150), dec!(50));
        assert!(!check_liquidity(&thin, dec!(5), MIN_LIQUIDITY));
    }

    #[test]
    fn book_ratio_gate() {
        let d = depth(dec!(0.48), dec!(0.49), dec!(100), dec!(200));
        assert!(check_book_ratio(&d, Decimal::ZERO));
        assert!(check_book_ratio(&d, dec!(0.5)));
        assert!(!check_book_ratio(&d, dec!(0.75)));
    }

    #[test]
    fn position_limit_gate() {
        assert!(within_position_limits(dec!(50), dec!(40), dec!(100), dec!(1000)));
        assert!(!within_position_limits(dec!(80), dec!(40), dec!(100), dec!(1000)));
        // A tighter configured cap trips before the market's max size.
        assert!(!within_position_limits(dec!(50), dec!(40), dec!(200), dec!(75)));
        // Caps above the absolute cap still trip it.
        assert!(!within_position_limits(dec!(200), dec!(60), dec!(500), dec!(1000)));
    }

    #[test]
    fn price_deviation_gate() {
        assert!(price_deviation_ok(dec!(0.45), dec!(0.44), dec!(0.05)));
        assert!(!price_deviation_ok(dec!(0.52), dec!(0.44), dec!(0.05)));
        assert!(price_deviation_ok(dec!(0.52), Decimal::ZERO, dec!(0.05)));
    }

    struct NullApi;

    #[async_trait]
    impl ClobApi for NullApi {
        async fn create_order(&self, _: &OrderArgs) -> crate::error::Result<OrderDescriptor> {
            unimplemented!("not used")
        }
        async fn cancel_order(&self, _: &str) -> crate::error::Result<()> {
            Ok(())
        }
        async fn open_orders(&self) -> crate::error::Result<Vec<ApiOrder>> {
            Ok(Vec::new())
        }
        async fn positions(&self) -> crate::error::Result<Vec<ApiPosition>> {
            Ok(Vec::new())
        }
        async fn order_book(&self, _: &TokenId) -> crate::error::Result<ApiBook> {
            Ok(ApiBook::default())
        }
        async fn merge_positions(
            &self,
            _: u64,
            _: &MarketId,
            _: bool,
        ) -> crate::error::Result<()> {
            Ok(())
        }
    }

    fn risk_manager(dir: &std::path::Path) -> (RiskManager, Arc<PositionManager>) {
        let state = Arc::new(BotState::new());
        let client = Arc::new(ExchangeClient::new(Arc::new(NullApi), state.clone()));
        let positions = Arc::new(PositionManager::new(state, client, dir).unwrap());
        let data = Arc::new(MarketData::new());
        (
            RiskManager::new(positions.clone(), data, dec!(1000), dec!(5000)),
            positions,
        )
    }

    fn cooldown_market() -> Market {
        Market {
            condition_id: MarketId::new("0xcond"),
            token1: TokenId::new("a"),
            token2: TokenId::new("b"),
            question: "Rain?".to_string(),
            answer1: "Yes".to_string(),
            answer2: "No".to_string(),
            enabled: true,
            param_type: "default".to_string(),
            neg_risk: false,
            tick_size: dec!(0.01),
            trade_size: None,
            max_size: None,
            min_size: None,
            max_spread: None,
        }
    }

    fn stop_loss_event(sleep_till: chrono::DateTime<Utc>) -> RiskEvent {
        RiskEvent::StopLoss {
            time: Utc::now(),
            question: "Rain?".to_string(),
            token_id: TokenId::new("a"),
            outcome: "Yes".to_string(),
            exit_price: dec!(0.48),
            pnl_pct: dec!(-3),
            sleep_till,
        }
    }

    #[test]
    fn cooldown_active_while_sleep_till_in_future() {
        let dir = tempfile::tempdir().unwrap();
        let (risk, positions) = risk_manager(dir.path());
        let market = cooldown_market();

        assert!(!risk.in_cooldown(&market));

        positions.save_risk_event(
            &market.condition_id,
            &stop_loss_event(Utc::now() + Duration::hours(1)),
        );
        assert!(risk.in_cooldown(&market));
    }

    #[test]
    fn expired_cooldown_is_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let (risk, positions) = risk_manager(dir.path());
        let market = cooldown_market();

        positions.save_risk_event(
            &market.condition_id,
            &stop_loss_event(Utc::now() - Duration::minutes(5)),
        );

        assert!(!risk.in_cooldown(&market));
        // The expired event file is gone afterwards.
        assert!(positions.risk_event(&market.condition_id).is_none());
    }
}
