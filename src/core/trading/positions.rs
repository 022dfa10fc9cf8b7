//! Position management: fills, snapshot reconciliation, merging, and
//! the persisted risk-event files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, error, info, warn};

use crate::app::state::BotState;
use crate::core::domain::{
    from_base_units, to_base_units, MarketId, Position, Price, RiskEvent, Side, TokenId, Volume,
};
use crate::core::exchange::ExchangeClient;
use crate::error::Result;

/// Smallest mergeable amount; merges below this burn gas for nothing.
pub const MIN_MERGE_SIZE: Volume = dec!(1.0);

/// A detected merge opportunity.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeCandidate {
    pub token1: TokenId,
    pub token2: TokenId,
    pub amount: Volume,
}

/// Tracks sizes and average entries, reconciles against exchange
/// snapshots, merges offsetting holdings, and owns the risk-event files.
pub struct PositionManager {
    state: Arc<BotState>,
    client: Arc<ExchangeClient>,
    positions_dir: PathBuf,
}

impl PositionManager {
    /// Create the manager, ensuring the risk-event directory exists.
    pub fn new(
        state: Arc<BotState>,
        client: Arc<ExchangeClient>,
        positions_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let positions_dir = positions_dir.into();
        std::fs::create_dir_all(&positions_dir)?;
        Ok(Self {
            state,
            client,
            positions_dir,
        })
    }

    /// Position for a token, flat if untracked.
    #[must_use]
    pub fn position(&self, token: &TokenId) -> Position {
        self.state.position(token)
    }

    /// Apply a fill to the tracked position.
    pub fn update_position(
        &self,
        token: &TokenId,
        side: Side,
        size: Volume,
        price: Price,
        source: &str,
    ) {
        let updated = self.state.apply_fill(token, side, size, price);
        info!(
            token = %token,
            side = %side,
            size = %size,
            price = %price,
            source,
            new_size = %updated.size(),
            new_avg = %updated.avg_price(),
            "Position updated"
        );
    }

    /// Reconcile tracked positions against the exchange snapshot.
    ///
    /// With `avg_only`, only average entries of already-tracked tokens are
    /// refreshed; otherwise every returned token's record is replaced.
    pub async fn reconcile(&self, avg_only: bool) {
        let positions = self.client.positions().await;
        for record in &positions {
            if avg_only {
                self.state.set_avg_price(&record.token_id, record.avg_price);
            } else {
                self.state.set_position(
                    &record.token_id,
                    Position::new(record.size, record.avg_price),
                );
            }
        }
        debug!(count = positions.len(), avg_only, "Reconciled positions");
    }

    /// Offsetting holdings worth merging, if any.
    #[must_use]
    pub fn check_merge_opportunity(&self, market_id: &MarketId) -> Option<MergeCandidate> {
        let market = self.state.market(market_id)?;
        let amount = self
            .position(&market.token1)
            .size()
            .min(self.position(&market.token2).size());

        (amount > MIN_MERGE_SIZE).then(|| MergeCandidate {
            token1: market.token1,
            token2: market.token2,
            amount,
        })
    }

    /// Merge offsetting holdings back into collateral.
    ///
    /// The locally tracked candidate is re-checked against on-chain sizes
    /// before the merge; bookkeeping applies two SELLs on success.
    pub async fn merge_positions(&self, market_id: &MarketId, neg_risk: bool) -> bool {
        let Some(candidate) = self.check_merge_opportunity(market_id) else {
            return false;
        };

        let onchain = self.client.positions().await;
        let base_size = |token: &TokenId| {
            onchain
                .iter()
                .find(|p| p.token_id == *token)
                .map(|p| p.size_base)
        };
        let (Some(base1), Some(base2)) = (base_size(&candidate.token1), base_size(&candidate.token2))
        else {
            warn!(market = %market_id, "Could not fetch on-chain positions for merge");
            return false;
        };

        let amount_base = base1.min(base2);
        if amount_base < to_base_units(MIN_MERGE_SIZE) {
            return false;
        }

        info!(
            market = %market_id,
            amount = %from_base_units(amount_base),
            token1_size = %from_base_units(base1),
            token2_size = %from_base_units(base2),
            "Merging positions"
        );

        if !self
            .client
            .merge_positions(amount_base, market_id, neg_risk)
            .await
        {
            error!(market = %market_id, "Merge transaction failed");
            return false;
        }

        let amount = from_base_units(amount_base);
        self.update_position(&candidate.token1, Side::Sell, amount, Decimal::ZERO, "merge");
        self.update_position(&candidate.token2, Side::Sell, amount, Decimal::ZERO, "merge");
        info!(market = %market_id, amount = %amount, "Merge complete");
        true
    }

    /// Sum of cost bases across all tracked positions.
    #[must_use]
    pub fn total_exposure(&self) -> Price {
        self.state.total_exposure()
    }

    // --- risk-event files ---

    fn event_path(&self, market_id: &MarketId) -> PathBuf {
        self.positions_dir.join(format!("{market_id}.json"))
    }

    /// Persist a risk event for a market, replacing any previous one.
    pub fn save_risk_event(&self, market_id: &MarketId, event: &RiskEvent) {
        let path = self.event_path(market_id);
        match serde_json::to_string_pretty(event) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    error!(market = %market_id, path = %path.display(), error = %e, "Failed to save risk event");
                } else {
                    info!(market = %market_id, "Saved risk event");
                }
            }
            Err(e) => error!(market = %market_id, error = %e, "Failed to encode risk event"),
        }
    }

    /// Load a market's persisted risk event, if one exists.
    #[must_use]
    pub fn risk_event(&self, market_id: &MarketId) -> Option<RiskEvent> {
        let path = self.event_path(market_id);
        if !path.exists() {
            return None;
        }
        match std::fs::read_to_string(&path).map_err(|e| e.to_string()).and_then(|contents| {
            serde_json::from_str(&contents).map_err(|e| e.to_string())
        }) {
            Ok(event) => Some(event),
            Err(e) => {
                error!(market = %market_id, path = %path.display(), error = %e, "Failed to load risk event");
                None
            }
        }
    }

    /// Remove a market's risk-event file.
    pub fn clear_risk_event(&self, market_id: &MarketId) {
        let path = self.event_path(market_id);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                error!(market = %market_id, error = %e, "Failed to clear risk event");
            } else {
                info!(market = %market_id, "Cleared risk event");
            }
        }
    }

    /// Where this manager keeps its risk-event files.
    #[must_use]
    pub fn positions_dir(&self) -> &Path {
        &self.positions_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{Market, ParameterProfile};
    use crate::core::exchange::{
        ApiBook, ApiOrder, ApiPosition, ClobApi, OrderArgs, OrderDescriptor,
    };
    use crate::core::retry::RetryPolicy;
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MergeApi {
        positions: Mutex<Vec<ApiPosition>>,
        merges: Mutex<Vec<(u64, MarketId, bool)>>,
    }

    #[async_trait]
    impl ClobApi for MergeApi {
        async fn create_order(&self, _: &OrderArgs) -> Result<OrderDescriptor> {
            unimplemented!("not used")
        }
        async fn cancel_order(&self, _: &str) -> Result<()> {
            Ok(())
        }
        async fn open_orders(&self) -> Result<Vec<ApiOrder>> {
            Ok(Vec::new())
        }
        async fn positions(&self) -> Result<Vec<ApiPosition>> {
            Ok(self.positions.lock().clone())
        }
        async fn order_book(&self, _: &TokenId) -> Result<ApiBook> {
            Ok(ApiBook::default())
        }
        async fn merge_positions(&self, amount: u64, id: &MarketId, neg_risk: bool) -> Result<()> {
            self.merges.lock().push((amount, id.clone(), neg_risk));
            Ok(())
        }
    }

    fn market() -> Market {
        Market {
            condition_id: MarketId::new("0xcond"),
            token1: TokenId::new("tok-a"),
            token2: TokenId::new("tok-b"),
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

    fn manager(api: Arc<MergeApi>, dir: &Path) -> (PositionManager, Arc<BotState>) {
        let state = Arc::new(BotState::new());
        state.set_markets(vec![market()]);
        state.set_profiles(std::collections::HashMap::from([(
            "default".to_string(),
            ParameterProfile::default(),
        )]));
        let client = Arc::new(ExchangeClient::new(api, state.clone()).with_retry(RetryPolicy {
            max_attempts: 1,
            initial_delay: Duration::from_millis(1),
            backoff: 2.0,
        }));
        let manager = PositionManager::new(state.clone(), client, dir).unwrap();
        (manager, state)
    }

    #[test]
    fn risk_event_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(MergeApi::default());
        let (manager, _) = manager(api, dir.path());
        let market_id = MarketId::new("0xcond");

        assert!(manager.risk_event(&market_id).is_none());

        let event = RiskEvent::StopLoss {
            time: Utc::now(),
            question: "Rain?".to_string(),
            token_id: TokenId::new("tok-a"),
            outcome: "Yes".to_string(),
            exit_price: dec!(0.48),
            pnl_pct: dec!(-3),
            sleep_till: Utc::now() + chrono::Duration::hours(1),
        };
        manager.save_risk_event(&market_id, &event);
        assert_eq!(manager.risk_event(&market_id), Some(event));

        manager.clear_risk_event(&market_id);
        assert!(manager.risk_event(&market_id).is_none());
    }

    #[test]
    fn merge_candidate_needs_both_legs_above_minimum() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(MergeApi::default());
        let (manager, state) = manager(api, dir.path());
        let market_id = MarketId::new("0xcond");

        state.set_position(&TokenId::new("tok-a"), Position::new(dec!(50), dec!(0.4)));
        assert!(manager.check_merge_opportunity(&market_id).is_none());

        state.set_position(&TokenId::new("tok-b"), Position::new(dec!(30), dec!(0.6)));
        let candidate = manager.check_merge_opportunity(&market_id).unwrap();
        assert_eq!(candidate.amount, dec!(30));

        // At or below the minimum is not worth the gas.
        state.set_position(&TokenId::new("tok-b"), Position::new(dec!(1), dec!(0.6)));
        assert!(manager.check_merge_opportunity(&market_id).is_none());
    }

    #[tokio::test]
    async fn merge_uses_onchain_sizes_and_books_two_sells() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(MergeApi::default());
        *api.positions.lock() = vec![
            ApiPosition {
                asset_id: "tok-a".to_string(),
                size: "50000000".to_string(),
                avg_entry_price: "0.40".to_string(),
            },
            ApiPosition {
                asset_id: "tok-b".to_string(),
                size: "30000000".to_string(),
                avg_entry_price: "0.60".to_string(),
            },
        ];
        let (manager, state) = manager(api.clone(), dir.path());
        let market_id = MarketId::new("0xcond");

        state.set_position(&TokenId::new("tok-a"), Position::new(dec!(50), dec!(0.40)));
        state.set_position(&TokenId::new("tok-b"), Position::new(dec!(30), dec!(0.60)));

        assert!(manager.merge_positions(&market_id, false).await);

        let merges = api.merges.lock();
        assert_eq!(merges.len(), 1);
        assert_eq!(merges[0].0, 30_000_000);

        let pos_a = state.position(&TokenId::new("tok-a"));
        let pos_b = state.position(&TokenId::new("tok-b"));
        assert_eq!(pos_a.size(), dec!(20));
        assert_eq!(pos_a.avg_price(), dec!(0.40));
        assert!(pos_b.is_flat());
        assert_eq!(pos_b.avg_price(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn merge_aborts_when_onchain_amount_below_minimum() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(MergeApi::default());
        *api.positions.lock() = vec![
            ApiPosition {
                asset_id: "tok-a".to_string(),
                size: "50000000".to_string(),
                avg_entry_price: "0.40".to_string(),
            },
            ApiPosition {
                asset_id: "tok-b".to_string(),
                size: "500000".to_string(), // 0.5 tokens on-chain
                avg_entry_price: "0.60".to_string(),
            },
        ];
        let (manager, state) = manager(api.clone(), dir.path());

        // Locally the candidate looks fine; on-chain it is dust.
        state.set_position(&TokenId::new("tok-a"), Position::new(dec!(50), dec!(0.40)));
        state.set_position(&TokenId::new("tok-b"), Position::new(dec!(30), dec!(0.60)));

        assert!(!manager.merge_positions(&MarketId::new("0xcond"), false).await);
        assert!(api.merges.lock().is_empty());
    }

    #[tokio::test]
    async fn reconcile_full_and_avg_only() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(MergeApi::default());
        *api.positions.lock() = vec![ApiPosition {
            asset_id: "tok-a".to_string(),
            size: "25000000".to_string(),
            avg_entry_price: "0.4500".to_string(),
        }];
        let (manager, state) = manager(api.clone(), dir.path());

        // avg_only leaves untracked tokens alone.
        manager.reconcile(true).await;
        assert!(state.position(&TokenId::new("tok-a")).is_flat());

        // Full reconcile adopts the snapshot.
        manager.reconcile(false).await;
        let pos = state.position(&TokenId::new("tok-a"));
        assert_eq!(pos.size(), dec!(25));
        assert_eq!(pos.avg_price(), dec!(0.45));

        // avg_only now refreshes the entry but keeps local size.
        *api.positions.lock() = vec![ApiPosition {
            asset_id: "tok-a".to_string(),
            size: "99000000".to_string(),
            avg_entry_price: "0.4700".to_string(),
        }];
        manager.reconcile(true).await;
        let pos = state.position(&TokenId::new("tok-a"));
        assert_eq!(pos.size(), dec!(25));
        assert_eq!(pos.avg_price(), dec!(0.47));
    }
}
