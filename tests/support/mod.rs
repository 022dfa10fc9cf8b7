//! Shared test harness: a scriptable exchange stub and a fully wired
//! trading stack.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal_macros::dec;

use bidsmith::app::state::BotState;
use bidsmith::core::data::MarketData;
use bidsmith::core::domain::{Market, MarketId, ParameterProfile, TokenId};
use bidsmith::core::exchange::{
    ApiBook, ApiOrder, ApiPosition, ClobApi, ExchangeClient, OrderArgs, OrderDescriptor,
};
use bidsmith::core::retry::RetryPolicy;
use bidsmith::core::trading::{OrderManager, PositionManager, RiskManager, Strategy};
use bidsmith::error::Result;

/// Scriptable [`ClobApi`] recording every mutating call.
#[derive(Default)]
pub struct StubApi {
    pub positions: Mutex<Vec<ApiPosition>>,
    pub open_orders: Mutex<Vec<ApiOrder>>,
    pub created: Mutex<Vec<OrderArgs>>,
    pub cancelled: Mutex<Vec<String>>,
    pub merges: Mutex<Vec<(u64, MarketId, bool)>>,
}

#[async_trait]
impl ClobApi for StubApi {
    async fn create_order(&self, args: &OrderArgs) -> Result<OrderDescriptor> {
        self.created.lock().push(args.clone());
        Ok(OrderDescriptor {
            order_id: format!("order-{}", self.created.lock().len()),
            status: None,
        })
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        self.cancelled.lock().push(order_id.to_string());
        Ok(())
    }

    async fn open_orders(&self) -> Result<Vec<ApiOrder>> {
        Ok(self.open_orders.lock().clone())
    }

    async fn positions(&self) -> Result<Vec<ApiPosition>> {
        Ok(self.positions.lock().clone())
    }

    async fn order_book(&self, _token: &TokenId) -> Result<ApiBook> {
        Ok(ApiBook::default())
    }

    async fn merge_positions(
        &self,
        amount_base: u64,
        condition_id: &MarketId,
        neg_risk: bool,
    ) -> Result<()> {
        self.merges
            .lock()
            .push((amount_base, condition_id.clone(), neg_risk));
        Ok(())
    }
}

/// A binary market over `tok-yes` / `tok-no` under the default profile.
pub fn binary_market() -> Market {
    Market {
        condition_id: MarketId::new("0xcond"),
        token1: TokenId::new("tok-yes"),
        token2: TokenId::new("tok-no"),
        question: "Will it rain tomorrow?".to_string(),
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

/// A fully wired trading stack over [`StubApi`].
pub struct Harness {
    pub api: Arc<StubApi>,
    pub state: Arc<BotState>,
    pub data: Arc<MarketData>,
    pub positions: Arc<PositionManager>,
    pub strategy: Arc<Strategy>,
    #[allow(dead_code)]
    positions_dir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let api = Arc::new(StubApi::default());
        let state = Arc::new(BotState::new());
        state.set_markets(vec![binary_market()]);
        state.set_profiles(HashMap::from([(
            "default".to_string(),
            ParameterProfile::default(),
        )]));

        let client = Arc::new(
            ExchangeClient::new(api.clone(), state.clone()).with_retry(RetryPolicy {
                max_attempts: 1,
                initial_delay: Duration::from_millis(1),
                backoff: 2.0,
            }),
        );
        let data = Arc::new(MarketData::new());
        let positions_dir = tempfile::tempdir().expect("tempdir");
        let positions = Arc::new(
            PositionManager::new(state.clone(), client.clone(), positions_dir.path())
                .expect("positions dir"),
        );
        let orders = Arc::new(OrderManager::new(state.clone(), client.clone()));
        let risk = Arc::new(RiskManager::new(
            positions.clone(),
            data.clone(),
            dec!(1000),
            dec!(5000),
        ));
        let strategy = Arc::new(Strategy::new(
            state.clone(),
            data.clone(),
            positions.clone(),
            orders.clone(),
            risk,
        ));

        Self {
            api,
            state,
            data,
            positions,
            strategy,
            positions_dir,
        }
    }
}
