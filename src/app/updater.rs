//! Periodic reconciliation against REST snapshots and the spreadsheet.
//!
//! Every 5 seconds: sweep leaked in-flight markers, refresh positions
//! (average entries only) and resting orders. Every 6th tick (~30 s),
//! refresh the market catalog, write computed stats back to the sheet,
//! and prune stale books. A blocking one-shot of the same work runs at
//! startup with a full position reconcile.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::state::BotState;
use crate::core::data::MarketData;
use crate::core::sheets::{MarketStats, SheetsClient};
use crate::core::trading::{OrderManager, PositionManager};

/// Base cadence of the updater.
const UPDATE_INTERVAL: Duration = Duration::from_secs(5);
/// Catalog refresh happens every this many ticks.
const CATALOG_REFRESH_TICKS: u32 = 6;
/// In-flight markers older than this are leaked and get swept.
const STALE_OP_AGE: Duration = Duration::from_secs(15);
/// Books untouched for this long are dropped from the aggregator.
const STALE_BOOK_MINUTES: i64 = 60;
/// Window for the volatility stat written back to the sheet.
const STATS_VOLATILITY_HOURS: i64 = 3;

/// The periodic update loop.
pub struct Updater {
    state: Arc<BotState>,
    data: Arc<MarketData>,
    positions: Arc<PositionManager>,
    orders: Arc<OrderManager>,
    sheets: Arc<SheetsClient>,
    running: AtomicBool,
}

impl Updater {
    #[must_use]
    pub fn new(
        state: Arc<BotState>,
        data: Arc<MarketData>,
        positions: Arc<PositionManager>,
        orders: Arc<OrderManager>,
        sheets: Arc<SheetsClient>,
    ) -> Self {
        Self {
            state,
            data,
            positions,
            orders,
            sheets,
            running: AtomicBool::new(false),
        }
    }

    /// Startup one-shot: catalog, profiles, full position reconcile,
    /// order reconcile.
    pub async fn refresh_once(&self) {
        info!("Performing initial data refresh");
        self.refresh_catalog().await;
        self.refresh_profiles().await;
        self.positions.reconcile(false).await;
        self.orders.reconcile().await;
        info!(
            markets = self.state.markets().len(),
            positions = self.state.position_count(),
            orders = self.state.order_count(),
            "Initial refresh complete"
        );
    }

    /// Run until [`stop`](Self::stop). A failed cycle waits out the
    /// normal interval and tries again.
    pub async fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        info!("Starting periodic updates");

        let mut tick = 0u32;
        while self.running.load(Ordering::SeqCst) {
            sleep(UPDATE_INTERVAL).await;
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            for (kind, id, age) in self.state.sweep_stale_ops(STALE_OP_AGE) {
                warn!(
                    operation = kind.as_str(),
                    id,
                    age_secs = age.as_secs_f64(),
                    "Swept stale in-flight operation"
                );
            }

            self.positions.reconcile(true).await;
            self.orders.reconcile().await;

            tick += 1;
            if tick == CATALOG_REFRESH_TICKS {
                tick = 0;
                let (market_up, user_up) = self.state.stream_health();
                if !market_up || !user_up {
                    warn!(market_up, user_up, "Stream health degraded");
                }
                self.refresh_catalog().await;
                self.write_back_stats().await;
                self.data.clear_stale(STALE_BOOK_MINUTES);
            }
        }
        info!("Periodic updates stopped");
    }

    /// Ask the loop to wind down after the current cycle.
    pub fn stop(&self) {
        info!("Stopping periodic updates");
        self.running.store(false, Ordering::SeqCst);
    }

    async fn refresh_catalog(&self) {
        match self.sheets.selected_markets().await {
            Ok(markets) => self.state.set_markets(markets),
            Err(e) => error!(error = %e, "Failed to refresh market catalog"),
        }
    }

    async fn refresh_profiles(&self) {
        match self.sheets.hyperparameters().await {
            Ok(profiles) => self.state.set_profiles(profiles),
            Err(e) => error!(error = %e, "Failed to refresh parameter profiles"),
        }
    }

    /// Push computed stats (3-hour volatility, top of book of token1)
    /// into the selected-markets worksheet.
    async fn write_back_stats(&self) {
        for market in self.state.markets() {
            let (best_bid, best_ask) = self.data.best_bid_ask(&market.token1);
            let stats = MarketStats {
                volatility_3h: self.data.volatility(&market.token1, STATS_VOLATILITY_HOURS),
                best_bid,
                best_ask,
            };
            if stats == MarketStats::default() {
                continue;
            }
            if let Err(e) = self
                .sheets
                .update_market_stats(&market.condition_id, &stats)
                .await
            {
                error!(market = %market.condition_id, error = %e, "Failed to write back stats");
            } else {
                debug!(market = %market.condition_id, "Wrote back market stats");
            }
        }
    }
}
