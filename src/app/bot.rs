//! Bot orchestration: build the component graph, run the long-lived
//! tasks, and shut down cleanly on SIGINT/SIGTERM.

use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};

use super::config::Config;
use super::state::BotState;
use super::updater::Updater;
use crate::core::data::MarketData;
use crate::core::exchange::{ExchangeClient, HttpClobApi};
use crate::core::sheets::{ServiceAccountKey, SheetsClient};
use crate::core::stream::{MarketStream, UserStream};
use crate::core::trading::{OrderManager, PositionManager, RiskManager, Strategy};
use crate::error::Result;

/// The assembled bot.
pub struct Bot {
    config: Config,
    state: Arc<BotState>,
    positions: Arc<PositionManager>,
    data: Arc<MarketData>,
    strategy: Arc<Strategy>,
    updater: Arc<Updater>,
}

impl Bot {
    /// Build every component and run the blocking startup refresh.
    pub async fn init(config: Config) -> Result<Self> {
        info!(chain_id = config.chain_id, "Initializing exchange client");
        let state = Arc::new(BotState::new());
        let api = Arc::new(HttpClobApi::new(
            &config.api_url,
            config.wallet_address.clone(),
            config.private_key.clone(),
        )?);
        let client = Arc::new(ExchangeClient::new(api, state.clone()));

        info!("Connecting to configuration spreadsheet");
        let key = ServiceAccountKey::from_file(&config.credentials_file)?;
        let spreadsheet_id = SheetsClient::spreadsheet_id_from_url(&config.spreadsheet_url)?;
        let sheets = Arc::new(SheetsClient::new(spreadsheet_id, key));

        let data = Arc::new(MarketData::new());
        let positions = Arc::new(PositionManager::new(
            state.clone(),
            client.clone(),
            config.positions_dir(),
        )?);
        let orders = Arc::new(OrderManager::new(state.clone(), client.clone()));
        let risk = Arc::new(RiskManager::new(
            positions.clone(),
            data.clone(),
            config.max_position_size,
            config.max_total_exposure,
        ));
        let strategy = Arc::new(Strategy::new(
            state.clone(),
            data.clone(),
            positions.clone(),
            orders.clone(),
            risk,
        ));

        let updater = Arc::new(Updater::new(
            state.clone(),
            data.clone(),
            positions.clone(),
            orders,
            sheets,
        ));
        updater.refresh_once().await;

        Ok(Self {
            config,
            state,
            positions,
            data,
            strategy,
            updater,
        })
    }

    /// Run the updater and both streams until a shutdown signal, then
    /// wind down cooperatively.
    pub async fn run(&self) -> Result<()> {
        let updater = self.updater.clone();
        let updater_task = tokio::spawn(async move { updater.run().await });

        let market_stream = MarketStream::new(
            self.config.market_ws_url(),
            self.state.clone(),
            self.data.clone(),
            self.strategy.clone(),
        );
        let market_task = tokio::spawn(async move { market_stream.run().await });

        let user_stream = UserStream::new(
            self.config.user_ws_url(),
            self.config.api_key.clone(),
            self.state.clone(),
            self.positions.clone(),
        );
        let user_task = tokio::spawn(async move { user_stream.run().await });

        info!("Bot running");
        shutdown_signal().await;
        info!("Shutdown signal received");

        self.updater.stop();
        market_task.abort();
        user_task.abort();
        if let Err(e) = updater_task.await {
            if !e.is_cancelled() {
                error!(error = %e, "Updater task failed");
            }
        }

        info!("Bot stopped");
        Ok(())
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let sigterm = async {
        #[cfg(unix)]
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
        #[cfg(not(unix))]
        std::future::pending::<()>().await;
    };

    tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for ctrl-c");
            }
        }
        () = sigterm => {}
    }
}
