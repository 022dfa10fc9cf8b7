//! Spreadsheet-backed configuration source.
//!
//! The selected-markets catalog, the parameter-profile table, and the
//! all-markets database live in a Google spreadsheet; computed statistics
//! are written back into the selected-markets worksheet. Reads tolerate a
//! missing worksheet (reported, empty result); an unreachable spreadsheet
//! surfaces as an error for the boot path to treat as fatal.

mod auth;
mod rows;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

pub use auth::ServiceAccountKey;
use auth::TokenProvider;
pub use rows::{CatalogRow, Table};

use crate::core::domain::{Market, MarketId, ParameterProfile, Price};
use crate::error::{Error, Result};
use rust_decimal::Decimal;

/// Worksheet holding markets selected for trading.
pub const WORKSHEET_SELECTED: &str = "Selected Markets";
/// Worksheet holding the parameter-profile table.
pub const WORKSHEET_PARAMS: &str = "Hyperparameters";
/// Worksheet holding the database of all known markets.
pub const WORKSHEET_ALL_MARKETS: &str = "All Markets";

const SELECTED_HEADERS: [&str; 17] = [
    "condition_id",
    "token1",
    "token2",
    "question",
    "answer1",
    "answer2",
    "enabled",
    "param_type",
    "neg_risk",
    "min_size",
    "trade_size",
    "max_size",
    "max_spread",
    "tick_size",
    "3_hour",
    "best_bid",
    "best_ask",
];

const PARAM_HEADERS: [&str; 10] = [
    "param_type",
    "trade_size",
    "max_size",
    "min_size",
    "max_spread",
    "stop_loss_threshold",
    "take_profit_threshold",
    "volatility_threshold",
    "spread_threshold",
    "sleep_period",
];

const ALL_MARKETS_HEADERS: [&str; 11] = [
    "condition_id",
    "question",
    "token1",
    "token2",
    "answer1",
    "answer2",
    "neg_risk",
    "volume",
    "liquidity",
    "end_date",
    "active",
];

/// Statistics written back into the selected-markets worksheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketStats {
    pub volatility_3h: Option<Decimal>,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Serialize)]
struct WriteBody {
    values: Vec<Vec<String>>,
}

/// Client for the spreadsheet configuration source.
pub struct SheetsClient {
    http: reqwest::Client,
    tokens: TokenProvider,
    spreadsheet_id: String,
}

impl SheetsClient {
    #[must_use]
    pub fn new(spreadsheet_id: String, key: ServiceAccountKey) -> Self {
        let http = reqwest::Client::new();
        Self {
            tokens: TokenProvider::new(key, http.clone()),
            http,
            spreadsheet_id,
        }
    }

    /// Extract the spreadsheet id from a `.../spreadsheets/d/<id>/...` URL.
    pub fn spreadsheet_id_from_url(url: &str) -> Result<String> {
        let parsed = url::Url::parse(url)?;
        let mut segments = parsed
            .path_segments()
            .ok_or_else(|| Error::Sheets(format!("spreadsheet URL has no path: {url}")))?;

        while let Some(segment) = segments.next() {
            if segment == "d" {
                return segments
                    .next()
                    .filter(|id| !id.is_empty())
                    .map(ToString::to_string)
                    .ok_or_else(|| Error::Sheets(format!("no spreadsheet id in URL: {url}")));
            }
        }
        Err(Error::Sheets(format!("no spreadsheet id in URL: {url}")))
    }

    fn values_url(&self, suffix: &str) -> String {
        format!(
            "https://sheets.googleapis.com/v4/spreadsheets/{}/values/{suffix}",
            self.spreadsheet_id
        )
    }

    /// Read a worksheet into a table. A missing worksheet is reported and
    /// comes back empty; transport and auth failures are errors.
    async fn read_table(&self, worksheet: &str) -> Result<Table> {
        let token = self.tokens.bearer().await?;
        let response = self
            .http
            .get(self.values_url(worksheet))
            .bearer_auth(token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::BAD_REQUEST {
            warn!(worksheet, "Worksheet not found");
            return Ok(Table::default());
        }

        let range: ValueRange = response.error_for_status()?.json().await?;
        let values = range
            .values
            .into_iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect();
        Ok(Table::new(values))
    }

    /// Clear a worksheet and write `rows` from its top-left cell.
    async fn overwrite(&self, worksheet: &str, rows: Vec<Vec<String>>) -> Result<()> {
        let token = self.tokens.bearer().await?;
        self.http
            .post(self.values_url(&format!("{worksheet}:clear")))
            .bearer_auth(&token)
            .json(&serde_json::json!({}))
            .send()
            .await?
            .error_for_status()?;

        self.http
            .put(format!(
                "{}?valueInputOption=RAW",
                self.values_url(worksheet)
            ))
            .bearer_auth(&token)
            .json(&WriteBody { values: rows })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Markets selected for trading.
    pub async fn selected_markets(&self) -> Result<Vec<Market>> {
        let table = self.read_table(WORKSHEET_SELECTED).await?;
        let markets: Vec<Market> = table.rows().filter_map(rows::parse_market).collect();
        info!(count = markets.len(), "Loaded selected markets");
        Ok(markets)
    }

    /// Parameter profiles indexed by `param_type`.
    pub async fn hyperparameters(&self) -> Result<HashMap<String, ParameterProfile>> {
        let table = self.read_table(WORKSHEET_PARAMS).await?;
        let profiles: HashMap<String, ParameterProfile> =
            table.rows().filter_map(rows::parse_profile).collect();
        info!(count = profiles.len(), "Loaded parameter profiles");
        Ok(profiles)
    }

    /// The database of all known markets.
    pub async fn all_markets(&self) -> Result<Vec<CatalogRow>> {
        let table = self.read_table(WORKSHEET_ALL_MARKETS).await?;
        let rows: Vec<CatalogRow> = table.rows().filter_map(rows::parse_catalog).collect();
        info!(count = rows.len(), "Loaded all-markets database");
        Ok(rows)
    }

    /// Write computed stats into a market's row of the selected-markets
    /// worksheet. The whole sheet is rewritten (clear + set).
    pub async fn update_market_stats(
        &self,
        market_id: &MarketId,
        stats: &MarketStats,
    ) -> Result<()> {
        let table = self.read_table(WORKSHEET_SELECTED).await?;
        let Some(updated) = rows::patch_stats(&table, market_id, stats) else {
            warn!(market = %market_id, "Market not found in selected markets");
            return Ok(());
        };

        self.overwrite(WORKSHEET_SELECTED, updated).await?;
        debug!(market = %market_id, "Updated market stats");
        Ok(())
    }

    /// Bootstrap the three worksheets with their header rows and one
    /// default parameter profile. Not run on normal startup.
    pub async fn create_template(&self) -> Result<()> {
        self.overwrite(
            WORKSHEET_SELECTED,
            vec![SELECTED_HEADERS.map(String::from).to_vec()],
        )
        .await?;

        let defaults = ParameterProfile::default();
        self.overwrite(
            WORKSHEET_PARAMS,
            vec![
                PARAM_HEADERS.map(String::from).to_vec(),
                vec![
                    "default".to_string(),
                    defaults.trade_size.to_string(),
                    defaults.max_size.to_string(),
                    defaults.min_size.to_string(),
                    defaults.max_spread.to_string(),
                    defaults.stop_loss_threshold.to_string(),
                    defaults.take_profit_threshold.to_string(),
                    defaults.volatility_threshold.to_string(),
                    defaults.spread_threshold.to_string(),
                    defaults.sleep_period_hours.to_string(),
                ],
            ],
        )
        .await?;

        self.overwrite(
            WORKSHEET_ALL_MARKETS,
            vec![ALL_MARKETS_HEADERS.map(String::from).to_vec()],
        )
        .await?;

        info!("Created template worksheets");
        Ok(())
    }
}

fn cell_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
