//! Worksheet table parsing.
//!
//! The first row is the header. Unnamed columns are dropped, fully empty
//! rows are skipped, and cells are addressed by header name so column
//! order in the sheet is free to change.

use rust_decimal::Decimal;
use tracing::warn;

use super::MarketStats;
use crate::core::domain::{Market, MarketId, ParameterProfile, TokenId};

/// A parsed worksheet: named columns over string cells.
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build from raw values; the first row is the header row.
    #[must_use]
    pub fn new(mut values: Vec<Vec<String>>) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let headers = values.remove(0);
        let rows = values
            .into_iter()
            .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
            .collect();
        Self { headers, rows }
    }

    /// True when the table has no data rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate data rows.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|cells| Row {
            headers: &self.headers,
            cells,
        })
    }

    /// Rebuild the raw value grid (header row first).
    #[must_use]
    pub fn to_values(&self) -> Vec<Vec<String>> {
        let mut values = Vec::with_capacity(self.rows.len() + 1);
        values.push(self.headers.clone());
        values.extend(self.rows.iter().cloned());
        values
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }
}

/// One data row addressed by column name.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    headers: &'a [String],
    cells: &'a [String],
}

impl Row<'_> {
    /// Cell under a named column; empty and unnamed columns read as `None`.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        if column.trim().is_empty() {
            return None;
        }
        let index = self.headers.iter().position(|h| h.trim() == column)?;
        let cell = self.cells.get(index)?.trim();
        (!cell.is_empty()).then_some(cell)
    }

    /// Cell parsed as a decimal.
    #[must_use]
    pub fn decimal(&self, column: &str) -> Option<Decimal> {
        self.get(column)?.parse().ok()
    }

    /// Cell parsed as a boolean (`TRUE`/`true`/`1`).
    #[must_use]
    pub fn flag(&self, column: &str) -> bool {
        self.get(column)
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false)
    }
}

/// Parse one selected-markets row. Rows without a condition id and both
/// token ids are skipped with a warning.
pub fn parse_market(row: Row<'_>) -> Option<Market> {
    let (Some(condition_id), Some(token1), Some(token2)) = (
        row.get("condition_id"),
        row.get("token1"),
        row.get("token2"),
    ) else {
        warn!("Skipping selected-markets row without ids");
        return None;
    };

    Some(Market {
        condition_id: MarketId::new(condition_id),
        token1: TokenId::new(token1),
        token2: TokenId::new(token2),
        question: row.get("question").unwrap_or_default().to_string(),
        answer1: row.get("answer1").unwrap_or_default().to_string(),
        answer2: row.get("answer2").unwrap_or_default().to_string(),
        enabled: row.flag("enabled"),
        param_type: row.get("param_type").unwrap_or("default").to_string(),
        neg_risk: row.flag("neg_risk"),
        tick_size: row.decimal("tick_size").unwrap_or_else(|| Decimal::new(1, 2)),
        trade_size: row.decimal("trade_size"),
        max_size: row.decimal("max_size"),
        min_size: row.decimal("min_size"),
        max_spread: row.decimal("max_spread"),
    })
}

/// Parse one hyperparameters row into `(profile_name, profile)`.
/// Missing cells fall back to the default profile's values.
pub fn parse_profile(row: Row<'_>) -> Option<(String, ParameterProfile)> {
    let name = row.get("param_type")?.to_string();
    let defaults = ParameterProfile::default();
    let profile = ParameterProfile {
        trade_size: row.decimal("trade_size").unwrap_or(defaults.trade_size),
        max_size: row.decimal("max_size").unwrap_or(defaults.max_size),
        min_size: row.decimal("min_size").unwrap_or(defaults.min_size),
        max_spread: row.decimal("max_spread").unwrap_or(defaults.max_spread),
        stop_loss_threshold: row
            .decimal("stop_loss_threshold")
            .unwrap_or(defaults.stop_loss_threshold),
        take_profit_threshold: row
            .decimal("take_profit_threshold")
            .unwrap_or(defaults.take_profit_threshold),
        volatility_threshold: row
            .decimal("volatility_threshold")
            .unwrap_or(defaults.volatility_threshold),
        spread_threshold: row
            .decimal("spread_threshold")
            .unwrap_or(defaults.spread_threshold),
        sleep_period_hours: row
            .decimal("sleep_period")
            .unwrap_or(defaults.sleep_period_hours),
    };
    Some((name, profile))
}

/// One row of the all-markets database.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRow {
    pub condition_id: MarketId,
    pub question: String,
    pub token1: TokenId,
    pub token2: TokenId,
    pub neg_risk: bool,
    pub volume: Decimal,
    pub liquidity: Decimal,
    pub end_date: String,
    pub active: bool,
}

/// Parse one all-markets row.
pub fn parse_catalog(row: Row<'_>) -> Option<CatalogRow> {
    Some(CatalogRow {
        condition_id: MarketId::new(row.get("condition_id")?),
        question: row.get("question").unwrap_or_default().to_string(),
        token1: TokenId::new(row.get("token1")?),
        token2: TokenId::new(row.get("token2")?),
        neg_risk: row.flag("neg_risk"),
        volume: row.decimal("volume").unwrap_or_default(),
        liquidity: row.decimal("liquidity").unwrap_or_default(),
        end_date: row.get("end_date").unwrap_or_default().to_string(),
        active: row.flag("active"),
    })
}

/// Patch a market's stat cells in place, returning the full value grid to
/// write back, or `None` when the market has no row.
#[must_use]
pub fn patch_stats(
    table: &Table,
    market_id: &MarketId,
    stats: &MarketStats,
) -> Option<Vec<Vec<String>>> {
    let id_col = table.column("condition_id")?;
    let row_index = table
        .rows
        .iter()
        .position(|row| row.get(id_col).map(String::as_str) == Some(market_id.as_str()))?;

    let mut values = table.to_values();
    let data_row = &mut values[row_index + 1];

    let mut set = |column: &str, value: &Option<Decimal>| {
        if let (Some(index), Some(value)) = (table.column(column), value) {
            if data_row.len() <= index {
                data_row.resize(index + 1, String::new());
            }
            data_row[index] = value.to_string();
        }
    };
    set("3_hour", &stats.volatility_3h);
    set("best_bid", &stats.best_bid);
    set("best_ask", &stats.best_ask);

    Some(values)
}
