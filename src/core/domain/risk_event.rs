//! Persisted risk events.
//!
//! One JSON file per market records why trading was paused and until
//! when. The file on disk is the ground truth for the cool-down check,
//! so it survives restarts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::TokenId;
use super::money::Price;

/// A persisted risk event, discriminated by `event_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum RiskEvent {
    /// A stop-loss exit; the market sleeps until `sleep_till`.
    StopLoss {
        time: DateTime<Utc>,
        question: String,
        token_id: TokenId,
        outcome: String,
        exit_price: Price,
        pnl_pct: Decimal,
        sleep_till: DateTime<Utc>,
    },
}

impl RiskEvent {
    /// When trading on the market may resume.
    #[must_use]
    pub fn sleep_till(&self) -> DateTime<Utc> {
        match self {
            RiskEvent::StopLoss { sleep_till, .. } => *sleep_till,
        }
    }

    /// True while the event still blocks trading.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.sleep_till()
    }
}
