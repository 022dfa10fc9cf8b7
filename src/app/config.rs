//! Environment-driven configuration.
//!
//! Validation runs once at boot and reports every missing or invalid
//! item in a single aggregated error, so a misconfigured deployment
//! fails with the full list instead of one item at a time.

use std::path::{Path, PathBuf};

use rust_decimal::Decimal;

use crate::core::domain::Price;
use crate::error::{Error, Result};

const DEFAULT_API_URL: &str = "https://clob.polymarket.com";
const DEFAULT_WS_URL: &str = "wss://ws-subscriptions-clob.polymarket.com/ws";
const DEFAULT_CHAIN_ID: u64 = 137;
const DEFAULT_CREDENTIALS_FILE: &str = "service-account.json";
const DEFAULT_MAX_POSITION_SIZE: &str = "1000";
const DEFAULT_MAX_TOTAL_EXPOSURE: &str = "5000";

/// Runtime configuration, resolved from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Signing key for the exchange (`PK`).
    pub private_key: String,
    /// Wallet address (`BROWSER_ADDRESS`).
    pub wallet_address: String,
    /// URL of the configuration spreadsheet (`SPREADSHEET_URL`).
    pub spreadsheet_url: String,
    /// Service-account credentials file (`GOOGLE_CREDENTIALS_FILE`).
    pub credentials_file: PathBuf,
    /// REST endpoint (`POLYMARKET_API_URL`).
    pub api_url: String,
    /// WebSocket endpoint base (`WEBSOCKET_URL`).
    pub ws_url: String,
    /// API key carried by the user stream (`POLYMARKET_API_KEY`).
    pub api_key: String,
    /// Chain id (`CHAIN_ID`).
    pub chain_id: u64,
    /// Cap on any single-token position (`MAX_POSITION_SIZE`).
    pub max_position_size: Price,
    /// Cap on summed cost bases (`MAX_TOTAL_EXPOSURE`).
    pub max_total_exposure: Price,
    /// Log level (`LOG_LEVEL`).
    pub log_level: String,
}

impl Config {
    /// Resolve from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary key lookup (the environment in
    /// production, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut errors = Vec::new();

        let required = |errors: &mut Vec<String>, key: &str, what: &str| {
            match lookup(key).filter(|v| !v.is_empty()) {
                Some(value) => value,
                None => {
                    errors.push(format!("{key} ({what}) is required"));
                    String::new()
                }
            }
        };

        let private_key = required(&mut errors, "PK", "private key");
        let wallet_address = required(&mut errors, "BROWSER_ADDRESS", "wallet address");
        let spreadsheet_url = required(&mut errors, "SPREADSHEET_URL", "spreadsheet URL");

        let credentials_file = PathBuf::from(
            lookup("GOOGLE_CREDENTIALS_FILE")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_CREDENTIALS_FILE.to_string()),
        );
        if !credentials_file.exists() {
            errors.push(format!(
                "Google credentials file not found: {}",
                credentials_file.display()
            ));
        }

        let chain_id = match lookup("CHAIN_ID") {
            Some(raw) => match raw.parse() {
                Ok(id) => id,
                Err(_) => {
                    errors.push(format!("CHAIN_ID is not a number: {raw}"));
                    DEFAULT_CHAIN_ID
                }
            },
            None => DEFAULT_CHAIN_ID,
        };

        let raw_position_cap =
            lookup("MAX_POSITION_SIZE").unwrap_or_else(|| DEFAULT_MAX_POSITION_SIZE.to_string());
        let max_position_size = match raw_position_cap.parse::<Decimal>() {
            Ok(cap) => cap,
            Err(_) => {
                errors.push(format!("MAX_POSITION_SIZE is not a number: {raw_position_cap}"));
                Decimal::ZERO
            }
        };

        let raw_exposure =
            lookup("MAX_TOTAL_EXPOSURE").unwrap_or_else(|| DEFAULT_MAX_TOTAL_EXPOSURE.to_string());
        let max_total_exposure = match raw_exposure.parse::<Decimal>() {
            Ok(cap) => cap,
            Err(_) => {
                errors.push(format!("MAX_TOTAL_EXPOSURE is not a number: {raw_exposure}"));
                Decimal::ZERO
            }
        };

        if !errors.is_empty() {
            return Err(Error::Config(format!(
                "Configuration errors:\n{}",
                errors
                    .iter()
                    .map(|e| format!("  - {e}"))
                    .collect::<Vec<_>>()
                    .join("\n")
            )));
        }

        Ok(Self {
            private_key,
            wallet_address,
            spreadsheet_url,
            credentials_file,
            api_url: lookup("POLYMARKET_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            ws_url: lookup("WEBSOCKET_URL").unwrap_or_else(|| DEFAULT_WS_URL.to_string()),
            api_key: lookup("POLYMARKET_API_KEY").unwrap_or_default(),
            chain_id,
            max_position_size,
            max_total_exposure,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Endpoint of the public market stream.
    #[must_use]
    pub fn market_ws_url(&self) -> String {
        format!("{}/market", self.ws_url)
    }

    /// Endpoint of the private user stream.
    #[must_use]
    pub fn user_ws_url(&self) -> String {
        format!("{}/user", self.ws_url)
    }

    /// Directory where risk-event files live.
    #[must_use]
    pub fn positions_dir(&self) -> &Path {
        Path::new("positions")
    }
}

/// Convenience for tests and tooling: lookup backed by key/value pairs.
#[must_use]
pub fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
    move |key| {
        pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| (*v).to_string())
    }
}
