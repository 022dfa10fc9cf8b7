//! The `check` command: validate configuration and reach the
//! spreadsheet without touching the exchange.

use crate::app::config::Config;
use crate::app::logging;
use crate::core::sheets::{ServiceAccountKey, SheetsClient};
use crate::error::Result;

pub async fn execute() -> Result<()> {
    let config = Config::from_env()?;
    logging::init(&config.log_level)?;
    println!("Configuration OK");

    let key = ServiceAccountKey::from_file(&config.credentials_file)?;
    let spreadsheet_id = SheetsClient::spreadsheet_id_from_url(&config.spreadsheet_url)?;
    let sheets = SheetsClient::new(spreadsheet_id, key);

    let markets = sheets.selected_markets().await?;
    let profiles = sheets.hyperparameters().await?;
    let catalog = sheets.all_markets().await?;

    println!("Selected markets: {}", markets.len());
    println!("Parameter profiles: {}", profiles.len());
    println!("All-markets rows: {}", catalog.len());

    for market in &markets {
        let profile_known = profiles.contains_key(&market.param_type);
        println!(
            "  {} [{}] profile={}{}",
            market.condition_id,
            if market.enabled { "enabled" } else { "disabled" },
            market.param_type,
            if profile_known { "" } else { " (MISSING)" },
        );
    }

    Ok(())
}
