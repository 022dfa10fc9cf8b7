//! The `provision` command: write the worksheet templates.

use crate::app::config::Config;
use crate::app::logging;
use crate::core::sheets::{ServiceAccountKey, SheetsClient};
use crate::error::Result;

pub async fn execute() -> Result<()> {
    let config = Config::from_env()?;
    logging::init(&config.log_level)?;

    let key = ServiceAccountKey::from_file(&config.credentials_file)?;
    let spreadsheet_id = SheetsClient::spreadsheet_id_from_url(&config.spreadsheet_url)?;
    let sheets = SheetsClient::new(spreadsheet_id, key);

    sheets.create_template().await?;
    println!("Template worksheets created");
    Ok(())
}
