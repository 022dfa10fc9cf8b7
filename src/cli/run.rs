//! The `run` command: the long-lived trading process.

use tracing::info;

use crate::app::bot::Bot;
use crate::app::config::Config;
use crate::app::logging;
use crate::error::Result;

pub async fn execute() -> Result<()> {
    let config = Config::from_env()?;
    let log_file = logging::init(&config.log_level)?;

    info!(log_file = %log_file.display(), "bidsmith starting");

    let bot = Bot::init(config).await?;
    bot.run().await?;

    info!("bidsmith stopped");
    Ok(())
}
