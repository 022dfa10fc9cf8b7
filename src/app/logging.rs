//! Logging setup: colored console output plus a per-run log file.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Local;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::Result;

const LOG_DIR: &str = "logs";

/// Install the global subscriber. `RUST_LOG` overrides `log_level`.
/// Returns the path of the log file for this run.
pub fn init(log_level: &str) -> Result<PathBuf> {
    fs::create_dir_all(LOG_DIR)?;
    let path = PathBuf::from(LOG_DIR).join(format!(
        "bot_{}.log",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    let file = fs::File::create(&path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .init();

    Ok(path)
}
