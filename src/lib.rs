//! Bidsmith - automated market maker for binary-outcome prediction markets.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── core/             # Reusable library components
//! │   ├── domain/       # Pure domain types
//! │   ├── exchange/     # CLOB REST client + validating wrapper
//! │   ├── sheets/       # Spreadsheet-backed configuration source
//! │   ├── data/         # In-memory market-data aggregator
//! │   ├── stream/       # Market + user WebSocket streams
//! │   └── trading/      # Position/order/risk managers and the strategy loop
//! └── app/              # Configuration, shared state, orchestration
//! ```

pub mod app;
pub mod cli;
pub mod core;
pub mod error;
