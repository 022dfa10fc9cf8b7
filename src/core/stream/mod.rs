//! Long-lived WebSocket streams.
//!
//! Two independent connections with the same shape: the public market
//! stream (books and trades) and the private user stream (fills, order
//! placements, cancels). Each reconnects forever with exponential
//! backoff; a single malformed frame is dropped, not fatal.

mod backoff;
mod market;
mod messages;
mod user;

pub use backoff::ReconnectBackoff;
pub use market::MarketStream;
pub use messages::{
    BookFrame, BookSubscription, CancelFrame, FillFrame, MarketFrame, OrderFrame, TradeFrame,
    UserFrame, UserSubscription,
};
pub use user::UserStream;
