//! Exchange access: the raw CLOB REST binding and the validating wrapper
//! the trading code talks to.

mod client;
mod types;

pub use client::{ExchangeClient, HttpClobApi, MAX_PRICE, MIN_ORDER_SIZE, MIN_PRICE};
pub use types::{
    AccountPosition, ApiBook, ApiOrder, ApiPosition, ClobApi, OpenOrder, OrderArgs,
    OrderDescriptor, RawLevel,
};
