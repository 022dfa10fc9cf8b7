//! CLOB client: HTTP binding plus the validating wrapper.
//!
//! [`HttpClobApi`] is a thin REST binding in exchange units.
//! [`ExchangeClient`] is what the trading code calls: it validates and
//! quantizes inputs, tags in-flight markers in shared state around every
//! mutating call, retries transient failures, and never lets an error
//! escape — failed calls collapse to neutral results.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use rust_decimal_macros::dec;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use super::types::{
    AccountPosition, ApiBook, ApiOrder, ApiPosition, ClobApi, OpenOrder, OrderArgs,
    OrderDescriptor,
};
use crate::app::state::{op_id, BotState, OpKind};
use crate::core::domain::{MarketId, OrderBook, Price, PriceLevel, Side, TokenId, Volume};
use crate::core::num::round_down;
use crate::core::retry::{retry, RetryPolicy};
use crate::error::Result;

/// Lowest placeable price.
pub const MIN_PRICE: Price = dec!(0.01);
/// Highest placeable price.
pub const MAX_PRICE: Price = dec!(0.99);
/// Smallest placeable size.
pub const MIN_ORDER_SIZE: Volume = dec!(1.0);

const PRICE_DECIMALS: u32 = 4;
const SIZE_DECIMALS: u32 = 2;

/// Why an order was refused before reaching the exchange.
#[derive(Debug, Error, PartialEq)]
enum OrderRejection {
    #[error("price {0} outside valid range ({MIN_PRICE}-{MAX_PRICE})")]
    PriceOutOfBand(Price),
    #[error("size {0} too small (minimum {MIN_ORDER_SIZE})")]
    SizeTooSmall(Volume),
}

/// HTTP implementation of [`ClobApi`].
pub struct HttpClobApi {
    http: reqwest::Client,
    base_url: Url,
    wallet_address: String,
    signing_key: String,
}

impl HttpClobApi {
    pub fn new(base_url: &str, wallet_address: String, signing_key: String) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: Url::parse(base_url)?,
            wallet_address,
            signing_key,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }
}

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    token_id: &'a str,
    side: &'a str,
    price: String,
    size: String,
    neg_risk: bool,
    order_type: &'static str,
}

#[derive(Serialize)]
struct MergeBody<'a> {
    condition_id: &'a str,
    amount: u64,
    neg_risk: bool,
}

#[async_trait]
impl ClobApi for HttpClobApi {
    async fn create_order(&self, args: &OrderArgs) -> Result<OrderDescriptor> {
        let body = CreateOrderBody {
            token_id: args.token_id.as_str(),
            side: args.side.as_str(),
            price: args.price.to_string(),
            size: args.size.to_string(),
            neg_risk: args.neg_risk,
            order_type: "GTC",
        };
        let response = self
            .http
            .post(self.endpoint("order")?)
            .bearer_auth(&self.signing_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        self.http
            .delete(self.endpoint(&format!("order/{order_id}"))?)
            .bearer_auth(&self.signing_key)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn open_orders(&self) -> Result<Vec<ApiOrder>> {
        let mut url = self.endpoint("orders")?;
        url.query_pairs_mut()
            .append_pair("owner", &self.wallet_address);
        Ok(self.http.get(url).send().await?.error_for_status()?.json().await?)
    }

    async fn positions(&self) -> Result<Vec<ApiPosition>> {
        let mut url = self.endpoint("positions")?;
        url.query_pairs_mut()
            .append_pair("user", &self.wallet_address);
        Ok(self.http.get(url).send().await?.error_for_status()?.json().await?)
    }

    async fn order_book(&self, token: &TokenId) -> Result<ApiBook> {
        let mut url = self.endpoint("book")?;
        url.query_pairs_mut().append_pair("token_id", token.as_str());
        Ok(self.http.get(url).send().await?.error_for_status()?.json().await?)
    }

    async fn merge_positions(
        &self,
        amount_base: u64,
        condition_id: &MarketId,
        neg_risk: bool,
    ) -> Result<()> {
        let body = MergeBody {
            condition_id: condition_id.as_str(),
            amount: amount_base,
            neg_risk,
        };
        self.http
            .post(self.endpoint("merge")?)
            .bearer_auth(&self.signing_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Validating, retrying wrapper over a [`ClobApi`].
pub struct ExchangeClient {
    api: Arc<dyn ClobApi>,
    state: Arc<BotState>,
    retry: RetryPolicy,
}

impl ExchangeClient {
    pub fn new(api: Arc<dyn ClobApi>, state: Arc<BotState>) -> Self {
        Self {
            api,
            state,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry schedule (tests use millisecond delays).
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn validate(price: Price, size: Volume) -> std::result::Result<(), OrderRejection> {
        if price < MIN_PRICE || price > MAX_PRICE {
            return Err(OrderRejection::PriceOutOfBand(price));
        }
        if size < MIN_ORDER_SIZE {
            return Err(OrderRejection::SizeTooSmall(size));
        }
        Ok(())
    }

    /// Place an order. Validation failures and transport failures both
    /// collapse to `None`; only an accepted order returns a descriptor.
    pub async fn create_order(
        &self,
        token: &TokenId,
        side: Side,
        price: Price,
        size: Volume,
        neg_risk: bool,
    ) -> Option<OrderDescriptor> {
        if let Err(rejection) = Self::validate(price, size) {
            warn!(token = %token, side = %side, %rejection, "Order rejected before submission");
            return None;
        }

        let args = OrderArgs {
            token_id: token.clone(),
            side,
            price: price.round_dp(PRICE_DECIMALS),
            size: round_down(size, SIZE_DECIMALS),
            neg_risk,
        };

        info!(
            token = %token,
            side = %side,
            price = %args.price,
            size = %args.size,
            "Creating order"
        );

        let marker = op_id(token, side.into());
        self.state.begin_op(side.into(), marker.clone());
        let result = retry(self.retry, "create_order", || self.api.create_order(&args)).await;
        self.state.end_op(side.into(), &marker);

        match result {
            Ok(descriptor) => {
                info!(order_id = %descriptor.order_id, "Order created");
                Some(descriptor)
            }
            Err(e) => {
                error!(token = %token, side = %side, error = %e, "Failed to create order");
                None
            }
        }
    }

    /// Cancel one order by id.
    pub async fn cancel_order(&self, order_id: &str) -> bool {
        let result = retry(self.retry, "cancel_order", || {
            self.api.cancel_order(order_id)
        })
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                error!(order_id, error = %e, "Failed to cancel order");
                false
            }
        }
    }

    /// Cancel every open order on a token: list, then cancel each.
    pub async fn cancel_by_asset(&self, token: &TokenId) -> bool {
        let marker = op_id(token, OpKind::Cancel);
        self.state.begin_op(OpKind::Cancel, marker.clone());

        let orders = self.open_orders(Some(token)).await;
        let mut all_cancelled = true;
        for order in &orders {
            all_cancelled &= self.cancel_order(&order.id).await;
        }

        self.state.end_op(OpKind::Cancel, &marker);

        if orders.is_empty() {
            info!(token = %token, "No orders to cancel");
        } else {
            info!(token = %token, count = orders.len(), "Cancelled orders for token");
        }
        all_cancelled
    }

    /// Open orders, normalized, optionally filtered by token. Empty on
    /// failure.
    pub async fn open_orders(&self, token: Option<&TokenId>) -> Vec<OpenOrder> {
        let result = retry(self.retry, "open_orders", || self.api.open_orders()).await;
        match result {
            Ok(orders) => orders
                .iter()
                .filter_map(ApiOrder::normalize)
                .filter(|o| token.map_or(true, |t| o.token_id == *t))
                .collect(),
            Err(e) => {
                error!(error = %e, "Failed to fetch open orders");
                Vec::new()
            }
        }
    }

    /// Account positions, normalized. Empty on failure.
    pub async fn positions(&self) -> Vec<AccountPosition> {
        let result = retry(self.retry, "positions", || self.api.positions()).await;
        match result {
            Ok(positions) => positions.iter().filter_map(ApiPosition::normalize).collect(),
            Err(e) => {
                error!(error = %e, "Failed to fetch positions");
                Vec::new()
            }
        }
    }

    /// Book snapshot for a token; an empty book on failure.
    pub async fn order_book(&self, token: &TokenId) -> OrderBook {
        let result = retry(self.retry, "order_book", || self.api.order_book(token)).await;
        let raw = match result {
            Ok(book) => book,
            Err(e) => {
                error!(token = %token, error = %e, "Failed to fetch order book");
                ApiBook::default()
            }
        };

        let parse = |levels: &[super::types::RawLevel]| {
            levels
                .iter()
                .filter_map(|l| Some(PriceLevel::new(l.price.parse().ok()?, l.size.parse().ok()?)))
                .collect()
        };
        OrderBook::from_unsorted(token.clone(), parse(&raw.bids), parse(&raw.asks))
    }

    /// Merge opposing holdings back into collateral. `amount_base` is in
    /// base units (x 1e6).
    pub async fn merge_positions(
        &self,
        amount_base: u64,
        condition_id: &MarketId,
        neg_risk: bool,
    ) -> bool {
        info!(
            market = %condition_id,
            amount = amount_base,
            "Merging positions"
        );
        let result = retry(self.retry, "merge_positions", || {
            self.api.merge_positions(amount_base, condition_id, neg_risk)
        })
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                error!(market = %condition_id, error = %e, "Failed to merge positions");
                false
            }
        }
    }
}
