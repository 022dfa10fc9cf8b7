//! Public market stream: book snapshots and trade prints.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::backoff::ReconnectBackoff;
use super::messages::{BookSubscription, MarketFrame};
use crate::app::state::BotState;
use crate::core::data::MarketData;
use crate::core::domain::TokenId;
use crate::core::trading::Strategy;
use crate::error::Result;

/// Reads the public book/trade feed and keeps the aggregator current.
/// Each book update triggers a trading pass on the owning market.
pub struct MarketStream {
    url: String,
    state: Arc<BotState>,
    data: Arc<MarketData>,
    strategy: Arc<Strategy>,
}

impl MarketStream {
    #[must_use]
    pub fn new(
        url: String,
        state: Arc<BotState>,
        data: Arc<MarketData>,
        strategy: Arc<Strategy>,
    ) -> Self {
        Self {
            url,
            state,
            data,
            strategy,
        }
    }

    /// Connect, read, and reconnect forever with exponential backoff.
    pub async fn run(&self) {
        let mut backoff = ReconnectBackoff::new();
        loop {
            match self.session(&mut backoff).await {
                Ok(()) => warn!("Market stream disconnected"),
                Err(e) => warn!(error = %e, "Market stream failed"),
            }
            self.state.set_market_stream_up(false);

            let delay = backoff.next_delay();
            info!(delay_secs = delay.as_secs(), "Reconnecting market stream");
            sleep(delay).await;
        }
    }

    /// One connection lifetime: subscribe, then read until close/error.
    async fn session(&self, backoff: &mut ReconnectBackoff) -> Result<()> {
        let tokens = self.state.watched_tokens();
        info!(url = %self.url, tokens = tokens.len(), "Connecting to market stream");

        let (mut ws, _) = connect_async(&self.url).await?;
        for token in &tokens {
            let frame = serde_json::to_string(&BookSubscription::new(token))?;
            ws.send(Message::Text(frame)).await?;
            debug!(token = %token, "Subscribed to book channel");
        }
        self.state.set_market_stream_up(true);

        let mut first_frame = true;
        while let Some(message) = ws.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    if first_frame {
                        backoff.reset();
                        first_frame = false;
                    }
                    match serde_json::from_str::<MarketFrame>(&text) {
                        Ok(frame) => self.dispatch(frame),
                        Err(e) => {
                            warn!(error = %e, raw = %text, "Dropping malformed market frame");
                        }
                    }
                }
                Ok(Message::Ping(payload)) => ws.send(Message::Pong(payload)).await?,
                Ok(Message::Close(frame)) => {
                    info!(frame = ?frame, "Market stream closed by server");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Market stream transport error");
                    break;
                }
            }
        }
        Ok(())
    }

    fn dispatch(&self, frame: MarketFrame) {
        match frame {
            MarketFrame::Book(book) => {
                let token = TokenId::new(book.market.clone());
                self.data.update_book(book.to_order_book());
                debug!(token = %token, "Order book updated");

                if let Some(market) = self.state.market_for_token(&token) {
                    self.strategy.spawn_pass(market.condition_id);
                }
            }
            MarketFrame::Trade(trade) => match trade.parsed() {
                Some((token, price, size, side)) => {
                    debug!(token = %token, side = %side, size = %size, price = %price, "Trade");
                    self.data.record_trade(&token, price, size, side);
                }
                None => warn!(token = %trade.market, "Dropping malformed trade frame"),
            },
            MarketFrame::Unknown => {}
        }
    }
}
