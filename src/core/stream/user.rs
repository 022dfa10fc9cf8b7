//! Private user stream: fills, order placements, cancels.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{error, info, warn};

use super::backoff::ReconnectBackoff;
use super::messages::{UserFrame, UserSubscription};
use crate::app::state::BotState;
use crate::core::domain::{RestingOrder, Side, TokenId};
use crate::core::trading::PositionManager;
use crate::error::Result;

/// Reads the authenticated account feed and applies fills and order
/// lifecycle events to shared state.
pub struct UserStream {
    url: String,
    api_key: String,
    state: Arc<BotState>,
    positions: Arc<PositionManager>,
}

impl UserStream {
    #[must_use]
    pub fn new(
        url: String,
        api_key: String,
        state: Arc<BotState>,
        positions: Arc<PositionManager>,
    ) -> Self {
        Self {
            url,
            api_key,
            state,
            positions,
        }
    }

    /// Connect, read, and reconnect forever with exponential backoff.
    pub async fn run(&self) {
        let mut backoff = ReconnectBackoff::new();
        loop {
            match self.session(&mut backoff).await {
                Ok(()) => warn!("User stream disconnected"),
                Err(e) => warn!(error = %e, "User stream failed"),
            }
            self.state.set_user_stream_up(false);

            let delay = backoff.next_delay();
            info!(delay_secs = delay.as_secs(), "Reconnecting user stream");
            sleep(delay).await;
        }
    }

    async fn session(&self, backoff: &mut ReconnectBackoff) -> Result<()> {
        let url = format!("{}?token={}", self.url, self.api_key);
        info!(url = %self.url, "Connecting to user stream");

        let (mut ws, _) = connect_async(&url).await?;
        let frame = serde_json::to_string(&UserSubscription::new())?;
        ws.send(Message::Text(frame)).await?;
        self.state.set_user_stream_up(true);

        let mut first_frame = true;
        while let Some(message) = ws.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    if first_frame {
                        backoff.reset();
                        first_frame = false;
                    }
                    match serde_json::from_str::<UserFrame>(&text) {
                        Ok(frame) => self.dispatch(frame),
                        Err(e) => {
                            warn!(error = %e, raw = %text, "Dropping malformed user frame");
                        }
                    }
                }
                Ok(Message::Ping(payload)) => ws.send(Message::Pong(payload)).await?,
                Ok(Message::Close(frame)) => {
                    info!(frame = ?frame, "User stream closed by server");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "User stream transport error");
                    break;
                }
            }
        }
        Ok(())
    }

    fn dispatch(&self, frame: UserFrame) {
        match frame {
            UserFrame::Fill(fill) => match fill.parsed() {
                Some((token, side, size, price)) => {
                    info!(
                        order_id = %fill.order_id,
                        token = %token,
                        side = %side,
                        size = %size,
                        price = %price,
                        "Order filled"
                    );
                    self.positions.update_position(&token, side, size, price, "fill");
                }
                None => warn!(order_id = %fill.order_id, "Dropping malformed fill frame"),
            },
            UserFrame::Order(order) => match order.parsed() {
                Some((token, side, price, size)) => {
                    info!(
                        order_id = %order.order_id,
                        token = %token,
                        side = %side,
                        size = %size,
                        price = %price,
                        "Order resting"
                    );
                    self.state
                        .set_order(&token, side, RestingOrder::new(price, size));
                }
                None => warn!(order_id = %order.order_id, "Dropping malformed order frame"),
            },
            UserFrame::Cancel(cancel) => {
                info!(order_id = %cancel.order_id, token = %cancel.market, "Order cancelled");
                let token = TokenId::new(cancel.market);
                match cancel.side.as_deref().and_then(|s| s.parse::<Side>().ok()) {
                    Some(side) => self.state.clear_order_side(&token, side),
                    None => self.state.clear_orders(&token),
                }
            }
            UserFrame::Unknown => {}
        }
    }
}
