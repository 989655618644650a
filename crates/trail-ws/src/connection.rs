//! Websocket connection lifecycle.
//!
//! Connects, subscribes all configured channels and pumps parsed events
//! into the dispatcher channel. On any transport failure it reconnects
//! after a fixed delay and resubscribes; trailing state on the other
//! side of the channel survives reconnects untouched. A halt token
//! stops the loop at its next checkpoint.

use crate::error::{Result, WsError};
use crate::message::{
    book_channel, kline_channel, parse_message, ping_request, price_channel, subscribe_request,
    trades_channel, WsEvent,
};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Stream configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Websocket endpoint URL.
    pub url: String,
    pub symbol: String,
    /// Kline intervals to subscribe, in minutes; empty disables klines.
    pub intervals: Vec<u32>,
    pub subscribe_book: bool,
    pub subscribe_trades: bool,
    /// Fixed delay before reconnecting.
    pub reconnect_delay_ms: u64,
    /// Application-level ping interval.
    pub heartbeat_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            symbol: String::new(),
            intervals: Vec::new(),
            subscribe_book: false,
            subscribe_trades: false,
            reconnect_delay_ms: 5_000,
            heartbeat_interval_ms: 30_000,
        }
    }
}

impl StreamConfig {
    /// All channels this configuration subscribes to.
    pub fn channels(&self) -> Vec<String> {
        let mut channels = vec![price_channel(&self.symbol)];
        for &interval in &self.intervals {
            if interval > 0 {
                channels.push(kline_channel(&self.symbol, interval));
            }
        }
        if self.subscribe_book {
            channels.push(book_channel(&self.symbol));
        }
        if self.subscribe_trades {
            channels.push(trades_channel(&self.symbol));
        }
        channels
    }
}

/// The market data stream task.
pub struct MarketStream {
    config: StreamConfig,
    event_tx: mpsc::Sender<WsEvent>,
    halt: CancellationToken,
}

impl MarketStream {
    pub fn new(config: StreamConfig, event_tx: mpsc::Sender<WsEvent>, halt: CancellationToken) -> Self {
        Self {
            config,
            event_tx,
            halt,
        }
    }

    /// Run until halted: connect, pump, reconnect on failure.
    pub async fn run(&self) -> Result<()> {
        loop {
            if self.halt.is_cancelled() {
                info!("Halt requested, leaving stream loop");
                return Ok(());
            }

            match self.session().await {
                Ok(()) => {
                    info!("Websocket session ended");
                    return Ok(());
                }
                Err(WsError::ReceiverGone) => {
                    warn!("Dispatcher gone, stopping stream");
                    return Ok(());
                }
                Err(e) => {
                    error!(error = %e, "Websocket session failed");
                }
            }

            if self.halt.is_cancelled() {
                return Ok(());
            }
            info!(
                delay_ms = self.config.reconnect_delay_ms,
                "Reconnecting to exchange"
            );
            tokio::select! {
                () = tokio::time::sleep(Duration::from_millis(self.config.reconnect_delay_ms)) => {}
                () = self.halt.cancelled() => return Ok(()),
            }
        }
    }

    /// One connected session: subscribe, then pump until failure or halt.
    async fn session(&self) -> Result<()> {
        info!(url = %self.config.url, "Connecting to exchange websocket");
        let (ws_stream, _response) = connect_async(&self.config.url).await?;
        let (mut write, mut read) = ws_stream.split();

        let channels = self.config.channels();
        write
            .send(Message::Text(subscribe_request(&channels).into()))
            .await?;
        info!(?channels, "Subscribed to channels");

        let mut heartbeat =
            tokio::time::interval(Duration::from_millis(self.config.heartbeat_interval_ms));
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        heartbeat.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                () = self.halt.cancelled() => {
                    info!("Halt requested, closing websocket");
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }

                _ = heartbeat.tick() => {
                    write.send(Message::Text(ping_request().into())).await?;
                    debug!("Websocket heartbeat sent to exchange");
                }

                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            match parse_message(&text) {
                                Ok(Some(event)) => self.forward(event).await?,
                                Ok(None) => {}
                                Err(e) => {
                                    // One bad frame must not kill the stream.
                                    warn!(error = %e, "Undecodable websocket frame");
                                }
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            write.send(Message::Pong(payload)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame
                                .map(|f| f.reason.to_string())
                                .unwrap_or_else(|| "no reason".to_string());
                            return Err(WsError::Closed { reason });
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            return Err(WsError::Closed {
                                reason: "stream ended".to_string(),
                            });
                        }
                    }
                }
            }
        }
    }

    async fn forward(&self, event: WsEvent) -> Result<()> {
        if let WsEvent::Unhandled { ref channel } = event {
            debug!(channel, "Notification on unhandled channel");
            return Ok(());
        }
        self.event_tx
            .send(event)
            .await
            .map_err(|_| WsError::ReceiverGone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_list_respects_toggles() {
        let config = StreamConfig {
            symbol: "BTC_USDC".to_string(),
            intervals: vec![1, 0, 5],
            subscribe_book: true,
            subscribe_trades: false,
            ..Default::default()
        };
        let channels = config.channels();
        assert_eq!(
            channels,
            vec![
                "deribit_price_index.btc_usdc",
                "chart.trades.BTC_USDC.1",
                "chart.trades.BTC_USDC.5",
                "book.BTC_USDC.100ms",
            ]
        );
    }

    #[test]
    fn test_default_reconnect_delay_is_fixed_five_seconds() {
        assert_eq!(StreamConfig::default().reconnect_delay_ms, 5_000);
    }
}
