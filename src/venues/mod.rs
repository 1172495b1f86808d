//! Exchange adapters. Each venue implements [`VenueAdapter`]: it names its
//! endpoint, hands over subscription frames, and decodes raw frames into
//! canonical [`TradeEvent`]s. The shared [`drive`] loop owns the transport
//! so per-venue code is almost entirely parsing.

pub mod binance;
pub mod bybit;
pub mod coinbase;
pub mod gateio;
pub mod htx;
pub mod kraken;
pub mod kucoin;
pub mod mercadobitcoin;
pub mod mexc;
pub mod okx;
pub mod upbit;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::interval;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::config::AppConfig;
use crate::errors::{AdapterError, DecodeError};
use crate::ingestion::rates::RateBoard;
use crate::ingestion::supervisor::ConnState;
use crate::models::{Side, TradeEvent, Venue};
use crate::symbols::SymbolTable;

/// Transport ping cadence used when a venue has no app-level keepalive.
const PING_INTERVAL: Duration = Duration::from_secs(25);

/// Max bytes of a bad frame echoed into logs.
const LOG_SAMPLE_BYTES: usize = 200;

/// App-level keepalive frame some venues require instead of transport pings.
#[derive(Debug, Clone)]
pub struct Keepalive {
    pub interval: Duration,
    pub frame: String,
}

/// Outcome of decoding one raw frame.
#[derive(Debug)]
pub enum Decoded {
    /// Zero or more normalized trades.
    Trades(Vec<TradeEvent>),
    /// A frame the server expects answered verbatim (HTX ping, for one).
    Reply(String),
    /// Acks, heartbeats, snapshots: drop silently.
    Ignore,
}

#[async_trait]
pub trait VenueAdapter: Send + Sync {
    fn venue(&self) -> Venue;

    /// WebSocket URL. Async because some venues (KuCoin) negotiate an
    /// ephemeral endpoint over HTTP first.
    async fn endpoint(&self) -> Result<String, AdapterError>;

    /// Frames sent right after connecting. May be empty when subscription
    /// is encoded in the URL (Binance).
    fn subscribe_frames(&self) -> Vec<String>;

    fn keepalive(&self) -> Option<Keepalive> {
        None
    }

    fn decode(&self, payload: &[u8]) -> Result<Decoded, DecodeError>;

    /// One connection lifetime. Returning `Err` (or `Ok` after shutdown)
    /// hands control back to the supervisor, which owns restart policy.
    async fn run(
        &self,
        tx: mpsc::Sender<TradeEvent>,
        shutdown: watch::Receiver<bool>,
        state: watch::Sender<ConnState>,
    ) -> Result<(), AdapterError> {
        drive(self, tx, shutdown, state).await
    }
}

/// Shared connect/subscribe/read loop.
///
/// Decode failures are logged and skipped; only transport-level problems
/// end the connection.
pub async fn drive(
    adapter: &(impl VenueAdapter + ?Sized),
    tx: mpsc::Sender<TradeEvent>,
    mut shutdown: watch::Receiver<bool>,
    state: watch::Sender<ConnState>,
) -> Result<(), AdapterError> {
    let venue = adapter.venue();

    let _ = state.send(ConnState::Connecting);
    let url = adapter.endpoint().await?;
    tracing::info!(venue = %venue, url = %url, "connecting");
    let (ws_stream, _response) = connect_async(&url).await?;
    let (mut write, mut read) = ws_stream.split();

    for frame in adapter.subscribe_frames() {
        write.send(Message::Text(frame.into())).await?;
    }
    let _ = state.send(ConnState::Subscribed);
    tracing::info!(venue = %venue, "subscribed");

    let keepalive = adapter.keepalive();
    let mut keepalive_timer = interval(
        keepalive
            .as_ref()
            .map(|k| k.interval)
            .unwrap_or(PING_INTERVAL),
    );
    keepalive_timer.tick().await; // consume the first immediate tick
    let mut streaming = false;
    let mark_streaming = |streaming: &mut bool| {
        if !*streaming {
            *streaming = true;
            let _ = state.send(ConnState::Streaming);
        }
    };

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        mark_streaming(&mut streaming);
                        handle_payload(adapter, text.as_bytes(), &mut write, &tx).await?;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        mark_streaming(&mut streaming);
                        handle_payload(adapter, &data, &mut write, &tx).await?;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::warn!(venue = %venue, "server sent close frame");
                        return Err(AdapterError::ConnectionClosed);
                    }
                    Some(Ok(_)) => {} // Pong, Frame
                    Some(Err(e)) => return Err(AdapterError::Ws(e)),
                    None => return Err(AdapterError::StreamEnded),
                }
            }
            _ = keepalive_timer.tick() => {
                match &keepalive {
                    Some(k) => write.send(Message::Text(k.frame.clone().into())).await?,
                    None => write.send(Message::Ping(vec![].into())).await?,
                }
            }
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    tracing::info!(venue = %venue, "adapter shutting down");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_payload<W>(
    adapter: &(impl VenueAdapter + ?Sized),
    payload: &[u8],
    write: &mut W,
    tx: &mpsc::Sender<TradeEvent>,
) -> Result<(), AdapterError>
where
    W: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    match adapter.decode(payload) {
        Ok(Decoded::Trades(events)) => {
            for event in events {
                if tx.send(event).await.is_err() {
                    return Err(AdapterError::Other(anyhow::anyhow!(
                        "event channel closed"
                    )));
                }
            }
        }
        Ok(Decoded::Reply(frame)) => {
            write.send(Message::Text(frame.into())).await?;
        }
        Ok(Decoded::Ignore) => {}
        Err(e) => {
            metrics::counter!("decode_failures_total", "venue" => adapter.venue().as_str())
                .increment(1);
            let sample = String::from_utf8_lossy(&payload[..payload.len().min(LOG_SAMPLE_BYTES)]);
            tracing::warn!(
                venue = %adapter.venue(),
                error = %e,
                sample = %sample,
                "frame decode failed, skipping"
            );
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Normalization context shared by every adapter
// ---------------------------------------------------------------------------

/// Symbol table plus rate snapshot access, cloned into each adapter.
#[derive(Clone)]
pub struct NormalizeCtx {
    pub symbols: Arc<SymbolTable>,
    pub rates: RateBoard,
}

impl NormalizeCtx {
    pub fn new(symbols: Arc<SymbolTable>, rates: RateBoard) -> Self {
        Self { symbols, rates }
    }

    /// Build the canonical event: resolve the token, compute the notional in
    /// the pair's quote currency, convert to USD.
    #[allow(clippy::too_many_arguments)]
    pub fn event(
        &self,
        venue: Venue,
        raw_pair: &str,
        side: Side,
        price: Decimal,
        quantity: Decimal,
        is_aggressor: bool,
        venue_trade_id: String,
        extra: serde_json::Map<String, serde_json::Value>,
    ) -> TradeEvent {
        let token_symbol = self.symbols.normalize(venue, raw_pair).map(str::to_string);
        let quote = self.symbols.quote(raw_pair);
        let value_usd = self.rates.to_usd(price * quantity, quote);

        TradeEvent {
            venue,
            token_symbol,
            raw_pair: raw_pair.to_string(),
            side,
            price,
            quantity,
            value_usd,
            is_aggressor,
            venue_trade_id,
            observed_at: Utc::now(),
            extra,
        }
    }
}

/// Instantiate one adapter per configured streaming venue.
pub fn build_adapters(config: &AppConfig, ctx: NormalizeCtx) -> Vec<Arc<dyn VenueAdapter>> {
    config
        .venues
        .iter()
        .filter(|v| !v.is_dex())
        .map(|venue| -> Arc<dyn VenueAdapter> {
            match venue {
                Venue::Binance => Arc::new(binance::BinanceAdapter::new(ctx.clone())),
                Venue::Okx => Arc::new(okx::OkxAdapter::new(ctx.clone())),
                Venue::Htx => Arc::new(htx::HtxAdapter::new(ctx.clone())),
                Venue::Kucoin => Arc::new(kucoin::KucoinAdapter::new(ctx.clone())),
                Venue::Bybit => Arc::new(bybit::BybitAdapter::new(ctx.clone())),
                Venue::Gateio => Arc::new(gateio::GateioAdapter::new(ctx.clone())),
                Venue::Mexc => Arc::new(mexc::MexcAdapter::new(ctx.clone())),
                Venue::Upbit => Arc::new(upbit::UpbitAdapter::new(ctx.clone())),
                Venue::Kraken => Arc::new(kraken::KrakenAdapter::new(ctx.clone())),
                Venue::Coinbase => Arc::new(coinbase::CoinbaseAdapter::new(ctx.clone())),
                Venue::MercadoBitcoin => {
                    Arc::new(mercadobitcoin::MercadoBitcoinAdapter::new(ctx.clone()))
                }
                Venue::FanxDex => unreachable!("dex venues are filtered out above"),
            }
        })
        .collect()
}
