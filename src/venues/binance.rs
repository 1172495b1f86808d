//! Binance spot aggTrade streams. Subscription is encoded in the combined
//! stream URL, so no subscribe frames are sent.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use super::{Decoded, NormalizeCtx, VenueAdapter};
use crate::errors::{AdapterError, DecodeError};
use crate::models::{Side, Venue};

const PAIRS: &[&str] = &[
    "CHZUSDT", "CHZBTC", "CHZBUSD", "CHZEUR", "CHZTRY",
    "BARUSDT", "PSGUSDT", "JUVUSDT", "ATMAUSDT",
    "ACMUSDT", "CITYUSDT", "OGUSDT", "LAZIOUSDT",
    "PORTOUSDT", "SANTOSUSDT", "ALPINEUSDT", "ASRUSDT",
];

/// Combined stream frame: `{"stream":"chzusdt@aggTrade","data":{...}}`.
#[derive(Deserialize)]
struct StreamFrame {
    #[serde(default)]
    data: Option<AggTrade>,
}

#[derive(Deserialize)]
struct AggTrade {
    /// Pair, e.g. CHZUSDT.
    s: String,
    /// Price as decimal string.
    p: String,
    /// Quantity as decimal string.
    q: String,
    /// True when the buyer was the maker, i.e. a sell-side taker.
    m: bool,
    /// Aggregate trade id.
    a: i64,
}

pub struct BinanceAdapter {
    ctx: NormalizeCtx,
}

impl BinanceAdapter {
    pub fn new(ctx: NormalizeCtx) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl VenueAdapter for BinanceAdapter {
    fn venue(&self) -> Venue {
        Venue::Binance
    }

    async fn endpoint(&self) -> Result<String, AdapterError> {
        let streams: Vec<String> = PAIRS
            .iter()
            .map(|p| format!("{}@aggTrade", p.to_lowercase()))
            .collect();
        Ok(format!(
            "wss://stream.binance.com:9443/stream?streams={}",
            streams.join("/")
        ))
    }

    fn subscribe_frames(&self) -> Vec<String> {
        Vec::new()
    }

    fn decode(&self, payload: &[u8]) -> Result<Decoded, DecodeError> {
        let frame: StreamFrame = serde_json::from_slice(payload)?;
        let Some(trade) = frame.data else {
            return Ok(Decoded::Ignore);
        };

        let price = Decimal::from_str(&trade.p)
            .map_err(|_| DecodeError::number("p", trade.p.clone()))?;
        let quantity = Decimal::from_str(&trade.q)
            .map_err(|_| DecodeError::number("q", trade.q.clone()))?;

        // Buyer-is-maker means the taker sold.
        let side = if trade.m { Side::Sell } else { Side::Buy };

        let event = self.ctx.event(
            Venue::Binance,
            &trade.s,
            side,
            price,
            quantity,
            !trade.m,
            trade.a.to_string(),
            serde_json::Map::new(),
        );
        Ok(Decoded::Trades(vec![event]))
    }
}
