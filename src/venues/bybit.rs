//! Bybit v5 spot public trade stream.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;

use super::{Decoded, NormalizeCtx, VenueAdapter};
use crate::errors::{AdapterError, DecodeError};
use crate::models::{Side, Venue};

const WS_URL: &str = "wss://stream.bybit.com/v5/public/spot";

const PAIRS: &[&str] = &[
    "CHZUSDT", "BARUSDT", "PSGUSDT", "JUVUSDT",
    "ACMUSDT", "CITYUSDT", "ATMUSDT",
];

#[derive(Deserialize)]
struct PushFrame {
    #[serde(default)]
    data: Vec<BybitTrade>,
}

#[derive(Deserialize)]
struct BybitTrade {
    s: String,
    p: String,
    v: String,
    /// "Buy" or "Sell", taker side.
    #[serde(rename = "S")]
    side: String,
    i: String,
}

pub struct BybitAdapter {
    ctx: NormalizeCtx,
}

impl BybitAdapter {
    pub fn new(ctx: NormalizeCtx) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl VenueAdapter for BybitAdapter {
    fn venue(&self) -> Venue {
        Venue::Bybit
    }

    async fn endpoint(&self) -> Result<String, AdapterError> {
        Ok(WS_URL.to_string())
    }

    fn subscribe_frames(&self) -> Vec<String> {
        let args: Vec<String> = PAIRS.iter().map(|p| format!("publicTrade.{p}")).collect();
        vec![json!({"op": "subscribe", "args": args}).to_string()]
    }

    fn decode(&self, payload: &[u8]) -> Result<Decoded, DecodeError> {
        let frame: PushFrame = serde_json::from_slice(payload)?;
        if frame.data.is_empty() {
            return Ok(Decoded::Ignore);
        }

        let mut events = Vec::with_capacity(frame.data.len());
        for trade in frame.data {
            let price = Decimal::from_str(&trade.p)
                .map_err(|_| DecodeError::number("p", trade.p.clone()))?;
            let quantity = Decimal::from_str(&trade.v)
                .map_err(|_| DecodeError::number("v", trade.v.clone()))?;
            let side = Side::from_api_str(&trade.side)
                .ok_or_else(|| DecodeError::shape(format!("bad side {:?}", trade.side)))?;

            events.push(self.ctx.event(
                Venue::Bybit,
                &trade.s,
                side,
                price,
                quantity,
                true,
                trade.i,
                serde_json::Map::new(),
            ));
        }
        Ok(Decoded::Trades(events))
    }
}
