//! OKX public trades channel.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;

use super::{Decoded, NormalizeCtx, VenueAdapter};
use crate::errors::{AdapterError, DecodeError};
use crate::models::{Side, Venue};

const WS_URL: &str = "wss://ws.okx.com:8443/ws/v5/public";

const PAIRS: &[&str] = &[
    "CHZ-USDT", "CHZ-USDC", "CHZ-EUR",
    "BAR-USDT", "PSG-USDT", "JUV-USDT", "ATM-USDT",
    "ACM-USDT", "CITY-USDT", "OG-USDT", "LAZIO-USDT",
    "PORTO-USDT", "SANTOS-USDT",
];

#[derive(Deserialize)]
struct PushFrame {
    /// Present on subscription acks and errors, absent on data pushes.
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    arg: Option<PushArg>,
    #[serde(default)]
    data: Vec<OkxTrade>,
}

#[derive(Deserialize)]
struct PushArg {
    #[serde(rename = "instId")]
    inst_id: String,
}

#[derive(Deserialize)]
struct OkxTrade {
    px: String,
    sz: String,
    /// "buy" or "sell", taker side.
    side: String,
    #[serde(rename = "tradeId")]
    trade_id: String,
}

pub struct OkxAdapter {
    ctx: NormalizeCtx,
}

impl OkxAdapter {
    pub fn new(ctx: NormalizeCtx) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl VenueAdapter for OkxAdapter {
    fn venue(&self) -> Venue {
        Venue::Okx
    }

    async fn endpoint(&self) -> Result<String, AdapterError> {
        Ok(WS_URL.to_string())
    }

    fn subscribe_frames(&self) -> Vec<String> {
        let args: Vec<_> = PAIRS
            .iter()
            .map(|pair| json!({"channel": "trades", "instId": pair}))
            .collect();
        vec![json!({"op": "subscribe", "args": args}).to_string()]
    }

    fn decode(&self, payload: &[u8]) -> Result<Decoded, DecodeError> {
        let frame: PushFrame = serde_json::from_slice(payload)?;
        if frame.event.is_some() {
            // Subscription ack or error notice.
            return Ok(Decoded::Ignore);
        }
        let Some(arg) = frame.arg else {
            return Ok(Decoded::Ignore);
        };

        let mut events = Vec::with_capacity(frame.data.len());
        for trade in frame.data {
            let price = Decimal::from_str(&trade.px)
                .map_err(|_| DecodeError::number("px", trade.px.clone()))?;
            let quantity = Decimal::from_str(&trade.sz)
                .map_err(|_| DecodeError::number("sz", trade.sz.clone()))?;
            let side = Side::from_api_str(&trade.side)
                .ok_or_else(|| DecodeError::shape(format!("bad side {:?}", trade.side)))?;

            events.push(self.ctx.event(
                Venue::Okx,
                &arg.inst_id,
                side,
                price,
                quantity,
                true,
                trade.trade_id,
                serde_json::Map::new(),
            ));
        }
        Ok(Decoded::Trades(events))
    }
}
