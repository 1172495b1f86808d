//! Gate.io v4 spot.trades channel.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;

use super::{Decoded, NormalizeCtx, VenueAdapter};
use crate::errors::{AdapterError, DecodeError};
use crate::models::{Side, Venue};

const WS_URL: &str = "wss://api.gateio.ws/ws/v4/";

const PAIRS: &[&str] = &[
    "CHZ_USDT", "BAR_USDT", "PSG_USDT", "JUV_USDT",
    "ACM_USDT", "CITY_USDT", "ATM_USDT", "OG_USDT",
    "LAZIO_USDT", "PORTO_USDT", "SANTOS_USDT", "ALPINE_USDT",
];

#[derive(Deserialize)]
struct PushFrame {
    #[serde(default)]
    event: Option<String>,
    /// Left raw: acks carry a status object here, updates carry a trade.
    #[serde(default)]
    result: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct GateTrade {
    currency_pair: String,
    price: String,
    amount: String,
    side: String,
    id: u64,
}

pub struct GateioAdapter {
    ctx: NormalizeCtx,
}

impl GateioAdapter {
    pub fn new(ctx: NormalizeCtx) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl VenueAdapter for GateioAdapter {
    fn venue(&self) -> Venue {
        Venue::Gateio
    }

    async fn endpoint(&self) -> Result<String, AdapterError> {
        Ok(WS_URL.to_string())
    }

    fn subscribe_frames(&self) -> Vec<String> {
        vec![json!({
            "time": Utc::now().timestamp(),
            "channel": "spot.trades",
            "event": "subscribe",
            "payload": PAIRS,
        })
        .to_string()]
    }

    fn decode(&self, payload: &[u8]) -> Result<Decoded, DecodeError> {
        let frame: PushFrame = serde_json::from_slice(payload)?;
        if frame.event.as_deref() != Some("update") {
            return Ok(Decoded::Ignore);
        }
        let Some(result) = frame.result else {
            return Ok(Decoded::Ignore);
        };
        let trade: GateTrade = serde_json::from_value(result)?;

        let price = Decimal::from_str(&trade.price)
            .map_err(|_| DecodeError::number("price", trade.price.clone()))?;
        let quantity = Decimal::from_str(&trade.amount)
            .map_err(|_| DecodeError::number("amount", trade.amount.clone()))?;
        let side = Side::from_api_str(&trade.side)
            .ok_or_else(|| DecodeError::shape(format!("bad side {:?}", trade.side)))?;

        let event = self.ctx.event(
            Venue::Gateio,
            &trade.currency_pair,
            side,
            price,
            quantity,
            true,
            trade.id.to_string(),
            serde_json::Map::new(),
        );
        Ok(Decoded::Trades(vec![event]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venues::testutil::{ctx, decode_trades};

    #[test]
    fn decodes_trade_update() {
        let adapter = GateioAdapter::new(ctx());
        let payload = br#"{"time":1700000000,"channel":"spot.trades","event":"update","result":{"id":309143071,"create_time":1700000000,"side":"sell","currency_pair":"SANTOS_USDT","amount":"4000","price":"3.00"}}"#;

        let e = &decode_trades(&adapter, payload)[0];
        assert_eq!(e.token_symbol.as_deref(), Some("SANTOS"));
        assert_eq!(e.side, Side::Sell);
        assert_eq!(e.value_usd, Decimal::from(12_000));
        assert_eq!(e.venue_trade_id, "309143071");
    }

    #[test]
    fn subscribe_ack_is_ignored() {
        let adapter = GateioAdapter::new(ctx());
        let payload = br#"{"time":1700000000,"channel":"spot.trades","event":"subscribe","result":{"status":"success"}}"#;
        assert!(matches!(adapter.decode(payload).unwrap(), Decoded::Ignore));
    }
}
