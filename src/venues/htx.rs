//! HTX (Huobi) trade detail channel. Frames arrive gzip-compressed and the
//! server expects `{"ping": n}` answered with `{"pong": n}` in-band.

use flate2::read::GzDecoder;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::io::Read;

use super::{Decoded, NormalizeCtx, VenueAdapter};
use crate::errors::{AdapterError, DecodeError};
use crate::models::{Side, Venue};

const WS_URL: &str = "wss://api.huobi.pro/ws";

const PAIRS: &[&str] = &[
    "chzusdt", "psgusdt", "juvusdt", "ogusdt",
    "atmusdt", "argusdt", "acmusdt", "cityusdt",
    "barusdt", "laziousdt", "portousdt", "santosusdt",
];

#[derive(Deserialize)]
struct HtxFrame {
    #[serde(default)]
    ping: Option<u64>,
    /// Channel, e.g. `market.chzusdt.trade.detail`.
    #[serde(default)]
    ch: Option<String>,
    #[serde(default)]
    tick: Option<HtxTick>,
}

#[derive(Deserialize)]
struct HtxTick {
    #[serde(default)]
    data: Vec<HtxTrade>,
}

#[derive(Deserialize)]
struct HtxTrade {
    price: f64,
    amount: f64,
    /// "buy" or "sell".
    direction: String,
    #[serde(rename = "tradeId")]
    trade_id: u64,
}

pub struct HtxAdapter {
    ctx: NormalizeCtx,
}

impl HtxAdapter {
    pub fn new(ctx: NormalizeCtx) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl VenueAdapter for HtxAdapter {
    fn venue(&self) -> Venue {
        Venue::Htx
    }

    async fn endpoint(&self) -> Result<String, AdapterError> {
        Ok(WS_URL.to_string())
    }

    fn subscribe_frames(&self) -> Vec<String> {
        PAIRS
            .iter()
            .map(|pair| {
                json!({"sub": format!("market.{pair}.trade.detail"), "id": format!("trade_{pair}")})
                    .to_string()
            })
            .collect()
    }

    fn decode(&self, payload: &[u8]) -> Result<Decoded, DecodeError> {
        // Binary frames are gzip; text frames come through as-is.
        let text = if payload.starts_with(&[0x1f, 0x8b]) {
            let mut buf = String::new();
            GzDecoder::new(payload).read_to_string(&mut buf)?;
            buf
        } else {
            String::from_utf8_lossy(payload).into_owned()
        };

        let frame: HtxFrame = serde_json::from_str(&text)?;

        if let Some(n) = frame.ping {
            return Ok(Decoded::Reply(json!({"pong": n}).to_string()));
        }

        let (Some(ch), Some(tick)) = (frame.ch, frame.tick) else {
            return Ok(Decoded::Ignore);
        };
        let pair = ch
            .split('.')
            .nth(1)
            .ok_or_else(|| DecodeError::shape(format!("bad channel {ch:?}")))?;

        let mut events = Vec::with_capacity(tick.data.len());
        for trade in tick.data {
            let price = Decimal::try_from(trade.price)
                .map_err(|_| DecodeError::number("price", trade.price.to_string()))?;
            let quantity = Decimal::try_from(trade.amount)
                .map_err(|_| DecodeError::number("amount", trade.amount.to_string()))?;
            let side = Side::from_api_str(&trade.direction)
                .ok_or_else(|| DecodeError::shape(format!("bad direction {:?}", trade.direction)))?;

            events.push(self.ctx.event(
                Venue::Htx,
                pair,
                side,
                price,
                quantity,
                true,
                trade.trade_id.to_string(),
                serde_json::Map::new(),
            ));
        }
        Ok(Decoded::Trades(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venues::testutil::{ctx, decode_trades};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gz(text: &str) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(text.as_bytes()).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn server_ping_gets_pong_reply() {
        let adapter = HtxAdapter::new(ctx());
        let payload = gz(r#"{"ping":1700000000000}"#);
        match adapter.decode(&payload).unwrap() {
            Decoded::Reply(frame) => assert_eq!(frame, r#"{"pong":1700000000000}"#),
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[test]
    fn decodes_gzipped_trade_tick() {
        let adapter = HtxAdapter::new(ctx());
        let payload = gz(
            r#"{"ch":"market.chzusdt.trade.detail","ts":1700000000000,"tick":{"id":1,"ts":1700000000000,"data":[{"id":1,"ts":1700000000000,"tradeId":102044,"amount":250000.0,"price":0.1,"direction":"sell"}]}}"#,
        );

        let events = decode_trades(&adapter, &payload);
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.token_symbol.as_deref(), Some("CHZ"));
        assert_eq!(e.side, Side::Sell);
        assert_eq!(e.value_usd, Decimal::from(25_000));
        assert_eq!(e.venue_trade_id, "102044");
    }

    #[test]
    fn subscription_ack_is_ignored() {
        let adapter = HtxAdapter::new(ctx());
        let payload = gz(r#"{"id":"trade_chzusdt","status":"ok","subbed":"market.chzusdt.trade.detail","ts":1700000000000}"#);
        assert!(matches!(adapter.decode(&payload).unwrap(), Decoded::Ignore));
    }
}
