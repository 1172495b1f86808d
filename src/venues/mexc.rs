//! MEXC spot deals stream. Requires an app-level PING every 30 seconds or
//! the server drops the connection.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use std::time::Duration;

use super::{Decoded, Keepalive, NormalizeCtx, VenueAdapter};
use crate::errors::{AdapterError, DecodeError};
use crate::models::{Side, Venue};

const WS_URL: &str = "wss://wbs.mexc.com/ws";
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

const PAIRS: &[&str] = &[
    "CHZUSDT", "BARUSDT", "PSGUSDT", "JUVUSDT",
    "ACMUSDT", "CITYUSDT", "ATMUSDT", "OGUSDT",
    "LAZIOUSDT", "PORTOUSDT", "SANTOSUSDT",
];

#[derive(Deserialize)]
struct DealsFrame {
    #[serde(default)]
    s: Option<String>,
    #[serde(default)]
    d: Option<DealsBody>,
}

#[derive(Deserialize)]
struct DealsBody {
    #[serde(default)]
    deals: Vec<MexcDeal>,
}

#[derive(Deserialize)]
struct MexcDeal {
    p: String,
    v: String,
    /// 1 = buy, 2 = sell.
    #[serde(rename = "S")]
    side: u8,
    t: u64,
}

pub struct MexcAdapter {
    ctx: NormalizeCtx,
}

impl MexcAdapter {
    pub fn new(ctx: NormalizeCtx) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl VenueAdapter for MexcAdapter {
    fn venue(&self) -> Venue {
        Venue::Mexc
    }

    async fn endpoint(&self) -> Result<String, AdapterError> {
        Ok(WS_URL.to_string())
    }

    fn subscribe_frames(&self) -> Vec<String> {
        PAIRS
            .iter()
            .map(|pair| {
                json!({
                    "method": "SUBSCRIPTION",
                    "params": [format!("spot@public.deals.v3.api@{pair}")],
                })
                .to_string()
            })
            .collect()
    }

    fn keepalive(&self) -> Option<Keepalive> {
        Some(Keepalive {
            interval: KEEPALIVE_INTERVAL,
            frame: json!({"method": "PING"}).to_string(),
        })
    }

    fn decode(&self, payload: &[u8]) -> Result<Decoded, DecodeError> {
        let frame: DealsFrame = serde_json::from_slice(payload)?;
        let (Some(pair), Some(body)) = (frame.s, frame.d) else {
            return Ok(Decoded::Ignore);
        };

        let mut events = Vec::with_capacity(body.deals.len());
        for deal in body.deals {
            let price = Decimal::from_str(&deal.p)
                .map_err(|_| DecodeError::number("p", deal.p.clone()))?;
            let quantity = Decimal::from_str(&deal.v)
                .map_err(|_| DecodeError::number("v", deal.v.clone()))?;
            let side = match deal.side {
                1 => Side::Buy,
                2 => Side::Sell,
                other => return Err(DecodeError::shape(format!("bad deal side {other}"))),
            };

            // MEXC gives no per-deal id. The millisecond timestamp alone is
            // shared across pairs, so the pair is part of the id.
            events.push(self.ctx.event(
                Venue::Mexc,
                &pair,
                side,
                price,
                quantity,
                true,
                format!("{pair}:{}", deal.t),
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

    #[test]
    fn decodes_deal_batch_with_numeric_sides() {
        let adapter = MexcAdapter::new(ctx());
        let payload = br#"{"c":"spot@public.deals.v3.api@CHZUSDT","s":"CHZUSDT","t":1700000000000,"d":{"deals":[{"p":"0.10","v":"150000","S":1,"t":1700000000001},{"p":"0.10","v":"130000","S":2,"t":1700000000002}]}}"#;

        let events = decode_trades(&adapter, payload);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].side, Side::Buy);
        assert_eq!(events[0].value_usd, Decimal::from(15_000));
        assert_eq!(events[1].side, Side::Sell);
        assert_eq!(events[1].venue_trade_id, "CHZUSDT:1700000000002");
    }

    #[test]
    fn same_millisecond_on_different_pairs_gets_distinct_ids() {
        let adapter = MexcAdapter::new(ctx());
        let chz = br#"{"s":"CHZUSDT","d":{"deals":[{"p":"0.10","v":"150000","S":1,"t":1700000000001}]}}"#;
        let bar = br#"{"s":"BARUSDT","d":{"deals":[{"p":"2.00","v":"7500","S":1,"t":1700000000001}]}}"#;

        let chz_events = decode_trades(&adapter, chz);
        let bar_events = decode_trades(&adapter, bar);
        assert_eq!(chz_events[0].venue_trade_id, "CHZUSDT:1700000000001");
        assert_eq!(bar_events[0].venue_trade_id, "BARUSDT:1700000000001");
        assert_ne!(chz_events[0].venue_trade_id, bar_events[0].venue_trade_id);
    }

    #[test]
    fn pong_and_ack_frames_are_ignored() {
        let adapter = MexcAdapter::new(ctx());
        assert!(matches!(
            adapter.decode(br#"{"id":0,"code":0,"msg":"PONG"}"#).unwrap(),
            Decoded::Ignore
        ));
        assert!(matches!(
            adapter
                .decode(br#"{"id":0,"code":0,"msg":"spot@public.deals.v3.api@CHZUSDT"}"#)
                .unwrap(),
            Decoded::Ignore
        ));
    }
}
