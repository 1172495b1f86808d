//! Kraken public trade feed. Data arrives as positional JSON arrays; object
//! frames are status events and heartbeats.

use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;

use super::{Decoded, NormalizeCtx, VenueAdapter};
use crate::errors::{AdapterError, DecodeError};
use crate::models::{Side, TradeEvent, Venue};

const WS_URL: &str = "wss://ws.kraken.com";

const PAIRS: &[&str] = &["CHZ/USD", "CHZ/EUR"];

pub struct KrakenAdapter {
    ctx: NormalizeCtx,
}

impl KrakenAdapter {
    pub fn new(ctx: NormalizeCtx) -> Self {
        Self { ctx }
    }

    /// One `[price, volume, time, side, orderType, misc]` entry.
    fn decode_entry(&self, pair: &str, entry: &Value) -> Result<TradeEvent, DecodeError> {
        let fields = entry
            .as_array()
            .ok_or_else(|| DecodeError::shape("trade entry is not an array"))?;
        let price_str = fields
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| DecodeError::shape("trade entry missing price"))?;
        let volume_str = fields
            .get(1)
            .and_then(Value::as_str)
            .ok_or_else(|| DecodeError::shape("trade entry missing volume"))?;
        let time_str = fields
            .get(2)
            .and_then(Value::as_str)
            .ok_or_else(|| DecodeError::shape("trade entry missing time"))?;
        let side_str = fields
            .get(3)
            .and_then(Value::as_str)
            .ok_or_else(|| DecodeError::shape("trade entry missing side"))?;

        let price = Decimal::from_str(price_str)
            .map_err(|_| DecodeError::number("price", price_str))?;
        let quantity = Decimal::from_str(volume_str)
            .map_err(|_| DecodeError::number("volume", volume_str))?;
        let side = Side::from_api_str(side_str)
            .ok_or_else(|| DecodeError::shape(format!("bad side {side_str:?}")))?;

        // Kraken assigns no trade id; pair plus fractional timestamp is
        // unique in practice.
        Ok(self.ctx.event(
            Venue::Kraken,
            pair,
            side,
            price,
            quantity,
            true,
            format!("{pair}:{time_str}"),
            serde_json::Map::new(),
        ))
    }
}

#[async_trait::async_trait]
impl VenueAdapter for KrakenAdapter {
    fn venue(&self) -> Venue {
        Venue::Kraken
    }

    async fn endpoint(&self) -> Result<String, AdapterError> {
        Ok(WS_URL.to_string())
    }

    fn subscribe_frames(&self) -> Vec<String> {
        vec![json!({
            "event": "subscribe",
            "pair": PAIRS,
            "subscription": {"name": "trade"},
        })
        .to_string()]
    }

    fn decode(&self, payload: &[u8]) -> Result<Decoded, DecodeError> {
        let value: Value = serde_json::from_slice(payload)?;
        let Some(frame) = value.as_array() else {
            // systemStatus, subscriptionStatus, heartbeat
            return Ok(Decoded::Ignore);
        };
        // [channelID, [trades...], "trade", "CHZ/USD"]
        if frame.len() < 4 || frame.get(2).and_then(Value::as_str) != Some("trade") {
            return Ok(Decoded::Ignore);
        }
        let pair = frame
            .get(3)
            .and_then(Value::as_str)
            .ok_or_else(|| DecodeError::shape("trade frame missing pair"))?;
        let entries = frame
            .get(1)
            .and_then(Value::as_array)
            .ok_or_else(|| DecodeError::shape("trade frame missing entries"))?;

        let events = entries
            .iter()
            .map(|entry| self.decode_entry(pair, entry))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Decoded::Trades(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venues::testutil::{ctx, decode_trades};

    #[test]
    fn decodes_usd_trade_array() {
        let adapter = KrakenAdapter::new(ctx());
        let payload = br#"[337,[["0.10000","250000.00000000","1700000000.123456","s","m",""]],"trade","CHZ/USD"]"#;

        let e = &decode_trades(&adapter, payload)[0];
        assert_eq!(e.token_symbol.as_deref(), Some("CHZ"));
        assert_eq!(e.side, Side::Sell);
        assert_eq!(e.value_usd, Decimal::from(25_000));
        assert_eq!(e.venue_trade_id, "CHZ/USD:1700000000.123456");
    }

    #[test]
    fn eur_trade_converts_to_usd() {
        let adapter = KrakenAdapter::new(ctx());
        let payload = br#"[338,[["0.10000","100000.00000000","1700000000.000001","b","l",""]],"trade","CHZ/EUR"]"#;

        let e = &decode_trades(&adapter, payload)[0];
        assert_eq!(e.side, Side::Buy);
        // 10_000 EUR * 1.08 = 10_800 USD
        assert_eq!(e.value_usd, Decimal::from(10_800));
    }

    #[test]
    fn status_and_heartbeat_frames_are_ignored() {
        let adapter = KrakenAdapter::new(ctx());
        assert!(matches!(
            adapter
                .decode(br#"{"event":"heartbeat"}"#)
                .unwrap(),
            Decoded::Ignore
        ));
        assert!(matches!(
            adapter
                .decode(br#"{"event":"subscriptionStatus","status":"subscribed","pair":"CHZ/USD"}"#)
                .unwrap(),
            Decoded::Ignore
        ));
    }
}
