//! Upbit trade stream. The subscription is a single JSON array frame and
//! trades arrive as binary frames with KRW-quoted notionals.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use super::{Decoded, NormalizeCtx, VenueAdapter};
use crate::errors::{AdapterError, DecodeError};
use crate::models::{Side, Venue};

const WS_URL: &str = "wss://api.upbit.com/websocket/v1";

const CODES: &[&str] = &[
    "KRW-CHZ", "KRW-BAR", "KRW-PSG", "KRW-JUV",
    "KRW-ACM", "KRW-CITY", "KRW-ATM", "KRW-AFC",
    "KRW-INTER", "KRW-NAP",
];

#[derive(Deserialize)]
struct UpbitFrame {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    trade_price: Option<f64>,
    #[serde(default)]
    trade_volume: Option<f64>,
    /// "ASK" (taker sold) or "BID" (taker bought).
    #[serde(default)]
    ask_bid: Option<String>,
    #[serde(default)]
    sequential_id: Option<u64>,
}

pub struct UpbitAdapter {
    ctx: NormalizeCtx,
}

impl UpbitAdapter {
    pub fn new(ctx: NormalizeCtx) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl VenueAdapter for UpbitAdapter {
    fn venue(&self) -> Venue {
        Venue::Upbit
    }

    async fn endpoint(&self) -> Result<String, AdapterError> {
        Ok(WS_URL.to_string())
    }

    fn subscribe_frames(&self) -> Vec<String> {
        vec![json!([
            {"ticket": "whaletrack"},
            {"type": "trade", "codes": CODES},
            {"format": "DEFAULT"},
        ])
        .to_string()]
    }

    fn decode(&self, payload: &[u8]) -> Result<Decoded, DecodeError> {
        let frame: UpbitFrame = serde_json::from_slice(payload)?;
        if frame.kind.as_deref() != Some("trade") {
            return Ok(Decoded::Ignore);
        }

        let code = frame
            .code
            .ok_or_else(|| DecodeError::shape("trade frame missing code"))?;
        let price = frame
            .trade_price
            .and_then(|p| Decimal::try_from(p).ok())
            .ok_or_else(|| DecodeError::shape("trade frame missing trade_price"))?;
        let quantity = frame
            .trade_volume
            .and_then(|v| Decimal::try_from(v).ok())
            .ok_or_else(|| DecodeError::shape("trade frame missing trade_volume"))?;
        let ask_bid = frame
            .ask_bid
            .ok_or_else(|| DecodeError::shape("trade frame missing ask_bid"))?;
        let side = match ask_bid.as_str() {
            "ASK" => Side::Sell,
            "BID" => Side::Buy,
            other => return Err(DecodeError::shape(format!("bad ask_bid {other:?}"))),
        };
        let seq = frame
            .sequential_id
            .ok_or_else(|| DecodeError::shape("trade frame missing sequential_id"))?;

        let event = self.ctx.event(
            Venue::Upbit,
            &code,
            side,
            price,
            quantity,
            true,
            seq.to_string(),
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
    fn decodes_krw_trade_and_converts_to_usd() {
        let adapter = UpbitAdapter::new(ctx());
        let payload = br#"{"type":"trade","code":"KRW-CHZ","timestamp":1700000000000,"trade_price":130.0,"trade_volume":200000.0,"ask_bid":"ASK","sequential_id":1700000000000001}"#;

        let e = &decode_trades(&adapter, payload)[0];
        assert_eq!(e.token_symbol.as_deref(), Some("CHZ"));
        assert_eq!(e.side, Side::Sell);
        // 26_000_000 KRW * 0.00072 = 18_720 USD
        assert_eq!(e.value_usd, Decimal::from(18_720));
        assert_eq!(e.venue_trade_id, "1700000000000001");
    }

    #[test]
    fn bid_side_is_a_buy() {
        let adapter = UpbitAdapter::new(ctx());
        let payload = br#"{"type":"trade","code":"KRW-BAR","trade_price":2000.0,"trade_volume":10.0,"ask_bid":"BID","sequential_id":7}"#;

        let e = &decode_trades(&adapter, payload)[0];
        assert_eq!(e.token_symbol.as_deref(), Some("BAR"));
        assert_eq!(e.side, Side::Buy);
    }

    #[test]
    fn non_trade_frames_are_ignored() {
        let adapter = UpbitAdapter::new(ctx());
        assert!(matches!(
            adapter.decode(br#"{"status":"UP"}"#).unwrap(),
            Decoded::Ignore
        ));
    }
}
