//! Mercado Bitcoin trade stream. Notionals are BRL-quoted and converted
//! through the shared rate snapshot, which the refresher keeps aligned with
//! the venue's own USDT-BRL ticker.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use super::{Decoded, NormalizeCtx, VenueAdapter};
use crate::errors::{AdapterError, DecodeError};
use crate::models::{Side, Venue};

const WS_URL: &str = "wss://ws.mercadobitcoin.net/ws";

const PAIRS: &[&str] = &["CHZ-BRL"];

#[derive(Deserialize)]
struct TradesFrame {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    data: Vec<MbTrade>,
}

#[derive(Deserialize)]
struct MbTrade {
    price: f64,
    amount: f64,
    /// "buy" or "sell".
    #[serde(rename = "type")]
    side: String,
    tid: u64,
}

pub struct MercadoBitcoinAdapter {
    ctx: NormalizeCtx,
}

impl MercadoBitcoinAdapter {
    pub fn new(ctx: NormalizeCtx) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl VenueAdapter for MercadoBitcoinAdapter {
    fn venue(&self) -> Venue {
        Venue::MercadoBitcoin
    }

    async fn endpoint(&self) -> Result<String, AdapterError> {
        Ok(WS_URL.to_string())
    }

    fn subscribe_frames(&self) -> Vec<String> {
        PAIRS
            .iter()
            .map(|pair| {
                json!({
                    "type": "subscribe",
                    "subscription": {"name": "trades", "id": pair},
                })
                .to_string()
            })
            .collect()
    }

    fn decode(&self, payload: &[u8]) -> Result<Decoded, DecodeError> {
        let frame: TradesFrame = serde_json::from_slice(payload)?;
        if frame.kind.as_deref() != Some("trades") {
            return Ok(Decoded::Ignore);
        }
        let Some(pair) = frame.id else {
            return Ok(Decoded::Ignore);
        };

        let mut events = Vec::with_capacity(frame.data.len());
        for trade in frame.data {
            let price = Decimal::try_from(trade.price)
                .map_err(|_| DecodeError::number("price", trade.price.to_string()))?;
            let quantity = Decimal::try_from(trade.amount)
                .map_err(|_| DecodeError::number("amount", trade.amount.to_string()))?;
            let side = Side::from_api_str(&trade.side)
                .ok_or_else(|| DecodeError::shape(format!("bad trade type {:?}", trade.side)))?;

            events.push(self.ctx.event(
                Venue::MercadoBitcoin,
                &pair,
                side,
                price,
                quantity,
                true,
                trade.tid.to_string(),
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
    fn decodes_brl_trade_and_converts_to_usd() {
        let adapter = MercadoBitcoinAdapter::new(ctx());
        let payload = br#"{"type":"trades","id":"CHZ-BRL","data":[{"tid":998877,"date":1700000000,"type":"sell","price":0.5,"amount":120000.0}]}"#;

        let e = &decode_trades(&adapter, payload)[0];
        assert_eq!(e.token_symbol.as_deref(), Some("CHZ"));
        assert_eq!(e.side, Side::Sell);
        // 60_000 BRL * 0.20 = 12_000 USD
        assert_eq!(e.value_usd, Decimal::from(12_000));
        assert_eq!(e.venue_trade_id, "998877");
    }

    #[test]
    fn subscription_ack_is_ignored() {
        let adapter = MercadoBitcoinAdapter::new(ctx());
        let payload = br#"{"type":"subscribed","subscription":{"name":"trades","id":"CHZ-BRL"}}"#;
        assert!(matches!(adapter.decode(payload).unwrap(), Decoded::Ignore));
    }
}
