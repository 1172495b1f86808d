//! Coinbase Exchange matches channel. The `side` field is the maker order's
//! side, so the taker direction is its inverse.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;

use super::{Decoded, NormalizeCtx, VenueAdapter};
use crate::errors::{AdapterError, DecodeError};
use crate::models::{Side, Venue};

const WS_URL: &str = "wss://ws-feed.exchange.coinbase.com";

const PRODUCTS: &[&str] = &["CHZ-USD", "CHZ-EUR", "CHZ-USDT"];

#[derive(Deserialize)]
struct MatchFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    product_id: Option<String>,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    side: Option<String>,
    #[serde(default)]
    trade_id: Option<u64>,
}

pub struct CoinbaseAdapter {
    ctx: NormalizeCtx,
}

impl CoinbaseAdapter {
    pub fn new(ctx: NormalizeCtx) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl VenueAdapter for CoinbaseAdapter {
    fn venue(&self) -> Venue {
        Venue::Coinbase
    }

    async fn endpoint(&self) -> Result<String, AdapterError> {
        Ok(WS_URL.to_string())
    }

    fn subscribe_frames(&self) -> Vec<String> {
        vec![json!({
            "type": "subscribe",
            "product_ids": PRODUCTS,
            "channels": ["matches"],
        })
        .to_string()]
    }

    fn decode(&self, payload: &[u8]) -> Result<Decoded, DecodeError> {
        let frame: MatchFrame = serde_json::from_slice(payload)?;
        if frame.kind != "match" && frame.kind != "last_match" {
            return Ok(Decoded::Ignore);
        }

        let product_id = frame
            .product_id
            .ok_or_else(|| DecodeError::shape("match missing product_id"))?;
        let price_str = frame
            .price
            .ok_or_else(|| DecodeError::shape("match missing price"))?;
        let size_str = frame
            .size
            .ok_or_else(|| DecodeError::shape("match missing size"))?;
        let maker_side = frame
            .side
            .as_deref()
            .and_then(Side::from_api_str)
            .ok_or_else(|| DecodeError::shape("match missing side"))?;
        let trade_id = frame
            .trade_id
            .ok_or_else(|| DecodeError::shape("match missing trade_id"))?;

        let price = Decimal::from_str(&price_str)
            .map_err(|_| DecodeError::number("price", price_str.clone()))?;
        let quantity = Decimal::from_str(&size_str)
            .map_err(|_| DecodeError::number("size", size_str.clone()))?;

        let event = self.ctx.event(
            Venue::Coinbase,
            &product_id,
            maker_side.invert(),
            price,
            quantity,
            true,
            trade_id.to_string(),
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
    fn maker_sell_is_a_taker_buy() {
        let adapter = CoinbaseAdapter::new(ctx());
        let payload = br#"{"type":"match","trade_id":8761234,"maker_order_id":"a","taker_order_id":"b","side":"sell","size":"120000","price":"0.10","product_id":"CHZ-USD","sequence":50,"time":"2026-08-30T12:00:00.000000Z"}"#;

        let e = &decode_trades(&adapter, payload)[0];
        assert_eq!(e.token_symbol.as_deref(), Some("CHZ"));
        assert_eq!(e.side, Side::Buy);
        assert_eq!(e.value_usd, Decimal::from(12_000));
        assert_eq!(e.venue_trade_id, "8761234");
    }

    #[test]
    fn maker_buy_is_a_taker_sell() {
        let adapter = CoinbaseAdapter::new(ctx());
        let payload = br#"{"type":"match","trade_id":9,"side":"buy","size":"1000","price":"0.10","product_id":"CHZ-USDT"}"#;

        let e = &decode_trades(&adapter, payload)[0];
        assert_eq!(e.side, Side::Sell);
    }

    #[test]
    fn subscription_and_heartbeat_frames_are_ignored() {
        let adapter = CoinbaseAdapter::new(ctx());
        assert!(matches!(
            adapter
                .decode(br#"{"type":"subscriptions","channels":[{"name":"matches","product_ids":["CHZ-USD"]}]}"#)
                .unwrap(),
            Decoded::Ignore
        ));
    }
}
