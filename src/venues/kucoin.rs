//! KuCoin match feed. KuCoin hands out an ephemeral websocket endpoint and
//! token over HTTP before the connection can be opened, and expects an
//! app-level ping frame roughly every 18 seconds.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use std::time::Duration;

use super::{Decoded, Keepalive, NormalizeCtx, VenueAdapter};
use crate::errors::{AdapterError, DecodeError};
use crate::models::{Side, Venue};

const BULLET_URL: &str = "https://api.kucoin.com/api/v1/bullet-public";
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(18);

const PAIRS: &[&str] = &[
    "CHZ-USDT", "BAR-USDT", "PSG-USDT", "JUV-USDT",
    "CITY-USDT", "ACM-USDT", "ATM-USDT", "OG-USDT",
];

#[derive(Deserialize)]
struct BulletResponse {
    code: String,
    data: BulletData,
}

#[derive(Deserialize)]
struct BulletData {
    token: String,
    #[serde(rename = "instanceServers")]
    instance_servers: Vec<InstanceServer>,
}

#[derive(Deserialize)]
struct InstanceServer {
    endpoint: String,
}

#[derive(Deserialize)]
struct MatchFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<MatchData>,
}

#[derive(Deserialize)]
struct MatchData {
    symbol: String,
    price: String,
    size: String,
    side: String,
    #[serde(rename = "tradeId")]
    trade_id: String,
}

pub struct KucoinAdapter {
    ctx: NormalizeCtx,
    http: reqwest::Client,
}

impl KucoinAdapter {
    pub fn new(ctx: NormalizeCtx) -> Self {
        Self {
            ctx,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl VenueAdapter for KucoinAdapter {
    fn venue(&self) -> Venue {
        Venue::Kucoin
    }

    async fn endpoint(&self) -> Result<String, AdapterError> {
        let resp: BulletResponse = self
            .http
            .post(BULLET_URL)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if resp.code != "200000" {
            return Err(AdapterError::Subscribe(format!(
                "bullet-public returned code {}",
                resp.code
            )));
        }
        let server = resp
            .data
            .instance_servers
            .first()
            .ok_or_else(|| AdapterError::Subscribe("no instance servers offered".to_string()))?;

        Ok(format!("{}?token={}", server.endpoint, resp.data.token))
    }

    fn subscribe_frames(&self) -> Vec<String> {
        PAIRS
            .iter()
            .enumerate()
            .map(|(i, pair)| {
                json!({
                    "id": i + 1,
                    "type": "subscribe",
                    "topic": format!("/market/match:{pair}"),
                    "privateChannel": false,
                    "response": true,
                })
                .to_string()
            })
            .collect()
    }

    fn keepalive(&self) -> Option<Keepalive> {
        Some(Keepalive {
            interval: KEEPALIVE_INTERVAL,
            frame: json!({"id": "keepalive", "type": "ping"}).to_string(),
        })
    }

    fn decode(&self, payload: &[u8]) -> Result<Decoded, DecodeError> {
        let frame: MatchFrame = serde_json::from_slice(payload)?;
        if frame.kind != "message" {
            // welcome, ack, pong
            return Ok(Decoded::Ignore);
        }
        let Some(data) = frame.data else {
            return Ok(Decoded::Ignore);
        };

        let price = Decimal::from_str(&data.price)
            .map_err(|_| DecodeError::number("price", data.price.clone()))?;
        let quantity = Decimal::from_str(&data.size)
            .map_err(|_| DecodeError::number("size", data.size.clone()))?;
        let side = Side::from_api_str(&data.side)
            .ok_or_else(|| DecodeError::shape(format!("bad side {:?}", data.side)))?;

        let event = self.ctx.event(
            Venue::Kucoin,
            &data.symbol,
            side,
            price,
            quantity,
            true,
            data.trade_id,
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
    fn decodes_match_message() {
        let adapter = KucoinAdapter::new(ctx());
        let payload = br#"{"type":"message","topic":"/market/match:CHZ-USDT","subject":"trade.l3match","data":{"symbol":"CHZ-USDT","side":"sell","size":"200000","price":"0.10","tradeId":"5e5a1f","time":"1700000000000000000"}}"#;

        let events = decode_trades(&adapter, payload);
        let e = &events[0];
        assert_eq!(e.token_symbol.as_deref(), Some("CHZ"));
        assert_eq!(e.side, Side::Sell);
        assert_eq!(e.value_usd, Decimal::from(20_000));
        assert_eq!(e.venue_trade_id, "5e5a1f");
    }

    #[test]
    fn welcome_and_ack_frames_are_ignored() {
        let adapter = KucoinAdapter::new(ctx());
        assert!(matches!(
            adapter.decode(br#"{"id":"x","type":"welcome"}"#).unwrap(),
            Decoded::Ignore
        ));
        assert!(matches!(
            adapter.decode(br#"{"id":"1","type":"ack"}"#).unwrap(),
            Decoded::Ignore
        ));
    }

    #[test]
    fn keepalive_is_an_app_ping() {
        let adapter = KucoinAdapter::new(ctx());
        let k = adapter.keepalive().unwrap();
        assert_eq!(k.interval, KEEPALIVE_INTERVAL);
        let parsed: serde_json::Value = serde_json::from_str(&k.frame).unwrap();
        assert_eq!(parsed["type"], "ping");
    }
}
