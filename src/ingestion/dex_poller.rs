//! FanX (Chiliz Chain) swap poller. Scans UniswapV2-style Swap logs over
//! JSON-RPC in bounded block chunks and emits canonical trade events.
//!
//! Pool pricing is an approximation: the larger leg of the swap is treated
//! as a CHZ-denominated notional and converted at the current CHZ/USD rate.

use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::ingestion::rates::RateBoard;
use crate::models::{Side, TradeEvent, Venue};

/// keccak256("Swap(address,uint256,uint256,uint256,uint256,address)")
const SWAP_TOPIC: &str = "0xd78ad95fa46c994b6551d0da85fc275fe613ce37657fb8d5e3d130840159d822";

// TODO: populate from the FanX factory once pool discovery lands; until
// then every swap is emitted with an unresolved token.
const POOL_TOKENS: &[(&str, &str)] = &[];

#[derive(Debug, Clone)]
pub struct DexPollerConfig {
    pub rpc_url: String,
    pub poll_interval: Duration,
    pub block_chunk: u64,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct LogEntry {
    address: String,
    data: String,
    #[serde(rename = "blockNumber")]
    block_number: String,
    #[serde(rename = "transactionHash")]
    transaction_hash: String,
    #[serde(rename = "logIndex")]
    log_index: String,
}

pub async fn run_dex_poller(
    config: DexPollerConfig,
    rates: RateBoard,
    tx: mpsc::Sender<TradeEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let http = reqwest::Client::new();
    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    // Start just behind the chain head rather than replaying history.
    let mut last_block: Option<u64> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        if let Err(e) = poll_once(&http, &config, &rates, &tx, &mut last_block).await {
            tracing::warn!(error = %e, "dex poll failed, will retry");
        }
    }

    tracing::info!("dex poller stopped");
}

async fn poll_once(
    http: &reqwest::Client,
    config: &DexPollerConfig,
    rates: &RateBoard,
    tx: &mpsc::Sender<TradeEvent>,
    last_block: &mut Option<u64>,
) -> Result<()> {
    let head = eth_block_number(http, &config.rpc_url).await?;

    let from_block = match *last_block {
        Some(last) if last >= head => return Ok(()),
        Some(last) => last + 1,
        None => head.saturating_sub(config.block_chunk),
    };
    let to_block = head.min(from_block + config.block_chunk);

    let logs = eth_get_logs(http, &config.rpc_url, from_block, to_block).await?;
    tracing::debug!(
        from_block,
        to_block,
        log_count = logs.len(),
        "scanned swap logs"
    );

    for log in logs {
        match swap_event(&log, rates) {
            Ok(event) => {
                if tx.send(event).await.is_err() {
                    anyhow::bail!("event channel closed");
                }
            }
            Err(e) => {
                metrics::counter!("decode_failures_total", "venue" => Venue::FanxDex.as_str())
                    .increment(1);
                tracing::warn!(
                    tx_hash = %log.transaction_hash,
                    error = %e,
                    "bad swap log, skipping"
                );
            }
        }
    }

    *last_block = Some(to_block);
    Ok(())
}

async fn eth_block_number(http: &reqwest::Client, rpc_url: &str) -> Result<u64> {
    let resp: RpcResponse<String> = http
        .post(rpc_url)
        .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "eth_blockNumber", "params": []}))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    if let Some(error) = resp.error {
        anyhow::bail!("eth_blockNumber error: {error}");
    }
    let hex = resp.result.context("eth_blockNumber returned no result")?;
    parse_hex_u64(&hex)
}

async fn eth_get_logs(
    http: &reqwest::Client,
    rpc_url: &str,
    from_block: u64,
    to_block: u64,
) -> Result<Vec<LogEntry>> {
    let resp: RpcResponse<Vec<LogEntry>> = http
        .post(rpc_url)
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_getLogs",
            "params": [{
                "fromBlock": format!("{from_block:#x}"),
                "toBlock": format!("{to_block:#x}"),
                "topics": [SWAP_TOPIC],
            }],
        }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    if let Some(error) = resp.error {
        anyhow::bail!("eth_getLogs error: {error}");
    }
    Ok(resp.result.unwrap_or_default())
}

fn swap_event(log: &LogEntry, rates: &RateBoard) -> Result<TradeEvent> {
    let (a0_in, a1_in, a0_out, a1_out) = decode_swap_data(&log.data)?;
    let block_number = parse_hex_u64(&log.block_number)?;
    let log_index = parse_hex_u64(&log.log_index)?;

    // The larger leg of the swap as a whole-token amount, 18 decimals.
    let leg0 = a0_in.checked_add(a0_out).context("leg0 overflow")?;
    let leg1 = a1_in.checked_add(a1_out).context("leg1 overflow")?;
    let raw_amount = leg0.max(leg1);
    let raw_amount = i128::try_from(raw_amount).context("swap amount out of range")?;
    let amount = Decimal::try_from_i128_with_scale(raw_amount, 18)
        .context("swap amount out of decimal range")?
        .normalize();
    let value_usd = amount * rates.chz_usd();

    // token0 flowing in means the fan token was bought with CHZ.
    let side = if a0_in > 0 { Side::Buy } else { Side::Sell };

    let pool = log.address.to_lowercase();
    let token_symbol = POOL_TOKENS
        .iter()
        .find(|(addr, _)| *addr == pool)
        .map(|(_, token)| token.to_string());

    let mut extra = serde_json::Map::new();
    extra.insert("pool_address".to_string(), pool.clone().into());
    extra.insert("block_number".to_string(), (block_number as i64).into());

    Ok(TradeEvent {
        venue: Venue::FanxDex,
        token_symbol,
        raw_pair: pool,
        side,
        price: rates.chz_usd(),
        quantity: amount,
        value_usd,
        is_aggressor: true,
        venue_trade_id: format!("{}:{}", log.transaction_hash, log_index),
        observed_at: Utc::now(),
        extra,
    })
}

/// Decode the four uint256 amounts of a V2 Swap log:
/// (amount0In, amount1In, amount0Out, amount1Out).
fn decode_swap_data(data: &str) -> Result<(u128, u128, u128, u128)> {
    let hex = data.strip_prefix("0x").unwrap_or(data);
    if hex.len() < 256 {
        anyhow::bail!("swap data too short: {} chars", hex.len());
    }
    // Slicing at fixed offsets panics on multibyte UTF-8, so non-ASCII data
    // from a misbehaving node is rejected up front.
    if !hex.is_ascii() {
        anyhow::bail!("swap data is not ascii hex");
    }
    let word = |i: usize| -> Result<u128> {
        // Amounts fit 128 bits in practice; reject anything wider.
        let full = &hex[i * 64..(i + 1) * 64];
        if full[..32].bytes().any(|b| b != b'0') {
            anyhow::bail!("swap amount overflows u128");
        }
        u128::from_str_radix(&full[32..], 16).context("bad hex in swap data")
    };
    Ok((word(0)?, word(1)?, word(2)?, word(3)?))
}

fn parse_hex_u64(hex: &str) -> Result<u64> {
    let trimmed = hex.strip_prefix("0x").unwrap_or(hex);
    u64::from_str_radix(trimmed, 16).with_context(|| format!("bad hex quantity {hex:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::rates::RateSnapshot;
    use std::str::FromStr;

    fn rates() -> RateBoard {
        RateBoard::new(RateSnapshot {
            chz_usd: Decimal::from_str("0.10").unwrap(),
            krw_usd: Decimal::ZERO,
            brl_usd: Decimal::ZERO,
            eur_usd: Decimal::ZERO,
            try_usd: Decimal::ZERO,
            updated_at: Utc::now(),
        })
    }

    fn swap_data(a0_in: u128, a1_in: u128, a0_out: u128, a1_out: u128) -> String {
        format!("0x{a0_in:064x}{a1_in:064x}{a0_out:064x}{a1_out:064x}")
    }

    #[test]
    fn decodes_swap_amount_words() {
        let data = swap_data(1_000, 0, 0, 2_000);
        let (a0_in, a1_in, a0_out, a1_out) = decode_swap_data(&data).unwrap();
        assert_eq!((a0_in, a1_in, a0_out, a1_out), (1_000, 0, 0, 2_000));
    }

    #[test]
    fn short_data_is_rejected() {
        assert!(decode_swap_data("0x1234").is_err());
    }

    #[test]
    fn non_ascii_data_is_rejected_not_panicking() {
        // Two-byte char straddling a word boundary; slicing this would panic.
        let mut data = swap_data(1_000, 0, 0, 2_000);
        data.replace_range(2 + 63..2 + 65, "é");
        assert!(decode_swap_data(&data).is_err());
    }

    #[test]
    fn hex_quantities_parse() {
        assert_eq!(parse_hex_u64("0x10").unwrap(), 16);
        assert_eq!(parse_hex_u64("0x0").unwrap(), 0);
        assert!(parse_hex_u64("0xzz").is_err());
    }

    #[test]
    fn swap_log_becomes_unresolved_buy_event() {
        // 200_000 tokens in on leg 0: a taker buy worth $20_000 at $0.10.
        let wei = 200_000u128 * 1_000_000_000_000_000_000u128;
        let log = LogEntry {
            address: "0xAbCd000000000000000000000000000000000001".to_string(),
            data: swap_data(wei, 0, 0, wei / 2),
            block_number: "0x1e8480".to_string(),
            transaction_hash: "0xdeadbeef".to_string(),
            log_index: "0x3".to_string(),
        };

        let event = swap_event(&log, &rates()).unwrap();
        assert_eq!(event.venue, Venue::FanxDex);
        assert!(event.token_symbol.is_none());
        assert_eq!(event.side, Side::Buy);
        assert_eq!(event.quantity, Decimal::from(200_000));
        assert_eq!(event.value_usd, Decimal::from(20_000));
        assert_eq!(event.venue_trade_id, "0xdeadbeef:3");
        assert_eq!(
            event.extra.get("block_number").and_then(|v| v.as_i64()),
            Some(2_000_000)
        );
        assert_eq!(
            event.extra.get("pool_address").and_then(|v| v.as_str()),
            Some("0xabcd000000000000000000000000000000000001")
        );
    }

    #[test]
    fn swap_with_only_leg_one_is_a_sell() {
        let wei = 500_000u128 * 1_000_000_000_000_000_000u128;
        let log = LogEntry {
            address: "0xpool".to_string(),
            data: swap_data(0, wei, wei / 3, 0),
            block_number: "0x1".to_string(),
            transaction_hash: "0xfeed".to_string(),
            log_index: "0x0".to_string(),
        };

        let event = swap_event(&log, &rates()).unwrap();
        assert_eq!(event.side, Side::Sell);
        assert_eq!(event.value_usd, Decimal::from(50_000));
    }
}
