use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;

use crate::models::Venue;

/// Runtime configuration, loaded once from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// Minimum USD notional for a trade to count as a whale trade.
    pub whale_threshold_usd: Decimal,
    /// Venues to run adapters for. Defaults to every known venue.
    pub venues: Vec<Venue>,
    pub chiliz_rpc_url: String,
    pub dex_poll_interval: Duration,
    /// Max block span per eth_getLogs request.
    pub dex_block_chunk: u64,
    pub reconnect_delay: Duration,
    pub recent_cache_capacity: usize,
    pub price_refresh_interval: Duration,
    /// Fallback FX rates used until the first live refresh succeeds.
    pub fallback_chz_usd: Decimal,
    pub fallback_krw_usd: Decimal,
    pub fallback_brl_usd: Decimal,
    pub fallback_eur_usd: Decimal,
    pub fallback_try_usd: Decimal,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = require("DATABASE_URL")?;

        let venues = match std::env::var("VENUES") {
            Ok(raw) if !raw.trim().is_empty() => parse_venues(&raw)?,
            _ => Venue::ALL.to_vec(),
        };

        Ok(Self {
            database_url,
            whale_threshold_usd: parse_or("WHALE_THRESHOLD_USD", Decimal::from(10_000))?,
            venues,
            chiliz_rpc_url: optional("CHILIZ_RPC_URL")
                .unwrap_or_else(|| "https://rpc.chiliz.com".to_string()),
            dex_poll_interval: Duration::from_secs(parse_or("DEX_POLL_INTERVAL_SECS", 3u64)?),
            dex_block_chunk: parse_or("DEX_BLOCK_CHUNK", 100u64)?,
            reconnect_delay: Duration::from_secs(parse_or("RECONNECT_DELAY_SECS", 5u64)?),
            recent_cache_capacity: parse_or("RECENT_CACHE_CAPACITY", 100usize)?,
            price_refresh_interval: Duration::from_secs(parse_or("PRICE_REFRESH_SECS", 300u64)?),
            fallback_chz_usd: parse_or("CHZ_USD", Decimal::new(8, 2))?,
            fallback_krw_usd: parse_or("KRW_USD", Decimal::new(72, 5))?,
            fallback_brl_usd: parse_or("BRL_USD", Decimal::new(18, 2))?,
            fallback_eur_usd: parse_or("EUR_USD", Decimal::new(108, 2))?,
            fallback_try_usd: parse_or("TRY_USD", Decimal::new(29, 3))?,
        })
    }
}

fn require(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var {key}"))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw}: {e}")),
        None => Ok(default),
    }
}

fn parse_venues(raw: &str) -> Result<Vec<Venue>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| {
            Venue::from_config_str(name).with_context(|| format!("unknown venue {name:?}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn venue_list_parsing() {
        let venues = parse_venues("binance, okx,upbit").unwrap();
        assert_eq!(venues, vec![Venue::Binance, Venue::Okx, Venue::Upbit]);
        assert!(parse_venues("binance,ftx").is_err());
    }

    #[test]
    fn parse_or_falls_back() {
        assert_eq!(parse_or("NOPE_DOES_NOT_EXIST", 7u64).unwrap(), 7);
    }
}
