//! Shared FX/price snapshot used to express every trade notional in USD.
//!
//! One background task refreshes the snapshot; every adapter reads it
//! lock-free through an atomic swap. A failed refresh keeps the previous
//! snapshot, so conversion never stalls ingestion.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::db::price_repo;
use crate::symbols::Quote;

#[derive(Debug, Clone)]
pub struct RateSnapshot {
    pub chz_usd: Decimal,
    pub krw_usd: Decimal,
    pub brl_usd: Decimal,
    pub eur_usd: Decimal,
    pub try_usd: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct RateBoard {
    inner: Arc<ArcSwap<RateSnapshot>>,
}

impl RateBoard {
    pub fn new(initial: RateSnapshot) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(RateSnapshot {
            chz_usd: config.fallback_chz_usd,
            krw_usd: config.fallback_krw_usd,
            brl_usd: config.fallback_brl_usd,
            eur_usd: config.fallback_eur_usd,
            try_usd: config.fallback_try_usd,
            updated_at: Utc::now(),
        })
    }

    pub fn snapshot(&self) -> Arc<RateSnapshot> {
        self.inner.load_full()
    }

    pub fn store(&self, snapshot: RateSnapshot) {
        self.inner.store(Arc::new(snapshot));
    }

    pub fn chz_usd(&self) -> Decimal {
        self.inner.load().chz_usd
    }

    /// Convert an amount denominated in `quote` to USD.
    ///
    /// Crypto-quoted pairs (BTC) and unknown quotes convert to zero, which
    /// keeps them out of whale filtering without special-casing callers.
    pub fn to_usd(&self, amount: Decimal, quote: Quote) -> Decimal {
        let snap = self.inner.load();
        match quote {
            Quote::Usd | Quote::Usdt | Quote::Usdc | Quote::Busd => amount,
            Quote::Krw => amount * snap.krw_usd,
            Quote::Brl => amount * snap.brl_usd,
            Quote::Eur => amount * snap.eur_usd,
            Quote::Try => amount * snap.try_usd,
            Quote::Btc | Quote::Unknown => Decimal::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Refresh task
// ---------------------------------------------------------------------------

const MB_TICKER_URL: &str = "https://api.mercadobitcoin.net/api/v4/tickers?symbols=USDT-BRL";

#[derive(Deserialize)]
struct MbTicker {
    last: String,
}

/// Periodically refresh CHZ/USD from recorded price ticks and BRL/USD from
/// the Mercado Bitcoin USDT-BRL ticker. Runs until shutdown is signalled.
pub async fn run_rate_refresher(
    board: RateBoard,
    pool: PgPool,
    http: reqwest::Client,
    interval: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    tracing::info!("rate refresher shutting down");
                    return;
                }
                continue;
            }
        }

        let mut snap = (*board.snapshot()).clone();
        let mut changed = false;

        match price_repo::get_latest_price(&pool, "CHZ").await {
            Ok(Some(price)) if price > Decimal::ZERO => {
                snap.chz_usd = price;
                changed = true;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "chz price lookup failed, keeping last rate"),
        }

        match fetch_brl_usd(&http).await {
            Ok(rate) => {
                snap.brl_usd = rate;
                changed = true;
            }
            Err(e) => tracing::warn!(error = %e, "brl/usd refresh failed, keeping last rate"),
        }

        if changed {
            snap.updated_at = Utc::now();
            tracing::debug!(
                chz_usd = %snap.chz_usd,
                brl_usd = %snap.brl_usd,
                "rate snapshot refreshed"
            );
            board.store(snap);
        }
    }
}

async fn fetch_brl_usd(http: &reqwest::Client) -> anyhow::Result<Decimal> {
    let tickers: Vec<MbTicker> = http
        .get(MB_TICKER_URL)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let last = tickers
        .first()
        .ok_or_else(|| anyhow::anyhow!("empty ticker response"))?;
    let usdt_brl = Decimal::from_str(&last.last)?;
    if usdt_brl <= Decimal::ZERO {
        anyhow::bail!("non-positive USDT-BRL rate {usdt_brl}");
    }

    Ok(Decimal::ONE / usdt_brl)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> RateBoard {
        RateBoard::new(RateSnapshot {
            chz_usd: Decimal::from_str("0.10").unwrap(),
            krw_usd: Decimal::from_str("0.00072").unwrap(),
            brl_usd: Decimal::from_str("0.20").unwrap(),
            eur_usd: Decimal::from_str("1.08").unwrap(),
            try_usd: Decimal::from_str("0.029").unwrap(),
            updated_at: Utc::now(),
        })
    }

    #[test]
    fn usd_equivalents_pass_through() {
        let b = board();
        let amount = Decimal::from(15_000);
        assert_eq!(b.to_usd(amount, Quote::Usdt), amount);
        assert_eq!(b.to_usd(amount, Quote::Usd), amount);
        assert_eq!(b.to_usd(amount, Quote::Usdc), amount);
    }

    #[test]
    fn fiat_quotes_convert() {
        let b = board();
        assert_eq!(
            b.to_usd(Decimal::from(1_000_000), Quote::Krw),
            Decimal::from_str("720").unwrap()
        );
        assert_eq!(
            b.to_usd(Decimal::from(50_000), Quote::Brl),
            Decimal::from(10_000)
        );
        assert_eq!(
            b.to_usd(Decimal::from(1_000), Quote::Eur),
            Decimal::from(1_080)
        );
    }

    #[test]
    fn crypto_and_unknown_quotes_are_zero() {
        let b = board();
        assert_eq!(b.to_usd(Decimal::from(5), Quote::Btc), Decimal::ZERO);
        assert_eq!(b.to_usd(Decimal::from(5), Quote::Unknown), Decimal::ZERO);
    }

    #[tokio::test]
    async fn shutdown_stops_refresher_before_next_tick() {
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        // Lazy pool pointed at a closed port; a first-tick refresh attempt
        // fails fast instead of connecting anywhere.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://127.0.0.1:1/none")
            .unwrap();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();

        let handle = tokio::spawn(run_rate_refresher(
            board(),
            pool,
            http,
            Duration::from_secs(3600),
            shutdown_rx,
        ));
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("refresher kept running past shutdown")
            .unwrap();
    }

    #[test]
    fn store_replaces_snapshot() {
        let b = board();
        let mut snap = (*b.snapshot()).clone();
        snap.chz_usd = Decimal::from_str("0.25").unwrap();
        b.store(snap);
        assert_eq!(b.chz_usd(), Decimal::from_str("0.25").unwrap());
    }
}
