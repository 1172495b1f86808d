use anyhow::Context;
use sqlx::PgPool;

use crate::models::{DexWhaleSwap, TradeEvent};

/// Insert an on-chain whale swap.
///
/// DEX events carry `tx_hash:log_index` as their trade id and keep the pool
/// address and block number in `extra`. Returns `false` for duplicates, which
/// happen whenever the poll window overlaps a previously scanned range.
pub async fn insert_dex_swap(pool: &PgPool, event: &TradeEvent) -> anyhow::Result<bool> {
    let (tx_hash, log_index) = event
        .venue_trade_id
        .rsplit_once(':')
        .context("dex trade id missing log index")?;
    let log_index: i64 = log_index.parse().context("dex log index not numeric")?;

    let pool_address = event
        .extra
        .get("pool_address")
        .and_then(|v| v.as_str())
        .context("dex event missing pool_address")?;
    let block_number = event
        .extra
        .get("block_number")
        .and_then(|v| v.as_i64())
        .context("dex event missing block_number")?;

    let result = sqlx::query(
        r#"
        INSERT INTO dex_whale_swaps
            (tx_hash, log_index, block_number, pool_address, token_symbol,
             side, amount, value_usd, observed_at, extra)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (tx_hash, log_index) DO NOTHING
        "#,
    )
    .bind(tx_hash)
    .bind(log_index)
    .bind(block_number)
    .bind(pool_address)
    .bind(&event.token_symbol)
    .bind(event.side.as_str())
    .bind(event.quantity)
    .bind(event.value_usd)
    .bind(event.observed_at)
    .bind(serde_json::Value::Object(event.extra.clone()))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Most recent stored DEX whale swaps, newest first.
pub async fn get_recent_dex_swaps(pool: &PgPool, limit: i64) -> anyhow::Result<Vec<DexWhaleSwap>> {
    let swaps = sqlx::query_as::<_, DexWhaleSwap>(
        r#"
        SELECT id, tx_hash, log_index, block_number, pool_address, token_symbol,
               side, amount, value_usd, observed_at, created_at
        FROM dex_whale_swaps
        ORDER BY observed_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(swaps)
}
