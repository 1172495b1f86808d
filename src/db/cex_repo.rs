use sqlx::PgPool;

use crate::models::{CexWhaleTrade, TradeEvent};

/// Insert a whale trade from a centralized exchange.
///
/// Returns `false` when the (venue, venue_trade_id) pair was already stored,
/// which happens routinely after reconnects replay recent trades.
pub async fn insert_cex_trade(pool: &PgPool, event: &TradeEvent) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO cex_whale_trades
            (venue, token_symbol, raw_pair, side, price, quantity,
             value_usd, is_aggressor, venue_trade_id, observed_at, extra)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (venue, venue_trade_id) DO NOTHING
        "#,
    )
    .bind(event.venue.as_str())
    .bind(&event.token_symbol)
    .bind(&event.raw_pair)
    .bind(event.side.as_str())
    .bind(event.price)
    .bind(event.quantity)
    .bind(event.value_usd)
    .bind(event.is_aggressor)
    .bind(&event.venue_trade_id)
    .bind(event.observed_at)
    .bind(serde_json::Value::Object(event.extra.clone()))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Most recent stored CEX whale trades, newest first.
pub async fn get_recent_cex_trades(
    pool: &PgPool,
    limit: i64,
) -> anyhow::Result<Vec<CexWhaleTrade>> {
    let trades = sqlx::query_as::<_, CexWhaleTrade>(
        r#"
        SELECT id, venue, token_symbol, raw_pair, side, price, quantity,
               value_usd, is_aggressor, venue_trade_id, observed_at, created_at
        FROM cex_whale_trades
        ORDER BY observed_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(trades)
}

/// Count of stored trades for one venue, used by tests and ops queries.
pub async fn count_cex_trades_for_venue(pool: &PgPool, venue: &str) -> anyhow::Result<i64> {
    let count: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM cex_whale_trades WHERE venue = $1")
            .bind(venue)
            .fetch_one(pool)
            .await?;

    Ok(count.0)
}
