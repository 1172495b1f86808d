use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

/// Record a spot price observation for a symbol.
pub async fn insert_price_tick(
    pool: &PgPool,
    symbol: &str,
    price: Decimal,
    time: DateTime<Utc>,
) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO price_ticks (symbol, price, time) VALUES ($1, $2, $3)")
        .bind(symbol)
        .bind(price)
        .bind(time)
        .execute(pool)
        .await?;

    Ok(())
}

/// Latest recorded price for a symbol, if any.
pub async fn get_latest_price(pool: &PgPool, symbol: &str) -> anyhow::Result<Option<Decimal>> {
    let row: Option<(Decimal,)> = sqlx::query_as(
        "SELECT price FROM price_ticks WHERE symbol = $1 ORDER BY time DESC LIMIT 1",
    )
    .bind(symbol)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(p,)| p))
}
