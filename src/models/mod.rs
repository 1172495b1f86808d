use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Venue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Venue {
    Binance,
    Okx,
    Htx,
    Kucoin,
    Bybit,
    Gateio,
    Mexc,
    Upbit,
    Kraken,
    Coinbase,
    MercadoBitcoin,
    FanxDex,
}

impl Venue {
    /// Every venue, streaming exchanges first, the DEX last.
    pub const ALL: [Venue; 12] = [
        Venue::Binance,
        Venue::Okx,
        Venue::Htx,
        Venue::Kucoin,
        Venue::Bybit,
        Venue::Gateio,
        Venue::Mexc,
        Venue::Upbit,
        Venue::Kraken,
        Venue::Coinbase,
        Venue::MercadoBitcoin,
        Venue::FanxDex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::Binance => "binance",
            Venue::Okx => "okx",
            Venue::Htx => "htx",
            Venue::Kucoin => "kucoin",
            Venue::Bybit => "bybit",
            Venue::Gateio => "gateio",
            Venue::Mexc => "mexc",
            Venue::Upbit => "upbit",
            Venue::Kraken => "kraken",
            Venue::Coinbase => "coinbase",
            Venue::MercadoBitcoin => "mercadobitcoin",
            Venue::FanxDex => "fanx_dex",
        }
    }

    pub fn from_config_str(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Venue::ALL.into_iter().find(|v| v.as_str() == s)
    }

    pub fn is_dex(&self) -> bool {
        matches!(self, Venue::FanxDex)
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// Trade direction from the taker's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn from_api_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BUY" | "BID" | "B" | "1" => Some(Side::Buy),
            "SELL" | "ASK" | "S" | "2" => Some(Side::Sell),
            _ => None,
        }
    }

    pub fn invert(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TradeEvent — canonical pipeline message
// ---------------------------------------------------------------------------

/// The single normalized event shape produced by every venue adapter and
/// the on-chain swap poller. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    pub venue: Venue,
    /// Normalized token symbol; `None` means the venue pair could not be
    /// mapped ("unresolved"). Unresolved events still reach the sink but
    /// are excluded from whale filtering.
    pub token_symbol: Option<String>,
    /// Venue-native pair/market string, retained for audit.
    pub raw_pair: String,
    pub side: Side,
    /// Venue-native units.
    pub price: Decimal,
    pub quantity: Decimal,
    /// USD notional computed at ingestion time. Only ever used for
    /// filtering/ranking, never as an authoritative cross-venue price.
    pub value_usd: Decimal,
    /// True if the event is a taker-initiated fill. Venues that don't
    /// expose this default to true.
    pub is_aggressor: bool,
    /// Venue-assigned trade id; tx hash + log index for DEX swaps.
    pub venue_trade_id: String,
    /// Ingestion-side clock, UTC.
    pub observed_at: DateTime<Utc>,
    /// Opaque venue-specific fields, never interpreted downstream.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TradeEvent {
    pub fn is_resolved(&self) -> bool {
        self.token_symbol.is_some()
    }
}

impl fmt::Display for TradeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} pair={} value_usd={} id={}",
            self.venue,
            self.side,
            self.token_symbol.as_deref().unwrap_or("unresolved"),
            self.raw_pair,
            self.value_usd,
            self.venue_trade_id,
        )
    }
}

// ---------------------------------------------------------------------------
// Database rows
// ---------------------------------------------------------------------------

/// Row in cex_whale_trades.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CexWhaleTrade {
    pub id: Uuid,
    pub venue: String,
    pub token_symbol: Option<String>,
    pub raw_pair: String,
    pub side: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub value_usd: Decimal,
    pub is_aggressor: bool,
    pub venue_trade_id: String,
    pub observed_at: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Row in dex_whale_swaps.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DexWhaleSwap {
    pub id: Uuid,
    pub tx_hash: String,
    pub log_index: i64,
    pub block_number: i64,
    pub pool_address: String,
    pub token_symbol: Option<String>,
    pub side: String,
    pub amount: Decimal,
    pub value_usd: Decimal,
    pub observed_at: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn venue_round_trips_through_config_strings() {
        for venue in Venue::ALL {
            assert_eq!(Venue::from_config_str(venue.as_str()), Some(venue));
        }
        assert_eq!(Venue::from_config_str(" Binance "), Some(Venue::Binance));
        assert_eq!(Venue::from_config_str("ftx"), None);
    }

    #[test]
    fn side_parses_venue_spellings() {
        assert_eq!(Side::from_api_str("buy"), Some(Side::Buy));
        assert_eq!(Side::from_api_str("Sell"), Some(Side::Sell));
        assert_eq!(Side::from_api_str("BID"), Some(Side::Buy));
        assert_eq!(Side::from_api_str("ASK"), Some(Side::Sell));
        assert_eq!(Side::from_api_str("hold"), None);
    }

    #[test]
    fn side_inversion() {
        assert_eq!(Side::Buy.invert(), Side::Sell);
        assert_eq!(Side::Sell.invert(), Side::Buy);
    }
}
