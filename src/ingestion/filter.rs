//! Whale threshold decision, kept pure so it is trivially testable.

use rust_decimal::Decimal;

use crate::models::TradeEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Resolved token at or above the USD threshold: cache and persist.
    Pass,
    /// Resolved token under the threshold: drop.
    BelowThreshold,
    /// Pair could not be mapped to a tracked token: persist for audit but
    /// never rank or count as a whale trade.
    Unresolved,
}

pub fn evaluate(event: &TradeEvent, threshold_usd: Decimal) -> Verdict {
    if !event.is_resolved() {
        return Verdict::Unresolved;
    }
    if event.value_usd >= threshold_usd {
        Verdict::Pass
    } else {
        Verdict::BelowThreshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Side, Venue};
    use chrono::Utc;
    use std::str::FromStr;

    fn event(token: Option<&str>, value_usd: &str) -> TradeEvent {
        TradeEvent {
            venue: Venue::Binance,
            token_symbol: token.map(str::to_string),
            raw_pair: "CHZUSDT".to_string(),
            side: Side::Buy,
            price: Decimal::from_str("0.10").unwrap(),
            quantity: Decimal::from(100),
            value_usd: Decimal::from_str(value_usd).unwrap(),
            is_aggressor: true,
            venue_trade_id: "1".to_string(),
            observed_at: Utc::now(),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn exactly_at_threshold_passes() {
        let threshold = Decimal::from(10_000);
        assert_eq!(evaluate(&event(Some("CHZ"), "10000"), threshold), Verdict::Pass);
        assert_eq!(evaluate(&event(Some("CHZ"), "15000"), threshold), Verdict::Pass);
    }

    #[test]
    fn below_threshold_is_dropped() {
        let threshold = Decimal::from(10_000);
        assert_eq!(
            evaluate(&event(Some("CHZ"), "9999.99"), threshold),
            Verdict::BelowThreshold
        );
        assert_eq!(
            evaluate(&event(Some("CHZ"), "0"), threshold),
            Verdict::BelowThreshold
        );
    }

    #[test]
    fn unresolved_wins_over_value() {
        let threshold = Decimal::from(10_000);
        assert_eq!(
            evaluate(&event(None, "50000"), threshold),
            Verdict::Unresolved
        );
    }
}
