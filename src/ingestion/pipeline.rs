//! Central event loop: every adapter and the DEX poller feed one channel,
//! the pipeline applies the whale threshold and fans accepted events out to
//! the sink.

use rust_decimal::Decimal;
use tokio::sync::mpsc;

use crate::ingestion::filter::{self, Verdict};
use crate::ingestion::sink::EventSink;
use crate::models::TradeEvent;

pub async fn run_pipeline(
    mut events_rx: mpsc::Receiver<TradeEvent>,
    sink: EventSink,
    threshold_usd: Decimal,
) {
    tracing::info!(threshold_usd = %threshold_usd, "pipeline started");

    while let Some(event) = events_rx.recv().await {
        metrics::counter!("trade_events_total", "venue" => event.venue.as_str()).increment(1);

        match filter::evaluate(&event, threshold_usd) {
            Verdict::Pass => {
                metrics::counter!("whale_trades_total", "venue" => event.venue.as_str())
                    .increment(1);
                tracing::info!(
                    venue = %event.venue,
                    token = %event.token_symbol.as_deref().unwrap_or("?"),
                    side = %event.side,
                    value_usd = %event.value_usd,
                    pair = %event.raw_pair,
                    "whale trade"
                );
                sink.submit(event);
            }
            Verdict::Unresolved => {
                metrics::counter!("events_unresolved_total").increment(1);
                // Persisted for later symbol-table updates, never ranked.
                sink.submit(event);
            }
            Verdict::BelowThreshold => {
                metrics::counter!("events_below_threshold_total").increment(1);
                tracing::trace!(
                    venue = %event.venue,
                    value_usd = %event.value_usd,
                    "below threshold"
                );
            }
        }
    }

    tracing::info!("pipeline stopped");
}
