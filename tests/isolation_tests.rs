use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use whaletrack::errors::{AdapterError, DecodeError};
use whaletrack::ingestion::supervisor::ConnState;
use whaletrack::models::{Side, TradeEvent, Venue};
use whaletrack::venues::{Decoded, VenueAdapter};

use chrono::Utc;
use rust_decimal::Decimal;

/// Emits one event per run, always failing afterwards, or fails straight
/// away when `healthy` is false.
struct MockAdapter {
    venue: Venue,
    healthy: bool,
}

fn mock_event(venue: Venue, id: u64) -> TradeEvent {
    TradeEvent {
        venue,
        token_symbol: Some("CHZ".to_string()),
        raw_pair: "CHZUSDT".to_string(),
        side: Side::Buy,
        price: Decimal::new(10, 2),
        quantity: Decimal::from(150_000),
        value_usd: Decimal::from(15_000),
        is_aggressor: true,
        venue_trade_id: id.to_string(),
        observed_at: Utc::now(),
        extra: serde_json::Map::new(),
    }
}

#[async_trait::async_trait]
impl VenueAdapter for MockAdapter {
    fn venue(&self) -> Venue {
        self.venue
    }

    async fn endpoint(&self) -> Result<String, AdapterError> {
        Ok("wss://unused.invalid".to_string())
    }

    fn subscribe_frames(&self) -> Vec<String> {
        Vec::new()
    }

    fn decode(&self, _payload: &[u8]) -> Result<Decoded, DecodeError> {
        Ok(Decoded::Ignore)
    }

    async fn run(
        &self,
        tx: mpsc::Sender<TradeEvent>,
        _shutdown: watch::Receiver<bool>,
        state: watch::Sender<ConnState>,
    ) -> Result<(), AdapterError> {
        let _ = state.send(ConnState::Connecting);
        if !self.healthy {
            return Err(AdapterError::ConnectionClosed);
        }
        let _ = state.send(ConnState::Streaming);
        tx.send(mock_event(self.venue, 1)).await.map_err(|_| {
            AdapterError::Other(anyhow::anyhow!("event channel closed"))
        })?;
        // Simulate the connection dropping after delivering a trade.
        Err(AdapterError::StreamEnded)
    }
}

#[tokio::test]
async fn failing_venue_does_not_stop_healthy_venue() {
    let adapters: Vec<Arc<dyn VenueAdapter>> = vec![
        Arc::new(MockAdapter { venue: Venue::Htx, healthy: false }),
        Arc::new(MockAdapter { venue: Venue::Binance, healthy: true }),
    ];

    let (tx, mut rx) = mpsc::channel(64);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handles = whaletrack::ingestion::supervisor::spawn_adapters(
        adapters,
        tx,
        shutdown_rx,
        Duration::from_millis(5),
    );

    // The healthy venue keeps delivering trades across restarts while the
    // broken one fails every attempt.
    let mut binance_events = 0;
    for _ in 0..3 {
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("healthy venue stopped producing")
            .expect("channel closed");
        assert_eq!(event.venue, Venue::Binance);
        binance_events += 1;
    }
    assert_eq!(binance_events, 3);

    shutdown_tx.send(true).unwrap();
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("supervisor did not stop on shutdown")
            .unwrap();
    }
}
