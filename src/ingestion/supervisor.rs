//! Per-venue connection supervision. Each adapter runs in its own task; a
//! failure tears down only that venue's connection and the supervisor
//! reconnects after a fixed delay. One misbehaving venue never affects the
//! others.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::models::TradeEvent;
use crate::venues::VenueAdapter;

/// Lifecycle of one adapter's connection. The adapter's run reports its
/// progression through a watch channel; the supervisor owns the channel and
/// uses the last reported state when logging failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Subscribed,
    Streaming,
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnState::Disconnected => "disconnected",
            ConnState::Connecting => "connecting",
            ConnState::Subscribed => "subscribed",
            ConnState::Streaming => "streaming",
        };
        f.write_str(s)
    }
}

/// Spawn one supervised task per adapter.
pub fn spawn_adapters(
    adapters: Vec<Arc<dyn VenueAdapter>>,
    tx: mpsc::Sender<TradeEvent>,
    shutdown: watch::Receiver<bool>,
    reconnect_delay: Duration,
) -> Vec<JoinHandle<()>> {
    adapters
        .into_iter()
        .map(|adapter| {
            let tx = tx.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(supervise(adapter, tx, shutdown, reconnect_delay))
        })
        .collect()
}

async fn supervise(
    adapter: Arc<dyn VenueAdapter>,
    tx: mpsc::Sender<TradeEvent>,
    mut shutdown: watch::Receiver<bool>,
    reconnect_delay: Duration,
) {
    let venue = adapter.venue();
    let (state_tx, state_rx) = watch::channel(ConnState::Disconnected);

    loop {
        if *shutdown.borrow() {
            break;
        }

        match adapter.run(tx.clone(), shutdown.clone(), state_tx.clone()).await {
            Ok(()) => {
                // Clean return only happens on shutdown.
                break;
            }
            Err(e) => {
                let failed_in = *state_rx.borrow();
                let _ = state_tx.send(ConnState::Disconnected);
                metrics::counter!("adapter_restarts_total", "venue" => venue.as_str())
                    .increment(1);
                tracing::error!(
                    venue = %venue,
                    error = %e,
                    state = %failed_in,
                    delay_secs = reconnect_delay.as_secs(),
                    "adapter failed, reconnecting"
                );
            }
        }

        // Sleep the reconnect delay, but wake immediately on shutdown.
        tokio::select! {
            _ = tokio::time::sleep(reconnect_delay) => {}
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!(venue = %venue, "adapter supervisor stopped");
}
