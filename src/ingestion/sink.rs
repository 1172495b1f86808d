//! Fan-out for accepted events: bounded in-memory cache plus an async
//! persistence queue. The cache update is synchronous and never blocks;
//! persistence is decoupled behind a bounded channel so a slow database
//! back-pressures into drops instead of stalling adapters.

use parking_lot::RwLock;
use sqlx::PgPool;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::db::{cex_repo, dex_repo};
use crate::models::TradeEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Cex,
    Dex,
}

/// Bounded ring of the most recent accepted events, newest first.
#[derive(Clone)]
pub struct RecentCache {
    capacity: usize,
    cex: Arc<RwLock<VecDeque<TradeEvent>>>,
    dex: Arc<RwLock<VecDeque<TradeEvent>>>,
}

impl RecentCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            cex: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            dex: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
        }
    }

    pub fn push(&self, event: TradeEvent) {
        let lane = if event.venue.is_dex() { &self.dex } else { &self.cex };
        let mut guard = lane.write();
        guard.push_front(event);
        guard.truncate(self.capacity);
    }

    /// Up to `limit` most recent events, newest first.
    pub fn snapshot(&self, kind: CacheKind, limit: usize) -> Vec<TradeEvent> {
        let lane = match kind {
            CacheKind::Cex => &self.cex,
            CacheKind::Dex => &self.dex,
        };
        lane.read().iter().take(limit).cloned().collect()
    }

    pub fn len(&self, kind: CacheKind) -> usize {
        match kind {
            CacheKind::Cex => self.cex.read().len(),
            CacheKind::Dex => self.dex.read().len(),
        }
    }
}

/// Entry point the pipeline hands accepted events to.
#[derive(Clone)]
pub struct EventSink {
    cache: RecentCache,
    persist_tx: mpsc::Sender<TradeEvent>,
}

impl EventSink {
    pub fn new(cache: RecentCache, persist_tx: mpsc::Sender<TradeEvent>) -> Self {
        Self { cache, persist_tx }
    }

    /// Cache the event and queue it for persistence. When the persistence
    /// queue is full the event is dropped from persistence only; the cache
    /// still reflects it.
    pub fn submit(&self, event: TradeEvent) {
        self.cache.push(event.clone());

        if let Err(e) = self.persist_tx.try_send(event) {
            metrics::counter!("sink_queue_dropped_total").increment(1);
            tracing::warn!(error = %e, "persistence queue full, dropping event");
        }
    }
}

/// Drain the persistence queue into postgres. Exits when every sender has
/// been dropped, i.e. on shutdown.
pub async fn run_writer(pool: PgPool, mut persist_rx: mpsc::Receiver<TradeEvent>) {
    while let Some(event) = persist_rx.recv().await {
        let inserted = if event.venue.is_dex() {
            dex_repo::insert_dex_swap(&pool, &event).await
        } else {
            cex_repo::insert_cex_trade(&pool, &event).await
        };

        match inserted {
            Ok(true) => {}
            Ok(false) => {
                metrics::counter!("persist_duplicates_total").increment(1);
                tracing::debug!(
                    venue = %event.venue,
                    trade_id = %event.venue_trade_id,
                    "duplicate event skipped"
                );
            }
            Err(e) => {
                metrics::counter!("persist_failures_total").increment(1);
                tracing::error!(
                    venue = %event.venue,
                    trade_id = %event.venue_trade_id,
                    error = %e,
                    "failed to persist whale event"
                );
            }
        }
    }

    tracing::info!("persistence writer stopped");
}
