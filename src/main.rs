use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use whaletrack::config::AppConfig;
use whaletrack::db;
use whaletrack::ingestion::dex_poller::{run_dex_poller, DexPollerConfig};
use whaletrack::ingestion::pipeline::run_pipeline;
use whaletrack::ingestion::rates::{run_rate_refresher, RateBoard};
use whaletrack::ingestion::sink::{run_writer, EventSink, RecentCache};
use whaletrack::ingestion::supervisor::spawn_adapters;
use whaletrack::models::{TradeEvent, Venue};
use whaletrack::symbols::SymbolTable;
use whaletrack::venues::{build_adapters, NormalizeCtx};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = db::init_pool(&config.database_url).await?;
    tracing::info!("Database connected");

    let symbols = Arc::new(SymbolTable::new());
    let rates = RateBoard::from_config(&config);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Rate refresher keeps CHZ/USD and BRL/USD current in the background.
    let rate_handle = {
        let rates = rates.clone();
        let pool = pool.clone();
        let interval = config.price_refresh_interval;
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            run_rate_refresher(rates, pool, reqwest::Client::new(), interval, shutdown).await;
        })
    };

    // Sink: bounded recent cache + async persistence writer.
    let cache = RecentCache::new(config.recent_cache_capacity);
    let (persist_tx, persist_rx) = mpsc::channel::<TradeEvent>(1000);
    let sink = EventSink::new(cache.clone(), persist_tx);
    let writer = tokio::spawn(run_writer(pool.clone(), persist_rx));

    // Pipeline: adapters and the DEX poller feed one channel.
    let (events_tx, events_rx) = mpsc::channel::<TradeEvent>(1000);
    let pipeline = tokio::spawn(run_pipeline(events_rx, sink, config.whale_threshold_usd));

    let ctx = NormalizeCtx::new(symbols, rates.clone());
    let adapters = build_adapters(&config, ctx);
    tracing::info!(venue_count = adapters.len(), "starting exchange adapters");
    let adapter_handles = spawn_adapters(
        adapters,
        events_tx.clone(),
        shutdown_rx.clone(),
        config.reconnect_delay,
    );

    let dex_handle = if config.venues.contains(&Venue::FanxDex) {
        let dex_config = DexPollerConfig {
            rpc_url: config.chiliz_rpc_url.clone(),
            poll_interval: config.dex_poll_interval,
            block_chunk: config.dex_block_chunk,
        };
        Some(tokio::spawn(run_dex_poller(
            dex_config,
            rates.clone(),
            events_tx.clone(),
            shutdown_rx.clone(),
        )))
    } else {
        None
    };

    // The pipeline's sender lives in the spawned tasks from here on.
    drop(events_tx);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, draining...");
    shutdown_tx.send(true).ok();

    let drain = async {
        for handle in adapter_handles {
            let _ = handle.await;
        }
        if let Some(handle) = dex_handle {
            let _ = handle.await;
        }
        // Once every producer has exited, the pipeline drains and the
        // writer flushes what remains in the persistence queue.
        let _ = pipeline.await;
        let _ = writer.await;
        let _ = rate_handle.await;
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        tracing::warn!(
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "shutdown grace period elapsed, exiting"
        );
    }

    tracing::info!("Goodbye");
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();
}
