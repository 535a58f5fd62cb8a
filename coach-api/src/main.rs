use anyhow::Context;
use coach_api::events::{BroadcastPublisher, FanoutPublisher};
use coach_api::metrics::Metrics;
use coach_api::{app, worker, AppState};
use coach_core::{EventPublisher, SystemClock};
use coach_hold::{HoldSettings, SeatLockManager};
use coach_store::{
    Config, DbClient, EventProducer, PgBookingLedger, PgSeatInventory, PgSeatLockRepository,
    RedisClient,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coach_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Coach API on port {}", config.server.port);

    // Postgres
    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    // Redis, rate limiting only
    let redis = match &config.redis {
        Some(redis) => Some(Arc::new(
            RedisClient::new(&redis.url).await.context("Failed to connect to Redis")?,
        )),
        None => {
            tracing::info!("No Redis configured, rate limiting disabled");
            None
        }
    };

    // SSE Broadcast Channel
    let (sse_tx, _) = broadcast::channel(100);

    let mut sinks: Vec<Arc<dyn EventPublisher>> = vec![Arc::new(BroadcastPublisher::new(sse_tx.clone()))];
    if let Some(kafka) = &config.kafka {
        let producer = EventProducer::new(&kafka.brokers).context("Failed to create Kafka producer")?;
        sinks.push(Arc::new(producer));
    }

    let settings = HoldSettings {
        default_ttl_seconds: config.holds.default_ttl_seconds,
        max_ttl_seconds: config.holds.max_ttl_seconds,
    };
    let holds = Arc::new(
        SeatLockManager::new(
            Arc::new(PgSeatInventory::new(db.pool.clone())),
            Arc::new(PgBookingLedger::new(db.pool.clone())),
            Arc::new(PgSeatLockRepository::new(db.pool.clone())),
            Arc::new(SystemClock),
            settings,
        )
        .with_events(Arc::new(FanoutPublisher::new(sinks))),
    );

    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = if config.holds.sweep_interval_seconds > 0 {
        Some(tokio::spawn(worker::start_sweeper(
            holds.clone(),
            metrics.clone(),
            Duration::from_secs(config.holds.sweep_interval_seconds),
            shutdown_rx,
        )))
    } else {
        None
    };

    let app_state = AppState {
        holds,
        redis,
        sse_tx,
        metrics,
        rate_limit: config.rate_limit.clone(),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    tracing::info!("Server stopped, waiting for the sweeper");
    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweeper {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
