use anyhow::Context;
use rihla_api::{
    app,
    metrics::ApiMetrics,
    state::{AppState, RateLimit},
};
use rihla_catalog::{Listing, MemoryCatalog, MemoryInventoryLedger};
use rihla_core::ids::TimeOrderedGenerator;
use rihla_core::notify::{BroadcastNotifier, FanoutNotifier, LogNotifier, Notifier};
use rihla_core::payment::InstantSettlement;
use rihla_core::{Catalog, InventoryLedger};
use rihla_order::{GuardedGateway, OrderBook, ReservationOrchestrator};
use rihla_store::app_config::Config;
use rihla_store::{DbClient, PgCatalog, PgInventoryLedger, RedisClient};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rihla_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Rihla API on port {}", config.server.port);

    // Inventory and catalog backend
    let (inventory, catalog): (Arc<dyn InventoryLedger>, Arc<dyn Catalog>) = match &config.database {
        Some(database) => {
            let db = DbClient::connect(database)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            let ledger = PgInventoryLedger::new(db.pool.clone());
            for seed in &config.seed {
                ledger
                    .register(seed.resource(), &seed.title, seed.capacity, seed.price)
                    .await
                    .with_context(|| format!("Failed to seed {}", seed.resource()))?;
            }
            tracing::info!("Using Postgres inventory ledger");
            (Arc::new(ledger), Arc::new(PgCatalog::new(db.pool.clone())))
        }
        None => {
            let ledger = Arc::new(MemoryInventoryLedger::new());
            let catalog = Arc::new(MemoryCatalog::new(ledger.clone()));
            for seed in &config.seed {
                catalog
                    .add(Listing::new(seed.resource(), seed.title.clone(), seed.price), seed.capacity)
                    .with_context(|| format!("Failed to seed {}", seed.resource()))?;
            }
            tracing::info!(resources = config.seed.len(), "Using in-memory inventory ledger");
            (ledger, catalog)
        }
    };

    // Notification sinks
    let events = BroadcastNotifier::new(256);
    #[allow(unused_mut)]
    let mut sinks: Vec<Arc<dyn Notifier>> = vec![Arc::new(LogNotifier), Arc::new(events.clone())];
    #[cfg(feature = "kafka")]
    {
        if let Some(kafka) = &config.kafka {
            let producer =
                rihla_store::EventProducer::new(&kafka.brokers).context("Failed to create Kafka producer")?;
            sinks.push(Arc::new(producer));
        }
    }
    #[cfg(not(feature = "kafka"))]
    {
        if config.kafka.is_some() {
            tracing::warn!("Kafka brokers configured but the kafka feature is disabled");
        }
    }

    let gateway = GuardedGateway::new(
        InstantSettlement,
        config.settlement.failure_threshold,
        Duration::from_secs(config.settlement.reset_timeout_seconds),
    );
    let book = OrderBook::with_generator(Arc::new(TimeOrderedGenerator), config.booking.reference_attempts);
    let orchestrator = ReservationOrchestrator::new(inventory, catalog, Arc::new(book))
        .with_gateway(Arc::new(gateway))
        .with_notifier(Arc::new(FanoutNotifier::new(sinks)));

    let metrics = ApiMetrics::new().context("Failed to register metrics")?;
    let mut app_state = AppState::new(
        Arc::new(orchestrator),
        events,
        Arc::new(metrics),
        config.auth.jwt_secret.clone(),
    )
    .with_default_currency(config.booking.default_currency);

    // Redis Connection
    if let Some(redis) = &config.redis {
        let redis_client = RedisClient::new(&redis.url)
            .await
            .context("Failed to connect to Redis")?;
        app_state = app_state.with_redis(
            Arc::new(redis_client),
            RateLimit {
                requests: config.rate_limit.requests,
                window_seconds: config.rate_limit.window_seconds,
            },
        );
    }

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
