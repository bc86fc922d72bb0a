use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tessera_api::{app, metrics::Metrics, worker, AppState, AuthConfig};
use tessera_catalog::AvailabilityResolver;
use tessera_core::payment::PaymentGateway;
use tessera_core::repository::ReservationStore;
use tessera_core::SystemClock;
use tessera_order::{MockPaymentGateway, PaymentOrchestrator, ReservationCoordinator};
use tessera_store::app_config::{Config, StoreBackend};
use tessera_store::{DbClient, EventProducer, MemoryStore, PgReservationStore, RedisClient, SnapGateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tessera_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Tessera API on port {}", config.server.port);

    let mut rules = config.reservation.clone();
    let store: Arc<dyn ReservationStore> = match config.store.backend {
        StoreBackend::Postgres => {
            let db_config = config
                .database
                .as_ref()
                .context("store.backend = postgres needs a [database] section")?;
            let db = DbClient::new(&db_config.url, db_config.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            rules = db
                .fetch_reservation_rules(rules)
                .await
                .context("Failed to load reservation rules")?;
            Arc::new(PgReservationStore::new(db.pool.clone(), rules.reserve_timeout_ms))
        }
        StoreBackend::Memory => {
            tracing::warn!(
                "Using in-memory store with {} demo seats, nothing survives a restart",
                config.store.demo_seats
            );
            Arc::new(MemoryStore::seeded(config.store.demo_seats, config.store.demo_users))
        }
    };

    let policy = rules.policy();
    let clock = Arc::new(SystemClock);
    let coordinator = Arc::new(ReservationCoordinator::new(store.clone(), clock.clone(), policy));
    let resolver = Arc::new(AvailabilityResolver::new(store, clock, policy.holding_window));

    let gateway: Arc<dyn PaymentGateway> = if config.payment.base_url.is_empty() {
        tracing::warn!("No payment.base_url configured, using the mock gateway");
        Arc::new(MockPaymentGateway::new())
    } else {
        Arc::new(
            SnapGateway::new(
                &config.payment.base_url,
                &config.payment.server_key,
                config.payment.finish_url.clone(),
            )
            .context("Failed to build payment client")?,
        )
    };
    let payments = Arc::new(PaymentOrchestrator::new(gateway, coordinator.clone()));

    let (redis, rate_limit) = match &config.redis {
        Some(redis_config) => {
            let client = RedisClient::new(&redis_config.url).context("Invalid Redis URL")?;
            (Some(Arc::new(client)), redis_config.requests_per_minute)
        }
        None => (None, 0),
    };

    let kafka = match &config.kafka {
        Some(kafka_config) => Some(Arc::new(
            EventProducer::new(&kafka_config.brokers).context("Failed to create Kafka producer")?,
        )),
        None => None,
    };

    // SSE Broadcast Channel
    let (sse_tx, _) = tokio::sync::broadcast::channel(256);

    let state = AppState {
        coordinator,
        resolver,
        payments,
        redis,
        kafka,
        sse_tx,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
        metrics: Arc::new(Metrics::new().context("Failed to register metrics")?),
        rate_limit,
    };

    tokio::spawn(worker::start_expiry_worker(
        state.clone(),
        Duration::from_secs(rules.sweep_interval_seconds.max(1)),
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state).into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
