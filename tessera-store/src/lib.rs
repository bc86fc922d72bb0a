pub mod app_config;
pub mod database;
pub mod events;
pub mod memory_repo;
pub mod redis_repo;
pub mod reservation_repo;
pub mod snap_gateway;

pub use database::DbClient;
pub use events::EventProducer;
pub use memory_repo::MemoryStore;
pub use redis_repo::RedisClient;
pub use reservation_repo::PgReservationStore;
pub use snap_gateway::SnapGateway;

use tessera_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        CoreError::StorageError(err.to_string())
    }
}

pub(crate) fn db_err(err: sqlx::Error) -> CoreError {
    StoreError::from(err).into()
}
