use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;
use serde_json::Value;

use crate::app_config::ReservationConfig;
use crate::StoreError;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    rule_key: String,
    rule_value: Value,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Operators can override the reservation rules at runtime through the
    /// `reservation_rules` table. Rows look like `{"value": <number>}`.
    pub async fn fetch_reservation_rules(&self, defaults: ReservationConfig) -> Result<ReservationConfig, StoreError> {
        let rows: Vec<RuleRow> = sqlx::query_as("SELECT rule_key, rule_value FROM reservation_rules")
            .fetch_all(&self.pool)
            .await?;

        let mut rules = defaults;

        for row in rows {
            let Some(v) = row.rule_value.get("value") else {
                continue;
            };
            match row.rule_key.as_str() {
                "holding_window_seconds" => {
                    if let Some(u) = v.as_u64() {
                        rules.holding_window_seconds = u;
                    }
                }
                "max_seats_per_user" => {
                    if let Some(u) = v.as_u64() {
                        rules.max_seats_per_user = u as usize;
                    }
                }
                "reserve_timeout_ms" => {
                    if let Some(u) = v.as_u64() {
                        rules.reserve_timeout_ms = u;
                    }
                }
                other => info!("Ignoring unknown reservation rule {}", other),
            }
        }

        rules.validate()?;
        Ok(rules)
    }
}
