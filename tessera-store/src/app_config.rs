use serde::Deserialize;
use std::env;
use tessera_core::ReservationPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub database: Option<DatabaseConfig>,
    pub redis: Option<RedisConfig>,
    pub kafka: Option<KafkaConfig>,
    pub auth: AuthConfig,
    #[serde(default)]
    pub reservation: ReservationConfig,
    #[serde(default)]
    pub payment: PaymentConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Seats and users created at startup by the memory backend
    #[serde(default)]
    pub demo_seats: u32,
    #[serde(default)]
    pub demo_users: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReservationConfig {
    #[serde(default = "default_holding_window")]
    pub holding_window_seconds: u64,
    #[serde(default = "default_max_seats")]
    pub max_seats_per_user: usize,
    #[serde(default = "default_reserve_timeout")]
    pub reserve_timeout_ms: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_holding_window() -> u64 { 900 }
fn default_max_seats() -> usize { 5 }
fn default_reserve_timeout() -> u64 { 3000 }
fn default_sweep_interval() -> u64 { 60 }

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            holding_window_seconds: default_holding_window(),
            max_seats_per_user: default_max_seats(),
            reserve_timeout_ms: default_reserve_timeout(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

/// Upper bound for the holding window: one week
const MAX_HOLDING_WINDOW_SECONDS: u64 = 7 * 24 * 60 * 60;
/// Upper bound for the reserve deadline: one minute
const MAX_RESERVE_TIMEOUT_MS: u64 = 60_000;

impl ReservationConfig {
    /// Rejects values that would make every reservation fail or overflow the window arithmetic.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if !(1..=MAX_HOLDING_WINDOW_SECONDS).contains(&self.holding_window_seconds) {
            return Err(config::ConfigError::Message(format!(
                "reservation.holding_window_seconds must be between 1 and {}, got {}",
                MAX_HOLDING_WINDOW_SECONDS, self.holding_window_seconds
            )));
        }
        if !(1..=MAX_RESERVE_TIMEOUT_MS).contains(&self.reserve_timeout_ms) {
            return Err(config::ConfigError::Message(format!(
                "reservation.reserve_timeout_ms must be between 1 and {}, got {}",
                MAX_RESERVE_TIMEOUT_MS, self.reserve_timeout_ms
            )));
        }
        if self.max_seats_per_user == 0 {
            return Err(config::ConfigError::Message(
                "reservation.max_seats_per_user must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn policy(&self) -> ReservationPolicy {
        ReservationPolicy {
            holding_window: chrono::Duration::seconds(self.holding_window_seconds as i64),
            max_seats_per_user: self.max_seats_per_user,
            reserve_timeout: std::time::Duration::from_millis(self.reserve_timeout_ms),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PaymentConfig {
    /// Gateway base URL. Empty means the mock gateway is used.
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub server_key: String,
    pub finish_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 10 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_rate_limit")]
    pub requests_per_minute: i64,
}

fn default_rate_limit() -> i64 { 100 }

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Untracked local overrides
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `TESSERA_RESERVATION__MAX_SEATS_PER_USER=2`
            .add_source(config::Environment::with_prefix("TESSERA").separator("__").try_parsing(true))
            .build()?;

        let cfg: Self = s.try_deserialize()?;
        cfg.reservation.validate()?;
        Ok(cfg)
    }
}
