use rihla_core::{Currency, PriceSnapshot, ResourceKind, ResourceRef};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub kafka: Option<KafkaConfig>,
    pub auth: AuthConfig,
    #[serde(default)]
    pub booking: BookingRules,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
    /// Resources registered with the inventory backend at startup.
    #[serde(default)]
    pub seed: Vec<SeedResource>,
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
    #[serde(default)]
    pub min_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,
    /// Idle connections are kept forever when unset.
    #[serde(default)]
    pub idle_timeout_seconds: Option<u64>,
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> u64 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingRules {
    /// Collision retries for booking references and transaction ids.
    pub reference_attempts: usize,
    pub default_currency: Currency,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            reference_attempts: rihla_core::ids::DEFAULT_ID_ATTEMPTS,
            default_currency: Currency::Sar,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub requests: i64,
    pub window_seconds: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 100,
            window_seconds: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SettlementConfig {
    pub failure_threshold: usize,
    pub reset_timeout_seconds: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeedResource {
    pub kind: ResourceKind,
    pub id: uuid::Uuid,
    pub title: String,
    pub capacity: u32,
    pub price: PriceSnapshot,
}

impl SeedResource {
    pub fn resource(&self) -> ResourceRef {
        ResourceRef::new(self.kind, self.id)
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // RIHLA__DATABASE__URL=... sets database.url
            .add_source(config::Environment::with_prefix("RIHLA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
