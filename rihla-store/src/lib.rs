pub mod app_config;
pub mod database;
pub mod inventory_repo;
pub mod redis_repo;
#[cfg(feature = "kafka")]
pub mod events;

pub use database::DbClient;
pub use inventory_repo::{PgCatalog, PgInventoryLedger};
pub use redis_repo::RedisClient;
#[cfg(feature = "kafka")]
pub use events::EventProducer;
