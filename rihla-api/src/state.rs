use rihla_core::notify::BroadcastNotifier;
use rihla_core::Currency;
use rihla_order::ReservationOrchestrator;
use rihla_store::RedisClient;
use std::sync::Arc;

use crate::metrics::ApiMetrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone, Copy)]
pub struct RateLimit {
    pub requests: i64,
    pub window_seconds: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ReservationOrchestrator>,
    /// Rate limiting is skipped when unset.
    pub redis: Option<Arc<RedisClient>>,
    /// Feeds `/v1/events`.
    pub events: BroadcastNotifier,
    pub metrics: Arc<ApiMetrics>,
    pub auth: AuthConfig,
    pub rate_limit: RateLimit,
    pub default_currency: Currency,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<ReservationOrchestrator>,
        events: BroadcastNotifier,
        metrics: Arc<ApiMetrics>,
        jwt_secret: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator,
            redis: None,
            events,
            metrics,
            auth: AuthConfig {
                secret: jwt_secret.into(),
            },
            rate_limit: RateLimit {
                requests: 100,
                window_seconds: 60,
            },
            default_currency: Currency::Sar,
        }
    }

    pub fn with_redis(mut self, redis: Arc<RedisClient>, rate_limit: RateLimit) -> Self {
        self.redis = Some(redis);
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_default_currency(mut self, currency: Currency) -> Self {
        self.default_currency = currency;
        self
    }
}
