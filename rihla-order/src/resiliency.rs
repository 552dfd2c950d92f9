use async_trait::async_trait;
use rihla_core::payment::{PaymentGateway, SettlementReceipt, SettlementRequest};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,   // Normal operation
    Open,     // Failing fast
    HalfOpen, // Letting a probe through
}

pub struct CircuitBreaker {
    pub name: String,
    state: RwLock<CircuitState>,
    failure_count: AtomicUsize,
    failure_threshold: usize,
    reset_timeout: Duration,
    last_failure: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: &str, threshold: usize, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicUsize::new(0),
            failure_threshold: threshold.max(1),
            reset_timeout: timeout,
            last_failure: RwLock::new(None),
        }
    }

    pub async fn state(&self) -> CircuitState {
        *self.state.read().await
    }

    /// Whether a call may go through now.
    pub async fn check(&self) -> bool {
        let state = *self.state.read().await;
        match state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let last_fail = *self.last_failure.read().await;
                match last_fail {
                    Some(instant) if instant.elapsed() >= self.reset_timeout => {
                        let mut s = self.state.write().await;
                        *s = CircuitState::HalfOpen;
                        tracing::info!(breaker = %self.name, "Circuit breaker moving to half-open");
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        if *state == CircuitState::HalfOpen {
            tracing::info!(breaker = %self.name, "Circuit breaker recovered to closed");
        }
        *state = CircuitState::Closed;
        self.failure_count.store(0, Ordering::SeqCst);
    }

    pub async fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.write().await;

        if count >= self.failure_threshold || *state == CircuitState::HalfOpen {
            *state = CircuitState::Open;
            let mut last = self.last_failure.write().await;
            *last = Some(Instant::now());
            tracing::error!(breaker = %self.name, failures = count, "Circuit breaker tripped to open");
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("circuit breaker [{0}] is open")]
pub struct CircuitOpen(pub String);

/// Wraps a gateway with a circuit breaker.
///
/// Transport errors count as failures; a declined payment is a healthy answer and
/// counts as success. While open, `settle` returns [`CircuitOpen`] without calling
/// the inner gateway.
pub struct GuardedGateway<G> {
    inner: G,
    breaker: CircuitBreaker,
}

impl<G: PaymentGateway> GuardedGateway<G> {
    pub fn new(inner: G, failure_threshold: usize, reset_timeout: Duration) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new("payment-gateway", failure_threshold, reset_timeout),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

#[async_trait]
impl<G: PaymentGateway> PaymentGateway for GuardedGateway<G> {
    async fn settle(
        &self,
        request: &SettlementRequest,
    ) -> Result<SettlementReceipt, Box<dyn std::error::Error + Send + Sync>> {
        if !self.breaker.check().await {
            tracing::warn!(transaction_id = %request.transaction_id, "Settlement short-circuited");
            return Err(Box::new(CircuitOpen(self.breaker.name.clone())));
        }

        match self.inner.settle(request).await {
            Ok(receipt) => {
                self.breaker.record_success().await;
                Ok(receipt)
            }
            Err(e) => {
                self.breaker.record_failure().await;
                Err(e)
            }
        }
    }
}
