use async_trait::async_trait;
use rihla_shared::DomainEvent;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Sink for lifecycle notifications. Delivery and formatting belong to the sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &DomainEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Writes events to the tracing log only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &DomainEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!(topic = event.topic(), key = %event.key(), "Domain event emitted");
        Ok(())
    }
}

/// In-process fan-out, used by the SSE stream.
#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<DomainEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn notify(&self, event: &DomainEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // No subscribers is not an error
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}

/// Forwards every event to each inner notifier; the first failure is reported
/// after all of them have been tried.
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(sinks: Vec<Arc<dyn Notifier>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn notify(&self, event: &DomainEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.notify(event).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rihla_shared::models::events::BookingCancelledEvent;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_broadcast_reaches_subscriber() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe();
        let fanout = FanoutNotifier::new(vec![Arc::new(LogNotifier), Arc::new(notifier.clone())]);

        let event = DomainEvent::BookingCancelled(BookingCancelledEvent {
            booking_id: Uuid::new_v4(),
            reference: "BK1".to_string(),
            cancelled_by: "user-1".to_string(),
            released_quantity: 1,
            timestamp: 0,
        });
        fanout.notify(&event).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), event);
    }
}
