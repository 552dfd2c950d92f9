use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingConfirmedEvent {
    pub booking_id: Uuid,
    pub reference: String,
    pub user_id: String,
    pub resource_kind: String,
    pub resource_id: Uuid,
    pub quantity: u32,
    pub total_sar: Decimal,
    pub total_usd: Decimal,
    pub transaction_id: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub reference: String,
    pub cancelled_by: String,
    pub released_quantity: u32,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct RefundCompletedEvent {
    pub refund_id: Uuid,
    pub booking_id: Uuid,
    pub payment_id: Uuid,
    pub reference: String,
    pub amount_sar: Decimal,
    pub amount_usd: Decimal,
    pub processed_by: String,
    pub timestamp: i64,
}

/// Notifications emitted after a lifecycle transition has been committed.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    BookingConfirmed(BookingConfirmedEvent),
    BookingCancelled(BookingCancelledEvent),
    RefundCompleted(RefundCompletedEvent),
}

impl DomainEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            DomainEvent::BookingConfirmed(_) => "booking.confirmed",
            DomainEvent::BookingCancelled(_) => "booking.cancelled",
            DomainEvent::RefundCompleted(_) => "refund.completed",
        }
    }

    /// Partition key: events of one booking stay ordered.
    pub fn key(&self) -> String {
        match self {
            DomainEvent::BookingConfirmed(e) => e.booking_id.to_string(),
            DomainEvent::BookingCancelled(e) => e.booking_id.to_string(),
            DomainEvent::RefundCompleted(e) => e.booking_id.to_string(),
        }
    }
}
