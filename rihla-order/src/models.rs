use chrono::{DateTime, NaiveDate, Utc};
use rihla_core::payment::SettlementOutcome;
use rihla_core::{CoreError, CoreResult, Currency, PriceSnapshot, ReservationToken, ResourceRef};
use rihla_shared::Masked;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Refunded,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Refunded => "refunded",
        }
    }

    /// The transition graph.
    ///
    /// `cancelled` accepts no further cancel or confirm, only an approved refund.
    /// `refunded` is terminal.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Confirmed, Refunded)
                | (Cancelled, Refunded)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    Requested,
    Processing,
    Completed,
    Rejected,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Requested => "requested",
            RefundStatus::Processing => "processing",
            RefundStatus::Completed => "completed",
            RefundStatus::Rejected => "rejected",
        }
    }

    fn is_open(&self) -> bool {
        matches!(self, RefundStatus::Requested | RefundStatus::Processing)
    }
}

impl fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    Amex,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Amex => "amex",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "card" => Ok(PaymentMethod::Card),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "amex" => Ok(PaymentMethod::Amex),
            other => Err(CoreError::Validation(format!("unsupported payment method '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerContact {
    pub name: String,
    pub email: Masked<String>,
    pub phone: Masked<String>,
}

/// Hotel stay, check-out strictly after check-in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StayDates {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl StayDates {
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

/// One entry of a booking's status history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusChange {
    pub from: Option<BookingStatus>,
    pub to: BookingStatus,
    pub actor: String,
    pub at: DateTime<Utc>,
}

/// A customer's reservation of one resource.
///
/// `reference`, `resource`, `quantity`, `price` and `hold` are fixed at creation; the
/// booking manager exposes no operation that rewrites them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub reference: String,
    pub user_id: String,
    pub resource: ResourceRef,
    pub quantity: u32,
    pub price: PriceSnapshot,
    pub currency: Currency,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: BookingStatus,
    pub contact: CustomerContact,
    pub special_requests: Option<String>,
    pub stay: Option<StayDates>,
    pub hold: ReservationToken,
    pub confirmation_sent: bool,
    pub ticket_issued: bool,
    pub history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub(crate) fn new(draft: BookingDraft, reference: String, hold: ReservationToken) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            reference,
            history: vec![StatusChange {
                from: None,
                to: BookingStatus::Pending,
                actor: draft.user_id.clone(),
                at: now,
            }],
            user_id: draft.user_id,
            resource: draft.resource,
            quantity: draft.quantity,
            price: draft.price,
            currency: draft.currency,
            payment_method: draft.payment_method,
            payment_status: PaymentStatus::Pending,
            status: BookingStatus::Pending,
            contact: draft.contact,
            special_requests: draft.special_requests,
            stay: draft.stay,
            hold,
            confirmation_sent: false,
            ticket_issued: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves to `next` if the graph allows it; returns the previous status.
    pub(crate) fn transition(&mut self, next: BookingStatus, actor: &str) -> CoreResult<BookingStatus> {
        let previous = self.status;
        if !previous.can_transition_to(next) {
            return Err(CoreError::transition("booking", previous, next));
        }

        let now = Utc::now();
        self.status = next;
        self.updated_at = now;
        self.history.push(StatusChange {
            from: Some(previous),
            to: next,
            actor: actor.to_string(),
            at: now,
        });
        Ok(previous)
    }

    pub(crate) fn confirm(&mut self, actor: &str) -> CoreResult<()> {
        self.transition(BookingStatus::Confirmed, actor)?;
        self.payment_status = PaymentStatus::Completed;
        self.confirmation_sent = true;
        self.ticket_issued = true;
        Ok(())
    }
}

/// Validated input for creating a booking.
#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub user_id: String,
    pub resource: ResourceRef,
    pub quantity: u32,
    pub price: PriceSnapshot,
    pub currency: Currency,
    pub payment_method: PaymentMethod,
    pub contact: CustomerContact,
    pub special_requests: Option<String>,
    pub stay: Option<StayDates>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub transaction_id: String,
    pub amount: PriceSnapshot,
    pub currency: Currency,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub gateway_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub(crate) fn new(
        booking_id: Uuid,
        transaction_id: String,
        amount: PriceSnapshot,
        currency: Currency,
        method: PaymentMethod,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id,
            transaction_id,
            amount,
            currency,
            method,
            status: PaymentStatus::Pending,
            gateway_response: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// One-way move out of `pending`.
    pub(crate) fn settle(&mut self, outcome: SettlementOutcome, response: Option<String>) -> CoreResult<()> {
        let next = match outcome {
            SettlementOutcome::Completed => PaymentStatus::Completed,
            SettlementOutcome::Failed => PaymentStatus::Failed,
        };
        if self.status != PaymentStatus::Pending {
            return Err(CoreError::transition("payment", self.status, next));
        }
        self.status = next;
        self.gateway_response = response;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub(crate) fn mark_refunded(&mut self) -> CoreResult<()> {
        if self.status != PaymentStatus::Completed {
            return Err(CoreError::transition("payment", self.status, PaymentStatus::Refunded));
        }
        self.status = PaymentStatus::Refunded;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub payment_id: Uuid,
    pub amount: PriceSnapshot,
    pub currency: Currency,
    pub reason: String,
    pub status: RefundStatus,
    pub processed_by: Option<String>,
    pub admin_notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Refund {
    pub(crate) fn new(
        booking_id: Uuid,
        payment_id: Uuid,
        amount: PriceSnapshot,
        currency: Currency,
        reason: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id,
            payment_id,
            amount,
            currency,
            reason,
            status: RefundStatus::Requested,
            processed_by: None,
            admin_notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn begin_processing(&mut self, by: &str) -> CoreResult<()> {
        if self.status != RefundStatus::Requested {
            return Err(CoreError::transition("refund", self.status, RefundStatus::Processing));
        }
        self.status = RefundStatus::Processing;
        self.processed_by = Some(by.to_string());
        self.updated_at = Utc::now();
        Ok(())
    }

    pub(crate) fn close(&mut self, outcome: RefundStatus, by: &str, notes: &str) -> CoreResult<()> {
        debug_assert!(matches!(outcome, RefundStatus::Completed | RefundStatus::Rejected));
        if !self.status.is_open() {
            return Err(CoreError::transition("refund", self.status, outcome));
        }
        self.status = outcome;
        self.processed_by = Some(by.to_string());
        self.admin_notes = notes.to_string();
        self.updated_at = Utc::now();
        Ok(())
    }
}
