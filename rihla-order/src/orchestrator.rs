use chrono::Utc;
use rihla_core::notify::{LogNotifier, Notifier};
use rihla_core::payment::{InstantSettlement, PaymentGateway, SettlementOutcome, SettlementRequest};
use rihla_core::{Actor, Catalog, CoreError, CoreResult, InventoryLedger, PriceSnapshot, ReservationToken, ResourceInfo, ResourceRef};
use rihla_shared::models::events::{BookingCancelledEvent, BookingConfirmedEvent, RefundCompletedEvent};
use rihla_shared::DomainEvent;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::manager::BookingManager;
use crate::models::{Booking, BookingStatus, Payment, Refund, RefundStatus};
use crate::payments::PaymentLedger;
use crate::refunds::RefundDesk;
use crate::request::PlaceBookingRequest;
use crate::store::OrderBook;

/// Coordinates inventory, bookings, payments and refunds.
///
/// Every multi-step flow either completes or compensates the steps it already
/// took, so a failed placement leaves no booking and no held capacity behind.
pub struct ReservationOrchestrator {
    inventory: Arc<dyn InventoryLedger>,
    catalog: Arc<dyn Catalog>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    bookings: BookingManager,
    payments: PaymentLedger,
    refunds: RefundDesk,
}

impl ReservationOrchestrator {
    pub fn new(inventory: Arc<dyn InventoryLedger>, catalog: Arc<dyn Catalog>, book: Arc<OrderBook>) -> Self {
        Self {
            inventory,
            catalog,
            gateway: Arc::new(InstantSettlement),
            notifier: Arc::new(LogNotifier),
            bookings: BookingManager::new(book.clone()),
            payments: PaymentLedger::new(book.clone()),
            refunds: RefundDesk::new(book),
        }
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn bookings(&self) -> &BookingManager {
        &self.bookings
    }

    pub fn payments(&self) -> &PaymentLedger {
        &self.payments
    }

    pub fn refunds(&self) -> &RefundDesk {
        &self.refunds
    }

    /// Validates, reserves, records and settles a booking.
    ///
    /// On success the booking is `confirmed` with one completed payment and its hold
    /// committed. On any failure after the reserve, the hold is released and the
    /// pending booking discarded before the error is returned.
    pub async fn place_booking(&self, actor: &Actor, request: PlaceBookingRequest) -> CoreResult<Booking> {
        let draft = request.validate(&actor.user_id)?;

        let info = self.catalog.get_resource(draft.resource).await?;
        if !info.is_active {
            return Err(CoreError::Validation(format!("{} is not open for booking", draft.resource)));
        }

        let token = self.inventory.reserve(draft.resource, draft.quantity).await?;

        let booking = match self.bookings.create(draft, token.clone()) {
            Ok(booking) => booking,
            Err(e) => {
                self.release_hold(&token).await?;
                return Err(e);
            }
        };

        let payment = match self.payments.record_attempt(booking.id, booking.price, booking.payment_method) {
            Ok(payment) => payment,
            Err(e) => {
                self.roll_back(&booking).await?;
                return Err(e);
            }
        };

        let settlement = SettlementRequest {
            payment_id: payment.id,
            booking_id: booking.id,
            transaction_id: payment.transaction_id.clone(),
            amount: payment.amount,
            currency: payment.currency,
            method: payment.method.as_str().to_string(),
        };

        let receipt = match self.gateway.settle(&settlement).await {
            Ok(receipt) if receipt.outcome == SettlementOutcome::Completed => receipt,
            Ok(receipt) => {
                let reason = receipt.response.unwrap_or_else(|| "payment declined".to_string());
                return Err(self.fail_settlement(&booking, &payment, reason).await);
            }
            Err(e) => return Err(self.fail_settlement(&booking, &payment, e.to_string()).await),
        };

        if let Err(e) = self.payments.settle(payment.id, SettlementOutcome::Completed, receipt.response) {
            self.roll_back(&booking).await?;
            return Err(e);
        }

        // The booking is confirmed; a commit failure is logged, not undone
        if let Err(e) = self.inventory.commit(&token).await {
            error!(booking_id = %booking.id, error = %e, "Failed to commit hold of confirmed booking");
        }

        let booking = self.bookings.get(booking.id)?;
        info!(
            booking_id = %booking.id,
            reference = %booking.reference,
            resource = %booking.resource,
            quantity = booking.quantity,
            "Booking confirmed"
        );

        self.emit(DomainEvent::BookingConfirmed(BookingConfirmedEvent {
            booking_id: booking.id,
            reference: booking.reference.clone(),
            user_id: booking.user_id.clone(),
            resource_kind: booking.resource.kind().as_str().to_string(),
            resource_id: booking.resource.id(),
            quantity: booking.quantity,
            total_sar: booking.price.sar,
            total_usd: booking.price.usd,
            transaction_id: payment.transaction_id,
            timestamp: Utc::now().timestamp(),
        }))
        .await;

        Ok(booking)
    }

    /// Cancels the booking and returns its capacity.
    ///
    /// If the release fails after the transition, the booking stays cancelled with
    /// its release outstanding; cancelling it again retries the release.
    pub async fn cancel_booking(&self, booking_id: Uuid, actor: &Actor) -> CoreResult<Booking> {
        let folio = self.bookings.folio(booking_id)?;
        actor.require_owner_or_staff(&folio.booking.user_id, "cancel this booking")?;

        let booking = if folio.booking.status == BookingStatus::Cancelled && folio.release_pending() {
            warn!(booking_id = %booking_id, by = %actor.user_id, "Retrying release of cancelled booking");
            folio.booking
        } else {
            self.bookings.cancel(booking_id, actor)?.0
        };
        self.finish_release(&booking).await?;

        self.emit(DomainEvent::BookingCancelled(BookingCancelledEvent {
            booking_id: booking.id,
            reference: booking.reference.clone(),
            cancelled_by: actor.user_id.clone(),
            released_quantity: booking.hold.quantity,
            timestamp: Utc::now().timestamp(),
        }))
        .await;

        Ok(booking)
    }

    pub fn request_refund(
        &self,
        booking_id: Uuid,
        payment_id: Uuid,
        amount: PriceSnapshot,
        reason: &str,
        actor: &Actor,
    ) -> CoreResult<Refund> {
        self.refunds.request(booking_id, payment_id, amount, reason, actor)
    }

    pub fn begin_refund_processing(&self, refund_id: Uuid, actor: &Actor) -> CoreResult<Refund> {
        self.refunds.begin_processing(refund_id, actor)
    }

    /// Approves a refund; a booking that still held capacity gives it back.
    ///
    /// Approving an already completed refund whose release failed retries the release.
    pub async fn approve_refund(&self, refund_id: Uuid, actor: &Actor, notes: &str) -> CoreResult<Refund> {
        actor.require_staff("approve refunds")?;
        let refund = self.refunds.get(refund_id, actor)?;
        if refund.status == RefundStatus::Completed {
            let folio = self.bookings.folio(refund.booking_id)?;
            if folio.release_pending() {
                warn!(refund_id = %refund_id, booking_id = %folio.booking.id, "Retrying release of refunded booking");
                self.finish_release(&folio.booking).await?;
                self.emit_refund_completed(&refund, &folio.booking, actor).await;
                return Ok(refund);
            }
        }

        let approval = self.refunds.approve(refund_id, actor, notes)?;

        if approval.release_due {
            self.finish_release(&approval.booking).await?;
        }

        self.emit_refund_completed(&approval.refund, &approval.booking, actor).await;
        Ok(approval.refund)
    }

    pub fn reject_refund(&self, refund_id: Uuid, actor: &Actor, notes: &str) -> CoreResult<Refund> {
        self.refunds.reject(refund_id, actor, notes)
    }

    /// One booking, for its owner or staff.
    pub fn booking(&self, booking_id: Uuid, actor: &Actor) -> CoreResult<Booking> {
        let booking = self.bookings.get(booking_id)?;
        actor.require_owner_or_staff(&booking.user_id, "view this booking")?;
        Ok(booking)
    }

    pub fn bookings_for(&self, actor: &Actor) -> CoreResult<Vec<Booking>> {
        self.bookings.visible_to(actor)
    }

    pub fn payments_for(&self, booking_id: Uuid, actor: &Actor) -> CoreResult<Vec<Payment>> {
        self.booking(booking_id, actor)?;
        self.payments.for_booking(booking_id)
    }

    pub fn refunds_for(&self, actor: &Actor) -> CoreResult<Vec<Refund>> {
        self.refunds.visible_to(actor)
    }

    pub async fn availability(&self, resource: ResourceRef) -> CoreResult<ResourceInfo> {
        self.catalog.get_resource(resource).await
    }

    async fn fail_settlement(&self, booking: &Booking, payment: &Payment, reason: String) -> CoreError {
        warn!(booking_id = %booking.id, transaction_id = %payment.transaction_id, reason = %reason, "Settlement failed");

        if let Err(e) = self.payments.settle(payment.id, SettlementOutcome::Failed, Some(reason.clone())) {
            warn!(payment_id = %payment.id, error = %e, "Could not mark payment failed before rollback");
        }
        match self.roll_back(booking).await {
            Ok(()) => CoreError::SettlementFailure(reason),
            Err(e) => e,
        }
    }

    /// Releases the booking's hold and discards the pending booking.
    ///
    /// Both steps are attempted; the first error is returned.
    async fn roll_back(&self, booking: &Booking) -> CoreResult<()> {
        let released = self.release_hold(&booking.hold).await;
        let discarded = self.bookings.discard(booking.id).map(|_| ());
        if let Err(e) = &discarded {
            error!(booking_id = %booking.id, error = %e, "Failed to discard pending booking");
        }
        released.and(discarded)
    }

    /// Returns a cancelled or refunded booking's hold, then clears its marker.
    ///
    /// On failure the marker stays set so the same call can be repeated.
    async fn finish_release(&self, booking: &Booking) -> CoreResult<()> {
        self.inventory.release(&booking.hold).await.map_err(|e| {
            error!(booking_id = %booking.id, token = %booking.hold.id, error = %e, "Release failed, left outstanding");
            e
        })?;
        self.bookings.release_completed(booking.id)
    }

    async fn release_hold(&self, token: &ReservationToken) -> CoreResult<()> {
        self.inventory.release(token).await.map_err(|e| {
            error!(token = %token.id, resource = %token.resource, error = %e, "Compensating release failed");
            e
        })
    }

    async fn emit_refund_completed(&self, refund: &Refund, booking: &Booking, actor: &Actor) {
        self.emit(DomainEvent::RefundCompleted(RefundCompletedEvent {
            refund_id: refund.id,
            booking_id: booking.id,
            payment_id: refund.payment_id,
            reference: booking.reference.clone(),
            amount_sar: refund.amount.sar,
            amount_usd: refund.amount.usd,
            processed_by: actor.user_id.clone(),
            timestamp: Utc::now().timestamp(),
        }))
        .await;
    }

    async fn emit(&self, event: DomainEvent) {
        if let Err(e) = self.notifier.notify(&event).await {
            warn!(topic = event.topic(), key = %event.key(), error = %e, "Notification delivery failed");
        }
    }
}
