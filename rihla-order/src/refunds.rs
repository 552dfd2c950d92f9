use rihla_core::{Actor, CoreError, CoreResult, PriceSnapshot};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::models::{Booking, BookingStatus, Payment, PaymentStatus, Refund, RefundStatus};
use crate::store::OrderBook;

/// Result of an approved refund: the three records as stored afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct RefundApproval {
    pub refund: Refund,
    pub booking: Booking,
    pub payment: Payment,
    /// Booking status before approval. `confirmed` means capacity is still consumed.
    pub previous_status: BookingStatus,
    /// The booking's hold still has to go back to the ledger.
    pub release_due: bool,
}

/// Refund workflow: request, review, approve or reject.
#[derive(Clone)]
pub struct RefundDesk {
    book: Arc<OrderBook>,
}

impl RefundDesk {
    pub fn new(book: Arc<OrderBook>) -> Self {
        Self { book }
    }

    pub fn request(
        &self,
        booking_id: Uuid,
        payment_id: Uuid,
        amount: PriceSnapshot,
        reason: &str,
        actor: &Actor,
    ) -> CoreResult<Refund> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CoreError::Validation("a refund reason is required".to_string()));
        }
        amount.ensure_positive("refund amount")?;

        let refund = self.book.transact(booking_id, |folio| {
            actor.require_owner_or_staff(&folio.booking.user_id, "request a refund for this booking")?;

            if !matches!(folio.booking.status, BookingStatus::Confirmed | BookingStatus::Cancelled) {
                return Err(CoreError::Validation(format!(
                    "only confirmed or cancelled bookings can be refunded, booking {} is {}",
                    folio.booking.reference, folio.booking.status
                )));
            }

            let payment = folio.payment(payment_id)?;
            if !amount.fits_within(&payment.amount) {
                return Err(CoreError::Validation(format!(
                    "refund amount exceeds payment {}",
                    payment.transaction_id
                )));
            }

            let refund = Refund::new(booking_id, payment_id, amount, payment.currency, reason.to_string());
            folio.refunds.push(refund.clone());
            Ok(refund)
        })?;
        self.book.link_refund(refund.id, booking_id)?;

        info!(refund_id = %refund.id, booking_id = %booking_id, by = %actor.user_id, "Refund requested");
        Ok(refund)
    }

    pub fn begin_processing(&self, refund_id: Uuid, actor: &Actor) -> CoreResult<Refund> {
        actor.require_staff("process refunds")?;
        let booking_id = self.book.booking_of_refund(refund_id)?;
        self.book.transact(booking_id, |folio| {
            let refund = folio.refund_mut(refund_id)?;
            refund.begin_processing(&actor.user_id)?;
            Ok(refund.clone())
        })
    }

    /// Completes the refund, refunds the booking and refunds the payment as one unit.
    ///
    /// If any of the three moves is illegal, none of them is kept.
    pub fn approve(&self, refund_id: Uuid, actor: &Actor, notes: &str) -> CoreResult<RefundApproval> {
        actor.require_staff("approve refunds")?;
        let booking_id = self.book.booking_of_refund(refund_id)?;

        let approval = self.book.transact(booking_id, |folio| {
            let refund = folio.refund_mut(refund_id)?;
            refund.close(RefundStatus::Completed, &actor.user_id, notes)?;
            let refund = refund.clone();

            let previous_status = folio.booking.transition(BookingStatus::Refunded, &actor.user_id)?;
            if previous_status == BookingStatus::Confirmed {
                folio.release_pending = true;
            }

            let payment = folio.payment_mut(refund.payment_id)?;
            payment.mark_refunded()?;
            let payment = payment.clone();
            folio.booking.payment_status = PaymentStatus::Refunded;

            Ok(RefundApproval {
                refund,
                booking: folio.booking.clone(),
                payment,
                previous_status,
                release_due: folio.release_pending,
            })
        })?;

        info!(
            refund_id = %refund_id,
            booking_id = %booking_id,
            from = %approval.previous_status,
            by = %actor.user_id,
            "Refund approved"
        );
        Ok(approval)
    }

    pub fn reject(&self, refund_id: Uuid, actor: &Actor, notes: &str) -> CoreResult<Refund> {
        actor.require_staff("reject refunds")?;
        let booking_id = self.book.booking_of_refund(refund_id)?;

        let refund = self.book.transact(booking_id, |folio| {
            let refund = folio.refund_mut(refund_id)?;
            refund.close(RefundStatus::Rejected, &actor.user_id, notes)?;
            Ok(refund.clone())
        })?;

        info!(refund_id = %refund_id, booking_id = %booking_id, by = %actor.user_id, "Refund rejected");
        Ok(refund)
    }

    pub fn get(&self, refund_id: Uuid, actor: &Actor) -> CoreResult<Refund> {
        let booking_id = self.book.booking_of_refund(refund_id)?;
        self.book.read(booking_id, |folio| {
            actor.require_owner_or_staff(&folio.booking.user_id, "view this refund")?;
            folio
                .refunds
                .iter()
                .find(|r| r.id == refund_id)
                .cloned()
                .ok_or_else(|| CoreError::not_found("refund", refund_id))
        })?
    }

    /// Refunds on the actor's bookings (all of them for staff), newest first.
    pub fn visible_to(&self, actor: &Actor) -> CoreResult<Vec<Refund>> {
        let mut refunds: Vec<Refund> = self
            .book
            .folios(|folio| !folio.refunds.is_empty() && actor.can_act_for(&folio.booking.user_id))?
            .into_iter()
            .flat_map(|folio| folio.refunds)
            .collect();
        refunds.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(refunds)
    }
}
