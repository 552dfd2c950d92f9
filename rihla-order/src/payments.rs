use rihla_core::payment::SettlementOutcome;
use rihla_core::{CoreError, CoreResult, PriceSnapshot};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{BookingStatus, Payment, PaymentMethod};
use crate::store::OrderBook;

/// Payment attempts and their settlement.
#[derive(Clone)]
pub struct PaymentLedger {
    book: Arc<OrderBook>,
}

impl PaymentLedger {
    pub fn new(book: Arc<OrderBook>) -> Self {
        Self { book }
    }

    /// Records a `pending` attempt with a fresh transaction id.
    pub fn record_attempt(&self, booking_id: Uuid, amount: PriceSnapshot, method: PaymentMethod) -> CoreResult<Payment> {
        amount.ensure_positive("payment amount")?;
        let transaction_id = self.book.claim_transaction_id()?;

        let recorded = self.book.transact(booking_id, |folio| {
            if !amount.fits_within(&folio.booking.price) {
                return Err(CoreError::Validation(format!(
                    "payment amount exceeds the price of booking {}",
                    folio.booking.reference
                )));
            }
            let payment = Payment::new(
                booking_id,
                transaction_id.clone(),
                amount,
                folio.booking.currency,
                method,
            );
            folio.payments.push(payment.clone());
            Ok(payment)
        });

        let payment = match recorded {
            Ok(payment) => payment,
            Err(e) => {
                self.book.forget_transaction_id(&transaction_id)?;
                return Err(e);
            }
        };
        self.book.link_payment(payment.id, booking_id)?;

        info!(payment_id = %payment.id, transaction_id = %payment.transaction_id, booking_id = %booking_id, "Payment attempt recorded");
        Ok(payment)
    }

    /// Settles a `pending` payment.
    ///
    /// A completed payment confirms its booking in the same record transaction when
    /// the booking is still `pending`; the booking's payment status and
    /// confirmation flags follow. A failed payment leaves the booking alone.
    pub fn settle(&self, payment_id: Uuid, outcome: SettlementOutcome, response: Option<String>) -> CoreResult<Payment> {
        let booking_id = self.book.booking_of_payment(payment_id)?;

        let payment = self.book.transact(booking_id, |folio| {
            folio.payment_mut(payment_id)?.settle(outcome, response)?;

            if outcome == SettlementOutcome::Completed {
                match folio.booking.status {
                    BookingStatus::Pending => {
                        folio.booking.confirm("system")?;
                        folio.placement_open = false;
                    }
                    BookingStatus::Confirmed => {}
                    other => return Err(CoreError::transition("booking", other, BookingStatus::Confirmed)),
                }
            }
            Ok(folio.payment(payment_id)?.clone())
        })?;

        match outcome {
            SettlementOutcome::Completed => {
                info!(payment_id = %payment_id, booking_id = %booking_id, "Payment completed")
            }
            SettlementOutcome::Failed => warn!(
                payment_id = %payment_id,
                booking_id = %booking_id,
                response = payment.gateway_response.as_deref().unwrap_or(""),
                "Payment failed"
            ),
        }
        Ok(payment)
    }

    pub fn mark_refunded(&self, payment_id: Uuid) -> CoreResult<Payment> {
        let booking_id = self.book.booking_of_payment(payment_id)?;
        self.book.transact(booking_id, |folio| {
            let payment = folio.payment_mut(payment_id)?;
            payment.mark_refunded()?;
            Ok(payment.clone())
        })
    }

    pub fn get(&self, payment_id: Uuid) -> CoreResult<Payment> {
        let booking_id = self.book.booking_of_payment(payment_id)?;
        self.book
            .read(booking_id, |folio| folio.payment(payment_id).cloned())?
    }

    pub fn for_booking(&self, booking_id: Uuid) -> CoreResult<Vec<Payment>> {
        self.book.read(booking_id, |folio| folio.payments.clone())
    }
}
