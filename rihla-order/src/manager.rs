use rihla_core::{Actor, CoreError, CoreResult, ReservationToken};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::models::{Booking, BookingDraft, BookingStatus};
use crate::store::{BookingFolio, OrderBook};

/// Booking state machine. Owns status changes; never touches inventory.
#[derive(Clone)]
pub struct BookingManager {
    book: Arc<OrderBook>,
}

impl BookingManager {
    pub fn new(book: Arc<OrderBook>) -> Self {
        Self { book }
    }

    /// Stores a new `pending` booking holding `hold`.
    pub fn create(&self, draft: BookingDraft, hold: ReservationToken) -> CoreResult<Booking> {
        if hold.resource != draft.resource || hold.quantity != draft.quantity {
            return Err(CoreError::invariant(format!(
                "hold {} ({} x{}) does not cover draft for {} x{}",
                hold.id, hold.resource, hold.quantity, draft.resource, draft.quantity
            )));
        }

        let reference = self.book.claim_reference()?;
        let booking = Booking::new(draft, reference, hold);
        self.book.insert(BookingFolio::open(booking.clone()))?;

        info!(
            booking_id = %booking.id,
            reference = %booking.reference,
            resource = %booking.resource,
            quantity = booking.quantity,
            "Booking created"
        );
        Ok(booking)
    }

    pub fn get(&self, booking_id: Uuid) -> CoreResult<Booking> {
        self.book.read(booking_id, |folio| folio.booking.clone())
    }

    pub fn folio(&self, booking_id: Uuid) -> CoreResult<BookingFolio> {
        self.book.read(booking_id, |folio| folio.clone())
    }

    /// Cancels a `pending` or `confirmed` booking; returns it with its previous status.
    ///
    /// Refused while the placement that created the booking is still settling.
    pub fn cancel(&self, booking_id: Uuid, actor: &Actor) -> CoreResult<(Booking, BookingStatus)> {
        let (booking, previous) = self.book.transact(booking_id, |folio| {
            if folio.placement_open {
                return Err(CoreError::transition(
                    "booking",
                    "pending (settling)",
                    BookingStatus::Cancelled,
                ));
            }
            let previous = folio.booking.transition(BookingStatus::Cancelled, &actor.user_id)?;
            folio.release_pending = true;
            Ok((folio.booking.clone(), previous))
        })?;

        info!(booking_id = %booking_id, from = %previous, by = %actor.user_id, "Booking cancelled");
        Ok((booking, previous))
    }

    /// `confirmed` or `cancelled` to `refunded`, with no payment or refund bookkeeping.
    pub fn mark_refunded(&self, booking_id: Uuid, actor: &Actor) -> CoreResult<(Booking, BookingStatus)> {
        self.book.transact(booking_id, |folio| {
            let previous = folio.booking.transition(BookingStatus::Refunded, &actor.user_id)?;
            if previous == BookingStatus::Confirmed {
                folio.release_pending = true;
            }
            Ok((folio.booking.clone(), previous))
        })
    }

    /// Clears the marker left by a cancel or refund once the hold is back in the ledger.
    pub fn release_completed(&self, booking_id: Uuid) -> CoreResult<()> {
        self.book.transact(booking_id, |folio| {
            if !folio.release_pending {
                return Err(CoreError::invariant(format!(
                    "booking {} has no outstanding release",
                    folio.booking.reference
                )));
            }
            folio.release_pending = false;
            Ok(())
        })
    }

    /// Deletes a booking that never left `pending`.
    pub fn discard(&self, booking_id: Uuid) -> CoreResult<Booking> {
        let status = self.book.read(booking_id, |folio| folio.booking.status)?;
        if status != BookingStatus::Pending {
            return Err(CoreError::transition("booking", status, "discarded"));
        }
        let folio = self.book.remove(booking_id)?;
        info!(booking_id = %booking_id, reference = %folio.booking.reference, "Pending booking discarded");
        Ok(folio.booking)
    }

    /// Bookings the actor may see, newest first.
    pub fn visible_to(&self, actor: &Actor) -> CoreResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .book
            .folios(|folio| actor.can_act_for(&folio.booking.user_id))?
            .into_iter()
            .map(|folio| folio.booking)
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{CustomerContact, PaymentMethod};
    use rihla_core::{Currency, PriceSnapshot, ResourceRef};
    use rihla_shared::Masked;

    pub(crate) fn draft(user: &str, resource: ResourceRef, quantity: u32) -> BookingDraft {
        BookingDraft {
            user_id: user.to_string(),
            resource,
            quantity,
            price: PriceSnapshot::new(300.into(), 80.into()),
            currency: Currency::Sar,
            payment_method: PaymentMethod::Card,
            contact: CustomerContact {
                name: "Layla".into(),
                email: Masked::new("layla@example.com".into()),
                phone: Masked::new("+966511111111".into()),
            },
            special_requests: None,
            stay: None,
        }
    }

    pub(crate) fn created(manager: &BookingManager, user: &str) -> Booking {
        let resource = ResourceRef::Flight(Uuid::new_v4());
        manager
            .create(draft(user, resource, 1), ReservationToken::issue(resource, 1))
            .unwrap()
    }

    fn settled(book: &OrderBook, booking_id: Uuid) {
        book.transact(booking_id, |folio| {
            folio.placement_open = false;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_create_pending_booking() {
        let manager = BookingManager::new(Arc::new(OrderBook::new()));
        let booking = created(&manager, "user-1");

        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(booking.reference.starts_with("BK"));
        assert_eq!(booking.history.len(), 1);
        assert_eq!(manager.get(booking.id).unwrap().reference, booking.reference);
    }

    #[test]
    fn test_create_rejects_mismatched_hold() {
        let manager = BookingManager::new(Arc::new(OrderBook::new()));
        let resource = ResourceRef::Hotel(Uuid::new_v4());
        let err = manager
            .create(draft("u", resource, 2), ReservationToken::issue(resource, 1))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation(_)));
    }

    #[test]
    fn test_cancel_refused_while_settling() {
        let book = Arc::new(OrderBook::new());
        let manager = BookingManager::new(book.clone());
        let booking = created(&manager, "user-1");

        let err = manager.cancel(booking.id, &Actor::customer("user-1")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));

        settled(&book, booking.id);
        let (cancelled, previous) = manager.cancel(booking.id, &Actor::customer("user-1")).unwrap();
        assert_eq!(previous, BookingStatus::Pending);
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }

    #[test]
    fn test_double_cancel() {
        let book = Arc::new(OrderBook::new());
        let manager = BookingManager::new(book.clone());
        let booking = created(&manager, "user-1");
        settled(&book, booking.id);

        manager.cancel(booking.id, &Actor::staff("agent")).unwrap();
        let err = manager.cancel(booking.id, &Actor::staff("agent")).unwrap_err();
        assert_eq!(err, CoreError::transition("booking", "cancelled", "cancelled"));

        let booking = manager.get(booking.id).unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(booking.history.len(), 2);
    }

    #[test]
    fn test_cancel_leaves_release_outstanding() {
        let book = Arc::new(OrderBook::new());
        let manager = BookingManager::new(book.clone());
        let booking = created(&manager, "user-1");
        settled(&book, booking.id);

        manager.cancel(booking.id, &Actor::customer("user-1")).unwrap();
        assert!(manager.folio(booking.id).unwrap().release_pending());

        manager.release_completed(booking.id).unwrap();
        assert!(!manager.folio(booking.id).unwrap().release_pending());

        let err = manager.release_completed(booking.id).unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation(_)));
    }

    #[test]
    fn test_pending_cannot_be_refunded() {
        let book = Arc::new(OrderBook::new());
        let manager = BookingManager::new(book.clone());
        let booking = created(&manager, "user-1");

        let err = manager.mark_refunded(booking.id, &Actor::admin("root")).unwrap_err();
        assert_eq!(err, CoreError::transition("booking", "pending", "refunded"));

        settled(&book, booking.id);
        manager.cancel(booking.id, &Actor::admin("root")).unwrap();
        let (refunded, previous) = manager.mark_refunded(booking.id, &Actor::admin("root")).unwrap();
        assert_eq!(previous, BookingStatus::Cancelled);
        assert_eq!(refunded.status, BookingStatus::Refunded);
        assert!(manager.discard(booking.id).is_err());
    }

    #[test]
    fn test_visibility() {
        let manager = BookingManager::new(Arc::new(OrderBook::new()));
        let mine = created(&manager, "user-1");
        created(&manager, "user-2");

        let own = manager.visible_to(&Actor::customer("user-1")).unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].id, mine.id);
        assert_eq!(manager.visible_to(&Actor::staff("agent")).unwrap().len(), 2);
    }
}
