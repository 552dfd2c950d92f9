use rihla_core::ids::{
    claim_unique, ReferenceGenerator, TimeOrderedGenerator, BOOKING_PREFIX, DEFAULT_ID_ATTEMPTS, TRANSACTION_PREFIX,
};
use rihla_core::{CoreError, CoreResult};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

use crate::models::{Booking, Payment, PaymentStatus, Refund};

/// A booking with its payments and refunds.
#[derive(Debug, Clone)]
pub struct BookingFolio {
    pub booking: Booking,
    pub payments: Vec<Payment>,
    pub refunds: Vec<Refund>,
    /// Set from creation until the first settlement confirms the booking.
    pub(crate) placement_open: bool,
    /// The booking left a capacity-holding status but its hold is not yet released.
    pub(crate) release_pending: bool,
    discarded: bool,
}

impl BookingFolio {
    pub(crate) fn open(booking: Booking) -> Self {
        Self {
            booking,
            payments: Vec::new(),
            refunds: Vec::new(),
            placement_open: true,
            release_pending: false,
            discarded: false,
        }
    }

    pub fn payment(&self, payment_id: Uuid) -> CoreResult<&Payment> {
        self.payments
            .iter()
            .find(|p| p.id == payment_id)
            .ok_or_else(|| CoreError::not_found("payment", payment_id))
    }

    pub(crate) fn payment_mut(&mut self, payment_id: Uuid) -> CoreResult<&mut Payment> {
        self.payments
            .iter_mut()
            .find(|p| p.id == payment_id)
            .ok_or_else(|| CoreError::not_found("payment", payment_id))
    }

    pub(crate) fn refund_mut(&mut self, refund_id: Uuid) -> CoreResult<&mut Refund> {
        self.refunds
            .iter_mut()
            .find(|r| r.id == refund_id)
            .ok_or_else(|| CoreError::not_found("refund", refund_id))
    }

    pub fn release_pending(&self) -> bool {
        self.release_pending
    }

    pub fn completed_payments(&self) -> usize {
        self.payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Completed)
            .count()
    }
}

#[derive(Default)]
struct Registry {
    folios: HashMap<Uuid, Arc<Mutex<BookingFolio>>>,
    references: HashSet<String>,
    transaction_ids: HashSet<String>,
    payment_owner: HashMap<Uuid, Uuid>,
    refund_owner: HashMap<Uuid, Uuid>,
}

/// In-memory record store for bookings, payments and refunds.
///
/// Each folio has its own mutex. Writes go through [`OrderBook::transact`], which
/// runs the closure against a staged copy and stores it only if the closure
/// succeeds. The registry lock and a folio lock are never held together.
pub struct OrderBook {
    registry: RwLock<Registry>,
    generator: Arc<dyn ReferenceGenerator>,
    id_attempts: usize,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBook {
    pub fn new() -> Self {
        Self::with_generator(Arc::new(TimeOrderedGenerator), DEFAULT_ID_ATTEMPTS)
    }

    pub fn with_generator(generator: Arc<dyn ReferenceGenerator>, id_attempts: usize) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            generator,
            id_attempts,
        }
    }

    pub(crate) fn claim_reference(&self) -> CoreResult<String> {
        let mut registry = self.registry.write().map_err(|_| poisoned())?;
        claim_unique(self.generator.as_ref(), BOOKING_PREFIX, self.id_attempts, |candidate| {
            registry.references.insert(candidate.to_string())
        })
    }

    pub(crate) fn claim_transaction_id(&self) -> CoreResult<String> {
        let mut registry = self.registry.write().map_err(|_| poisoned())?;
        claim_unique(self.generator.as_ref(), TRANSACTION_PREFIX, self.id_attempts, |candidate| {
            registry.transaction_ids.insert(candidate.to_string())
        })
    }

    pub(crate) fn forget_transaction_id(&self, transaction_id: &str) -> CoreResult<()> {
        let mut registry = self.registry.write().map_err(|_| poisoned())?;
        registry.transaction_ids.remove(transaction_id);
        Ok(())
    }

    pub(crate) fn insert(&self, folio: BookingFolio) -> CoreResult<()> {
        let mut registry = self.registry.write().map_err(|_| poisoned())?;
        let id = folio.booking.id;
        if registry.folios.contains_key(&id) {
            return Err(CoreError::invariant(format!("booking {} stored twice", id)));
        }
        registry.folios.insert(id, Arc::new(Mutex::new(folio)));
        Ok(())
    }

    pub(crate) fn link_payment(&self, payment_id: Uuid, booking_id: Uuid) -> CoreResult<()> {
        let mut registry = self.registry.write().map_err(|_| poisoned())?;
        registry.payment_owner.insert(payment_id, booking_id);
        Ok(())
    }

    pub(crate) fn link_refund(&self, refund_id: Uuid, booking_id: Uuid) -> CoreResult<()> {
        let mut registry = self.registry.write().map_err(|_| poisoned())?;
        registry.refund_owner.insert(refund_id, booking_id);
        Ok(())
    }

    pub fn booking_of_payment(&self, payment_id: Uuid) -> CoreResult<Uuid> {
        let registry = self.registry.read().map_err(|_| poisoned())?;
        registry
            .payment_owner
            .get(&payment_id)
            .copied()
            .ok_or_else(|| CoreError::not_found("payment", payment_id))
    }

    pub fn booking_of_refund(&self, refund_id: Uuid) -> CoreResult<Uuid> {
        let registry = self.registry.read().map_err(|_| poisoned())?;
        registry
            .refund_owner
            .get(&refund_id)
            .copied()
            .ok_or_else(|| CoreError::not_found("refund", refund_id))
    }

    fn folio(&self, booking_id: Uuid) -> CoreResult<Arc<Mutex<BookingFolio>>> {
        let registry = self.registry.read().map_err(|_| poisoned())?;
        registry
            .folios
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("booking", booking_id))
    }

    /// Reads a folio under its lock.
    pub fn read<T>(&self, booking_id: Uuid, f: impl FnOnce(&BookingFolio) -> T) -> CoreResult<T> {
        let folio = self.folio(booking_id)?;
        let guard = folio.lock().map_err(|_| poisoned())?;
        if guard.discarded {
            return Err(CoreError::not_found("booking", booking_id));
        }
        Ok(f(&guard))
    }

    /// Applies `f` to a copy of the folio and keeps the copy only when `f` returns `Ok`.
    pub fn transact<T>(
        &self,
        booking_id: Uuid,
        f: impl FnOnce(&mut BookingFolio) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let folio = self.folio(booking_id)?;
        let mut guard = folio.lock().map_err(|_| poisoned())?;
        if guard.discarded {
            return Err(CoreError::not_found("booking", booking_id));
        }

        let mut staged = guard.clone();
        let value = f(&mut staged)?;
        *guard = staged;
        Ok(value)
    }

    /// Deletes a folio and frees its reference and transaction ids.
    pub(crate) fn remove(&self, booking_id: Uuid) -> CoreResult<BookingFolio> {
        let folio = self.folio(booking_id)?;
        let removed = {
            let mut guard = folio.lock().map_err(|_| poisoned())?;
            if guard.discarded {
                return Err(CoreError::not_found("booking", booking_id));
            }
            guard.discarded = true;
            guard.clone()
        };

        let mut registry = self.registry.write().map_err(|_| poisoned())?;
        registry.folios.remove(&booking_id);
        registry.references.remove(&removed.booking.reference);
        for payment in &removed.payments {
            registry.transaction_ids.remove(&payment.transaction_id);
            registry.payment_owner.remove(&payment.id);
        }
        for refund in &removed.refunds {
            registry.refund_owner.remove(&refund.id);
        }
        Ok(removed)
    }

    /// Copies of every folio accepted by `filter`.
    pub fn folios(&self, filter: impl Fn(&BookingFolio) -> bool) -> CoreResult<Vec<BookingFolio>> {
        let handles: Vec<_> = {
            let registry = self.registry.read().map_err(|_| poisoned())?;
            registry.folios.values().cloned().collect()
        };

        let mut out = Vec::new();
        for handle in handles {
            let guard = handle.lock().map_err(|_| poisoned())?;
            if !guard.discarded && filter(&guard) {
                out.push(guard.clone());
            }
        }
        Ok(out)
    }
}

fn poisoned() -> CoreError {
    CoreError::invariant("order book lock poisoned by a panicked writer")
}
