use async_trait::async_trait;
use rihla_core::{Availability, CoreError, CoreResult, InventoryLedger, ReservationToken, ResourceRef};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

/// Point-in-time view of one resource's capacity.
///
/// `available + held + committed == total` at every observable point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapacitySnapshot {
    pub total: u32,
    pub available: u32,
    /// Reserved, waiting for payment
    pub held: u32,
    /// Sold
    pub committed: u32,
}

#[derive(Debug, Clone, Copy)]
struct Hold {
    quantity: u32,
    committed: bool,
}

#[derive(Debug)]
struct CapacityCell {
    total: u32,
    available: u32,
    holds: HashMap<Uuid, Hold>,
}

impl CapacityCell {
    fn snapshot(&self) -> CapacitySnapshot {
        let (held, committed) = self.holds.values().fold((0u32, 0u32), |(h, c), hold| {
            if hold.committed {
                (h, c + hold.quantity)
            } else {
                (h + hold.quantity, c)
            }
        });
        CapacitySnapshot {
            total: self.total,
            available: self.available,
            held,
            committed,
        }
    }

    fn debug_check_balance(&self) {
        let s = self.snapshot();
        debug_assert_eq!(s.available + s.held + s.committed, s.total, "capacity ledger out of balance");
    }
}

/// In-memory inventory ledger with one lock per resource.
///
/// The registry lock is only taken for writing when a resource is registered, so
/// reservations against different resources proceed in parallel.
#[derive(Default)]
pub struct MemoryInventoryLedger {
    cells: RwLock<HashMap<ResourceRef, Arc<Mutex<CapacityCell>>>>,
}

impl MemoryInventoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource with all of its capacity available.
    pub fn register(&self, resource: ResourceRef, total_capacity: u32) -> CoreResult<()> {
        if total_capacity == 0 {
            return Err(CoreError::Validation(format!(
                "{} must have a total capacity of at least 1",
                resource
            )));
        }

        let mut cells = self.cells.write().map_err(|_| poisoned())?;
        if cells.contains_key(&resource) {
            return Err(CoreError::Validation(format!("{} is already registered", resource)));
        }
        cells.insert(
            resource,
            Arc::new(Mutex::new(CapacityCell {
                total: total_capacity,
                available: total_capacity,
                holds: HashMap::new(),
            })),
        );
        tracing::debug!(%resource, total_capacity, "Inventory registered");
        Ok(())
    }

    pub fn snapshot(&self, resource: ResourceRef) -> CoreResult<CapacitySnapshot> {
        let cell = self.cell(resource)?;
        let guard = cell.lock().map_err(|_| poisoned())?;
        Ok(guard.snapshot())
    }

    /// Share of capacity currently taken (held or sold), between 0.0 and 1.0.
    pub fn utilization(&self, resource: ResourceRef) -> CoreResult<f64> {
        let s = self.snapshot(resource)?;
        Ok(1.0 - (s.available as f64 / s.total as f64))
    }

    fn cell(&self, resource: ResourceRef) -> CoreResult<Arc<Mutex<CapacityCell>>> {
        let cells = self.cells.read().map_err(|_| poisoned())?;
        cells
            .get(&resource)
            .cloned()
            .ok_or_else(|| CoreError::not_found("resource", resource))
    }
}

#[async_trait]
impl InventoryLedger for MemoryInventoryLedger {
    async fn reserve(&self, resource: ResourceRef, quantity: u32) -> CoreResult<ReservationToken> {
        if quantity == 0 {
            return Err(CoreError::Validation("quantity must be at least 1".to_string()));
        }

        let cell = self.cell(resource)?;
        let mut guard = cell.lock().map_err(|_| poisoned())?;

        if guard.available < quantity {
            return Err(CoreError::InsufficientCapacity {
                resource: resource.to_string(),
                requested: quantity,
                available: guard.available,
            });
        }

        let token = ReservationToken::issue(resource, quantity);
        guard.available -= quantity;
        guard.holds.insert(
            token.id,
            Hold {
                quantity,
                committed: false,
            },
        );
        guard.debug_check_balance();

        tracing::debug!(%resource, quantity, remaining = guard.available, token = %token.id, "Capacity reserved");
        Ok(token)
    }

    async fn release(&self, token: &ReservationToken) -> CoreResult<()> {
        let cell = self.cell(token.resource)?;
        let mut guard = cell.lock().map_err(|_| poisoned())?;

        let hold = match guard.holds.get(&token.id) {
            Some(hold) => *hold,
            None => {
                return Err(CoreError::invariant(format!(
                    "release of unknown or already released token {} on {}",
                    token.id, token.resource
                )))
            }
        };

        if hold.quantity != token.quantity {
            return Err(CoreError::invariant(format!(
                "token {} claims {} units but holds {}",
                token.id, token.quantity, hold.quantity
            )));
        }

        let restored = guard.available + hold.quantity;
        if restored > guard.total {
            return Err(CoreError::invariant(format!(
                "release on {} would raise availability to {} above total {}",
                token.resource, restored, guard.total
            )));
        }

        guard.holds.remove(&token.id);
        guard.available = restored;
        guard.debug_check_balance();

        tracing::debug!(resource = %token.resource, quantity = hold.quantity, available = restored, "Capacity released");
        Ok(())
    }

    async fn commit(&self, token: &ReservationToken) -> CoreResult<()> {
        let cell = self.cell(token.resource)?;
        let mut guard = cell.lock().map_err(|_| poisoned())?;

        match guard.holds.get_mut(&token.id) {
            Some(hold) => {
                hold.committed = true;
                Ok(())
            }
            None => Err(CoreError::invariant(format!(
                "commit of unknown or released token {} on {}",
                token.id, token.resource
            ))),
        }
    }

    async fn availability(&self, resource: ResourceRef) -> CoreResult<Availability> {
        let s = self.snapshot(resource)?;
        Ok(Availability {
            total: s.total,
            available: s.available,
        })
    }
}

fn poisoned() -> CoreError {
    CoreError::invariant("inventory lock poisoned by a panicked writer")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flight() -> ResourceRef {
        ResourceRef::Flight(Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_inventory_lifecycle() {
        let ledger = MemoryInventoryLedger::new();
        let resource = flight();

        ledger.register(resource, 100).unwrap();
        assert_eq!(ledger.snapshot(resource).unwrap().available, 100);

        // Reserve
        let token = ledger.reserve(resource, 10).await.unwrap();
        let s = ledger.snapshot(resource).unwrap();
        assert_eq!((s.available, s.held, s.committed), (90, 10, 0));

        // Commit
        ledger.commit(&token).await.unwrap();
        let s = ledger.snapshot(resource).unwrap();
        assert_eq!((s.available, s.held, s.committed), (90, 0, 10));

        let utilization = ledger.utilization(resource).unwrap();
        assert!((utilization - 0.1).abs() < 0.01);

        // Committed units can still be returned (cancellation)
        ledger.release(&token).await.unwrap();
        assert_eq!(ledger.snapshot(resource).unwrap().available, 100);
    }

    #[tokio::test]
    async fn test_insufficient_capacity_has_no_side_effects() {
        let ledger = MemoryInventoryLedger::new();
        let resource = ResourceRef::Hotel(Uuid::new_v4());
        ledger.register(resource, 3).unwrap();

        let err = ledger.reserve(resource, 4).await.unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientCapacity {
                resource: resource.to_string(),
                requested: 4,
                available: 3,
            }
        );
        assert_eq!(ledger.snapshot(resource).unwrap().available, 3);
        assert!(matches!(ledger.reserve(resource, 0).await, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_double_release_is_an_invariant_violation() {
        let ledger = MemoryInventoryLedger::new();
        let resource = ResourceRef::Event(Uuid::new_v4());
        ledger.register(resource, 5).unwrap();

        let token = ledger.reserve(resource, 2).await.unwrap();
        ledger.release(&token).await.unwrap();

        let err = ledger.release(&token).await.unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation(_)));
        // Availability never exceeds total
        assert_eq!(ledger.snapshot(resource).unwrap().available, 5);
        assert!(matches!(ledger.commit(&token).await, Err(CoreError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn test_forged_token_quantity_rejected() {
        let ledger = MemoryInventoryLedger::new();
        let resource = flight();
        ledger.register(resource, 5).unwrap();

        let mut token = ledger.reserve(resource, 1).await.unwrap();
        token.quantity = 4;
        assert!(matches!(ledger.release(&token).await, Err(CoreError::InvariantViolation(_))));
        assert_eq!(ledger.snapshot(resource).unwrap().available, 4);
    }

    #[tokio::test]
    async fn test_unknown_resource() {
        let ledger = MemoryInventoryLedger::new();
        let err = ledger.reserve(flight(), 1).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity: "resource", .. }));
        assert!(ledger.register(flight(), 0).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_reserves_never_oversell() {
        let ledger = Arc::new(MemoryInventoryLedger::new());
        let resource = flight();
        ledger.register(resource, 10).unwrap();

        let mut handles = Vec::new();
        for i in 0..64u32 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                // Mix of 1- and 2-unit requests
                let quantity = 1 + (i % 2);
                ledger.reserve(resource, quantity).await.map(|t| t.quantity)
            }));
        }

        let mut granted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(quantity) => granted += quantity,
                Err(CoreError::InsufficientCapacity { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        let s = ledger.snapshot(resource).unwrap();
        assert!(granted <= 10);
        assert_eq!(s.available, 10 - granted);
        assert_eq!(s.held, granted);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_last_unit_goes_to_exactly_one_caller() {
        let ledger = Arc::new(MemoryInventoryLedger::new());
        let resource = ResourceRef::Event(Uuid::new_v4());
        ledger.register(resource, 1).unwrap();

        let a = tokio::spawn({
            let ledger = ledger.clone();
            async move { ledger.reserve(resource, 1).await }
        });
        let b = tokio::spawn({
            let ledger = ledger.clone();
            async move { ledger.reserve(resource, 1).await }
        });

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(ledger.availability(resource).await.unwrap().available, 0);
    }

    #[tokio::test]
    async fn test_resources_are_independent() {
        let ledger = MemoryInventoryLedger::new();
        let a = flight();
        let b = flight();
        ledger.register(a, 1).unwrap();
        ledger.register(b, 1).unwrap();

        let _held = ledger.reserve(a, 1).await.unwrap();
        assert!(ledger.reserve(b, 1).await.is_ok());
        assert!(ledger.reserve(a, 1).await.is_err());
    }
}
