use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::PriceSnapshot;
use crate::resource::ResourceRef;
use crate::CoreResult;

/// Handle on capacity taken out of a resource by a successful `reserve`.
///
/// The units stay held until the token is committed (sold) or released (returned).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservationToken {
    pub id: Uuid,
    pub resource: ResourceRef,
    pub quantity: u32,
    pub issued_at: DateTime<Utc>,
}

impl ReservationToken {
    pub fn issue(resource: ResourceRef, quantity: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource,
            quantity,
            issued_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Availability {
    pub total: u32,
    pub available: u32,
}

/// What the catalog knows about a resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceInfo {
    pub resource: ResourceRef,
    pub title: String,
    pub total_capacity: u32,
    pub available_capacity: u32,
    pub list_price: PriceSnapshot,
    pub is_active: bool,
}

/// The only writer of `available_capacity`.
///
/// Implementations serialize mutations per resource: two reserves racing for the
/// last unit must not both succeed, while reserves on different resources must not
/// wait on each other.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Atomically checks `available >= quantity` and decrements on success.
    async fn reserve(&self, resource: ResourceRef, quantity: u32) -> CoreResult<ReservationToken>;

    /// Returns the token's units. Unknown or already released tokens are invariant violations.
    async fn release(&self, token: &ReservationToken) -> CoreResult<()>;

    /// Marks the held units as permanently consumed. Does not touch the counter.
    async fn commit(&self, token: &ReservationToken) -> CoreResult<()>;

    async fn availability(&self, resource: ResourceRef) -> CoreResult<Availability>;
}

/// Read access to flights, hotels and events.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_resource(&self, resource: ResourceRef) -> CoreResult<ResourceInfo>;
}
