use async_trait::async_trait;
use rihla_core::{Catalog, CoreError, CoreResult, PriceSnapshot, ResourceInfo, ResourceRef};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::inventory::MemoryInventoryLedger;

/// Catalog entry for a flight, hotel or event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub resource: ResourceRef,
    pub title: String,
    pub list_price: PriceSnapshot,
    pub is_active: bool,
}

impl Listing {
    pub fn new(resource: ResourceRef, title: impl Into<String>, list_price: PriceSnapshot) -> Self {
        Self {
            resource,
            title: title.into(),
            list_price,
            is_active: true,
        }
    }
}

/// Catalog kept in memory next to a [`MemoryInventoryLedger`].
///
/// Capacity figures come from the ledger; the catalog never writes them.
pub struct MemoryCatalog {
    listings: RwLock<HashMap<ResourceRef, Listing>>,
    ledger: Arc<MemoryInventoryLedger>,
}

impl MemoryCatalog {
    pub fn new(ledger: Arc<MemoryInventoryLedger>) -> Self {
        Self {
            listings: RwLock::new(HashMap::new()),
            ledger,
        }
    }

    pub fn ledger(&self) -> Arc<MemoryInventoryLedger> {
        self.ledger.clone()
    }

    /// Adds a listing and registers its capacity with the ledger.
    pub fn add(&self, listing: Listing, total_capacity: u32) -> CoreResult<()> {
        self.ledger.register(listing.resource, total_capacity)?;
        let mut listings = self.listings.write().map_err(|_| poisoned())?;
        listings.insert(listing.resource, listing);
        Ok(())
    }

    pub fn set_active(&self, resource: ResourceRef, is_active: bool) -> CoreResult<()> {
        let mut listings = self.listings.write().map_err(|_| poisoned())?;
        let listing = listings
            .get_mut(&resource)
            .ok_or_else(|| CoreError::not_found("resource", resource))?;
        listing.is_active = is_active;
        Ok(())
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn get_resource(&self, resource: ResourceRef) -> CoreResult<ResourceInfo> {
        let listing = {
            let listings = self.listings.read().map_err(|_| poisoned())?;
            listings
                .get(&resource)
                .cloned()
                .ok_or_else(|| CoreError::not_found("resource", resource))?
        };
        let capacity = self.ledger.snapshot(resource)?;

        Ok(ResourceInfo {
            resource,
            title: listing.title,
            total_capacity: capacity.total,
            available_capacity: capacity.available,
            list_price: listing.list_price,
            is_active: listing.is_active,
        })
    }
}

fn poisoned() -> CoreError {
    CoreError::invariant("catalog lock poisoned by a panicked writer")
}
