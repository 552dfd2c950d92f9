pub mod inventory;
pub mod listing;

pub use inventory::{CapacitySnapshot, MemoryInventoryLedger};
pub use listing::{Listing, MemoryCatalog};
