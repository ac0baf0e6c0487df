//! Spool inventory access: the inventory-service client, physical tray
//! addressing, and the registry of which spool sits in which tray.

mod client;
mod error;
pub mod http;
pub mod mem;
pub mod registry;
mod spool;
pub mod tray;

pub use client::{DynInventory, Inventory};
pub use error::{InventoryError, InventoryResult};
pub use http::{HttpInventory, HttpInventoryConfig};
pub use mem::{InventoryCall, MemInventory};
pub use registry::ActiveTrayRegistry;
pub use spool::{
    ACTIVE_TRAY_FIELD, Filament, InventorySettings, Spool, SpoolId, TAG_FIELD, Vendor,
    encode_extra_value,
};
pub use tray::{TrayIdentity, TrayLayout};
