use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::InventoryResult;
use crate::spool::{InventorySettings, Spool, SpoolId};

pub type DynInventory = Arc<dyn Inventory>;

/// Calls the tracker makes against the spool inventory service.
#[async_trait]
pub trait Inventory: Send + Sync {
    async fn list_spools(&self) -> InventoryResult<Vec<Spool>>;
    async fn get_spool(&self, id: SpoolId) -> InventoryResult<Spool>;
    async fn settings(&self) -> InventoryResult<InventorySettings>;
    /// Replace the spool's extra fields with `extra`.
    async fn patch_extra(&self, id: SpoolId, extra: &BTreeMap<String, String>)
    -> InventoryResult<Spool>;
    /// Deduct `grams` of filament from the spool.
    async fn use_weight(&self, id: SpoolId, grams: f64) -> InventoryResult<Spool>;
}
