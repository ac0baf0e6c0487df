//! Which inventory spool currently sits in which physical tray.
//!
//! The assignment lives on the spool (`extra.active_tray`); the registry keeps
//! a cached spool list and enforces that at most one spool is active per tray.

use tracing::{debug, info};

use crate::client::DynInventory;
use crate::error::InventoryResult;
use crate::spool::{ACTIVE_TRAY_FIELD, Spool, SpoolId, encode_extra_value};
use crate::tray::TrayIdentity;

pub struct ActiveTrayRegistry {
    inventory: DynInventory,
    spools: Vec<Spool>,
}

impl ActiveTrayRegistry {
    pub fn new(inventory: DynInventory) -> Self {
        Self {
            inventory,
            spools: Vec::new(),
        }
    }

    pub fn inventory(&self) -> &DynInventory {
        &self.inventory
    }

    /// Reload the spool list from the inventory service.
    pub async fn refresh(&mut self) -> InventoryResult<()> {
        self.spools = self.inventory.list_spools().await?;
        debug!(count = self.spools.len(), "spool cache refreshed");
        Ok(())
    }

    pub fn spools(&self) -> &[Spool] {
        &self.spools
    }

    /// Spool currently active for `tray`, if any.
    pub fn resolve(&self, tray: &TrayIdentity) -> Option<SpoolId> {
        let key = tray.key();
        self.spools
            .iter()
            .find(|spool| spool.is_active_for(&key))
            .map(|spool| spool.id)
    }

    /// Spool carrying the given RFID tag uuid.
    pub fn spool_by_tag(&self, tag: &str) -> Option<&Spool> {
        self.spools
            .iter()
            .find(|spool| spool.tag().as_deref() == Some(tag))
    }

    /// Mark `spool_id` as loaded in `tray`, clearing any other spool that
    /// claimed the same tray. Returns `false` when nothing had to change.
    ///
    /// Other holders are released before the new spool is patched, so a
    /// failed release leaves the previous assignment in place and a retry
    /// picks up where this call stopped.
    pub async fn set_active(
        &mut self,
        spool_id: SpoolId,
        tray: &TrayIdentity,
    ) -> InventoryResult<bool> {
        let key = tray.key();
        let cached = self.spools.iter().find(|s| s.id == spool_id).cloned();
        let spool = match cached {
            Some(spool) => spool,
            None => {
                let spool = self.inventory.get_spool(spool_id).await?;
                self.spools.push(spool.clone());
                spool
            }
        };

        let others: Vec<Spool> = self
            .spools
            .iter()
            .filter(|s| s.id != spool_id && s.is_active_for(&key))
            .cloned()
            .collect();
        let already_active = spool.is_active_for(&key);
        if already_active && others.is_empty() {
            debug!(spool = spool_id, tray = %key, "spool already active for tray");
            return Ok(false);
        }

        for old in others {
            let mut extra = old.extra.clone();
            extra.insert(ACTIVE_TRAY_FIELD.into(), encode_extra_value(""));
            let cleared = self.inventory.patch_extra(old.id, &extra).await?;
            self.store(cleared);
            info!(spool = old.id, tray = %key, "spool released from tray");
        }

        if !already_active {
            let mut extra = spool.extra.clone();
            extra.insert(ACTIVE_TRAY_FIELD.into(), encode_extra_value(&key));
            let updated = self.inventory.patch_extra(spool_id, &extra).await?;
            self.store(updated);
            info!(spool = spool_id, tray = %key, "spool assigned to tray");
        }

        Ok(true)
    }

    fn store(&mut self, spool: Spool) {
        match self.spools.iter_mut().find(|s| s.id == spool.id) {
            Some(slot) => *slot = spool,
            None => self.spools.push(spool),
        }
    }
}
