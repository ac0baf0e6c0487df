//! In-memory inventory that records every mutating call.
//!
//! Used by tests and by dry runs where nothing may be written to the real
//! inventory service.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use crate::client::Inventory;
use crate::error::{InventoryError, InventoryResult};
use crate::spool::{InventorySettings, Spool, SpoolId};

/// A mutating call observed by [`MemInventory`].
#[derive(Debug, Clone, PartialEq)]
pub enum InventoryCall {
    PatchExtra {
        spool: SpoolId,
        extra: BTreeMap<String, String>,
    },
    UseWeight {
        spool: SpoolId,
        grams: f64,
    },
}

#[derive(Debug, Default)]
struct MemState {
    spools: BTreeMap<SpoolId, Spool>,
    calls: Vec<InventoryCall>,
}

#[derive(Debug, Clone, Default)]
pub struct MemInventory {
    state: Arc<Mutex<MemState>>,
}

impl MemInventory {
    pub fn new(spools: impl IntoIterator<Item = Spool>) -> Self {
        let state = MemState {
            spools: spools.into_iter().map(|s| (s.id, s)).collect(),
            calls: Vec::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn insert(&self, spool: Spool) {
        self.state.lock().unwrap().spools.insert(spool.id, spool);
    }

    pub fn spool(&self, id: SpoolId) -> Option<Spool> {
        self.state.lock().unwrap().spools.get(&id).cloned()
    }

    pub fn calls(&self) -> Vec<InventoryCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// `(spool, grams)` of every deduction, in call order.
    pub fn deductions(&self) -> Vec<(SpoolId, f64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                InventoryCall::UseWeight { spool, grams } => Some((spool, grams)),
                InventoryCall::PatchExtra { .. } => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

#[async_trait]
impl Inventory for MemInventory {
    async fn list_spools(&self) -> InventoryResult<Vec<Spool>> {
        Ok(self.state.lock().unwrap().spools.values().cloned().collect())
    }

    async fn get_spool(&self, id: SpoolId) -> InventoryResult<Spool> {
        self.spool(id).ok_or(InventoryError::SpoolNotFound(id))
    }

    async fn settings(&self) -> InventoryResult<InventorySettings> {
        InventorySettings::from_raw(&json!({
            "extra_fields_spool": {"value": "[]"},
            "extra_fields_filament": {"value": "[]"},
            "base_url": {"value": "\"memory://\""},
            "currency": {"value": "\"EUR\""}
        }))
    }

    async fn patch_extra(
        &self,
        id: SpoolId,
        extra: &BTreeMap<String, String>,
    ) -> InventoryResult<Spool> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(InventoryCall::PatchExtra {
            spool: id,
            extra: extra.clone(),
        });
        let spool = state
            .spools
            .get_mut(&id)
            .ok_or(InventoryError::SpoolNotFound(id))?;
        spool.extra = extra.clone();
        Ok(spool.clone())
    }

    async fn use_weight(&self, id: SpoolId, grams: f64) -> InventoryResult<Spool> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(InventoryCall::UseWeight { spool: id, grams });
        let spool = state
            .spools
            .get_mut(&id)
            .ok_or(InventoryError::SpoolNotFound(id))?;
        spool.used_weight = Some(spool.used_weight.unwrap_or(0.0) + grams);
        if let Some(remaining) = spool.remaining_weight.as_mut() {
            *remaining = (*remaining - grams).max(0.0);
        }
        Ok(spool.clone())
    }
}
