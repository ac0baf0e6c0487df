use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Logical filament slot as referenced by a sliced job (1-based).
pub type SlotId = u32;

/// Slot id -> zero-based index of the tray-select directive where the slot is
/// first used.
pub type FilamentOrder = BTreeMap<SlotId, u32>;

/// Planned consumption of a single slot, read from the slice metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotUsage {
    pub slot: SlotId,
    pub grams: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meters: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tray_info_idx: Option<String>,
}

impl SlotUsage {
    pub fn new(slot: SlotId, grams: f64) -> Self {
        Self {
            slot,
            grams,
            meters: None,
            material: None,
            color: None,
            tray_info_idx: None,
        }
    }
}

/// Static usage plan of one print job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsagePlan {
    /// File name of the job archive.
    pub file: String,
    /// Plate index inside the archive.
    pub plate: String,
    pub slots: BTreeMap<SlotId, SlotUsage>,
    pub order: FilamentOrder,
    /// PNG preview of the plate, when the archive carries one.
    #[serde(skip)]
    pub thumbnail: Option<Vec<u8>>,
}

impl UsagePlan {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            plate: "1".into(),
            slots: BTreeMap::new(),
            order: single_slot_order(),
            thumbnail: None,
        }
    }

    pub fn with_slot(mut self, usage: SlotUsage) -> Self {
        self.slots.insert(usage.slot, usage);
        self
    }

    pub fn with_order(mut self, order: FilamentOrder) -> Self {
        self.order = order;
        self
    }

    pub fn grams(&self, slot: SlotId) -> f64 {
        self.slots.get(&slot).map(|s| s.grams).unwrap_or(0.0)
    }

    pub fn total_grams(&self) -> f64 {
        self.slots.values().map(|s| s.grams).sum()
    }

    /// Slot first used at directive index `index`, if any.
    pub fn slot_at(&self, index: u32) -> Option<SlotId> {
        self.order
            .iter()
            .find(|(_, first_use)| **first_use == index)
            .map(|(slot, _)| *slot)
    }
}

impl UsagePlan {
    /// Move the single-filament fallback order onto the plan's only slot when
    /// slice metadata lists no slot 1.
    pub(crate) fn align_single_slot_order(&mut self) {
        if self.order != single_slot_order() || self.slots.contains_key(&1) {
            return;
        }
        let mut slots = self.slots.keys();
        match (slots.next(), slots.next()) {
            (Some(&only), None) => {
                debug!(file = %self.file, slot = only, "fallback order moved to the only listed slot");
                self.order = BTreeMap::from([(only, 0)]);
            }
            (Some(_), Some(_)) => warn!(
                file = %self.file,
                slots = ?self.slots.keys().collect::<Vec<_>>(),
                "toolpath selects no tray and slice info has no slot 1; usage will not map"
            ),
            _ => {}
        }
    }
}

/// Order used when a toolpath never selects a tray.
pub(crate) fn single_slot_order() -> FilamentOrder {
    BTreeMap::from([(1, 0)])
}
