//! Rebuild which physical tray served each planned filament slot.
//!
//! The printer never reports slot numbers, only the tray it is switching to.
//! Matching the n-th switch against the plan's first-use order recovers the
//! slot → tray mapping.

use serde::Serialize;
use spoolsync_history::PrintId;
use spoolsync_plan::{SlotId, UsagePlan};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotAssignment {
    pub slot: SlotId,
    /// Printer-wide tray ordinal.
    pub tray: i64,
}

/// Ordered slot → tray assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrayMapping {
    assignments: Vec<SlotAssignment>,
}

impl TrayMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the printer's own `ams_mapping` array: entry `i` is the
    /// tray for slot `i + 1`; negative entries mark unused slots.
    pub fn from_printer_mapping(trays: &[i64]) -> Self {
        let assignments = trays
            .iter()
            .enumerate()
            .filter(|(_, tray)| **tray >= 0)
            .map(|(index, tray)| SlotAssignment {
                slot: index as SlotId + 1,
                tray: *tray,
            })
            .collect();
        Self { assignments }
    }

    pub fn push(&mut self, slot: SlotId, tray: i64) {
        self.assignments.push(SlotAssignment { slot, tray });
    }

    pub fn tray_for(&self, slot: SlotId) -> Option<i64> {
        self.assignments
            .iter()
            .find(|a| a.slot == slot)
            .map(|a| a.tray)
    }

    pub fn assignments(&self) -> &[SlotAssignment] {
        &self.assignments
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// Mapping under construction for the running job.
#[derive(Debug, Clone)]
pub struct PendingMapping {
    plan: UsagePlan,
    print_id: Option<PrintId>,
    changes: Vec<i64>,
    mapping: TrayMapping,
}

impl PendingMapping {
    pub fn new(plan: UsagePlan, print_id: Option<PrintId>) -> Self {
        Self {
            plan,
            print_id,
            changes: Vec::new(),
            mapping: TrayMapping::new(),
        }
    }

    /// Record one observed tray change. The first entry is the tray already
    /// loaded; switch `n` (1-based) serves the slot first used at directive
    /// `n - 1`. Returns `true` once every slot in the order is assigned.
    pub fn map_filament(&mut self, target_tray: i64) -> bool {
        self.changes.push(target_tray);
        let change_count = self.changes.len() - 1;
        debug!(change = change_count, tray = target_tray, "tray change observed");

        if change_count > 0 && !self.is_complete() {
            if let Some(slot) = self.plan.slot_at(change_count as u32 - 1) {
                self.mapping.push(slot, target_tray);
                info!(slot, tray = target_tray, file = %self.plan.file, "slot mapped to tray");
            }
        }
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.mapping.len() == self.plan.order.len()
    }

    pub fn plan(&self) -> &UsagePlan {
        &self.plan
    }

    pub fn print_id(&self) -> Option<PrintId> {
        self.print_id
    }

    pub fn changes(&self) -> &[i64] {
        &self.changes
    }

    pub fn mapping(&self) -> &TrayMapping {
        &self.mapping
    }

    pub fn into_parts(self) -> (UsagePlan, Option<PrintId>, TrayMapping) {
        (self.plan, self.print_id, self.mapping)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    const A: SlotId = 1;
    const B: SlotId = 3;

    fn two_slot_plan() -> UsagePlan {
        UsagePlan::new("cube.3mf").with_order(BTreeMap::from([(A, 0), (B, 1)]))
    }

    #[test]
    fn first_entry_is_the_loaded_tray() {
        let mut pending = PendingMapping::new(two_slot_plan(), None);
        assert!(!pending.map_filament(10));
        assert!(!pending.map_filament(11));
        assert!(pending.map_filament(12));
        assert_eq!(
            pending.mapping().assignments(),
            &[
                SlotAssignment { slot: A, tray: 11 },
                SlotAssignment { slot: B, tray: 12 },
            ]
        );
    }

    #[test]
    fn short_sequences_never_complete() {
        let mut pending = PendingMapping::new(two_slot_plan(), None);
        assert!(!pending.map_filament(0));
        assert!(!pending.map_filament(1));
        assert!(!pending.is_complete());
        assert_eq!(pending.changes(), &[0, 1]);
    }

    #[test]
    fn repeated_tray_still_counts_as_a_change() {
        let mut pending = PendingMapping::new(two_slot_plan(), None);
        pending.map_filament(2);
        pending.map_filament(2);
        assert!(pending.map_filament(2));
        assert_eq!(pending.mapping().tray_for(A), Some(2));
        assert_eq!(pending.mapping().tray_for(B), Some(2));
    }

    #[test]
    fn gaps_in_order_make_no_progress() {
        let plan = UsagePlan::new("gap.3mf").with_order(BTreeMap::from([(1, 0), (2, 2)]));
        let mut pending = PendingMapping::new(plan, Some(9));
        pending.map_filament(255);
        pending.map_filament(0);
        assert_eq!(pending.mapping().len(), 1);
        pending.map_filament(1);
        assert_eq!(pending.mapping().len(), 1);
        assert!(pending.map_filament(3));
        assert_eq!(pending.mapping().tray_for(2), Some(3));
        assert_eq!(pending.print_id(), Some(9));
    }

    #[test]
    fn assignments_stop_at_order_length() {
        let plan = UsagePlan::new("single.3mf");
        let mut pending = PendingMapping::new(plan, None);
        pending.map_filament(255);
        assert!(pending.map_filament(0));
        assert!(pending.map_filament(1));
        assert_eq!(pending.mapping().len(), 1);
    }

    #[test]
    fn printer_mapping_skips_unused_slots() {
        let mapping = TrayMapping::from_printer_mapping(&[1, 0, -1, 254]);
        assert_eq!(mapping.tray_for(1), Some(1));
        assert_eq!(mapping.tray_for(2), Some(0));
        assert_eq!(mapping.tray_for(3), None);
        assert_eq!(mapping.tray_for(4), Some(254));
    }
}
