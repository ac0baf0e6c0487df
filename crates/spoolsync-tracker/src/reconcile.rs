//! Book a job's planned consumption against the spools that supplied it.

use std::collections::BTreeMap;

use serde::Serialize;
use spoolsync_inventory::{ActiveTrayRegistry, SpoolId, TrayIdentity, TrayLayout};
use spoolsync_plan::{SlotId, UsagePlan};
use tracing::{info, warn};

use crate::mapping::TrayMapping;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deduction {
    pub spool: SpoolId,
    pub grams: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub file: String,
    /// Deductions accepted by the inventory service.
    pub deductions: Vec<Deduction>,
    /// Slot → spool for every slot whose tray had an active spool.
    pub resolved: Vec<(SlotId, SpoolId)>,
    /// Slots with no tray or no active spool in their tray.
    pub unresolved: Vec<SlotId>,
    /// Spools whose deduction call failed.
    pub failed: Vec<SpoolId>,
}

impl ReconcileReport {
    pub fn total_grams(&self) -> f64 {
        self.deductions.iter().map(|d| d.grams).sum()
    }
}

/// Resolve every planned slot to a spool and issue one deduction per spool.
///
/// Without a mapping all usage routes to the external spool. Grams of slots
/// sharing a spool are summed first; zero or negative totals are not sent.
pub async fn reconcile(
    registry: &mut ActiveTrayRegistry,
    layout: &TrayLayout,
    plan: &UsagePlan,
    mapping: Option<&TrayMapping>,
) -> ReconcileReport {
    if let Err(err) = registry.refresh().await {
        warn!(error = %err, "spool refresh failed; using cached assignments");
    }

    let mut report = ReconcileReport {
        file: plan.file.clone(),
        ..ReconcileReport::default()
    };
    let mut per_spool: BTreeMap<SpoolId, f64> = BTreeMap::new();

    for usage in plan.slots.values() {
        let Some(tray) = tray_for(layout, mapping, usage.slot) else {
            warn!(slot = usage.slot, file = %plan.file, "no tray mapped for slot");
            report.unresolved.push(usage.slot);
            continue;
        };
        let Some(spool) = registry.resolve(&tray) else {
            warn!(slot = usage.slot, tray = %tray, "no active spool in tray");
            report.unresolved.push(usage.slot);
            continue;
        };
        *per_spool.entry(spool).or_default() += usage.grams;
        report.resolved.push((usage.slot, spool));
    }

    let inventory = registry.inventory().clone();
    for (spool, grams) in per_spool {
        if grams <= 0.0 {
            continue;
        }
        match inventory.use_weight(spool, grams).await {
            Ok(_) => {
                info!(spool, grams, file = %plan.file, "filament consumption booked");
                report.deductions.push(Deduction { spool, grams });
            }
            Err(err) => {
                warn!(spool, grams, error = %err, "failed to book filament consumption");
                report.failed.push(spool);
            }
        }
    }
    report
}

fn tray_for(
    layout: &TrayLayout,
    mapping: Option<&TrayMapping>,
    slot: SlotId,
) -> Option<TrayIdentity> {
    let Some(mapping) = mapping else {
        return Some(layout.external());
    };
    let ordinal = u32::try_from(mapping.tray_for(slot)?).ok()?;
    Some(layout.from_ordinal(ordinal))
}
