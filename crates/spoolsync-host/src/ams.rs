//! AMS tray scan: RFID-tagged spools reported in a tray become that tray's
//! active spool in the inventory.

use serde_json::Value;
use spoolsync_inventory::{ActiveTrayRegistry, SpoolId, TrayLayout};
use spoolsync_tracker::state::{as_int, lookup};
use tracing::{debug, info, warn};

/// Tag reported for trays without a readable RFID chip.
pub const EMPTY_TRAY_UUID: &str = "00000000000000000000000000000000";

/// Last AMS configuration seen on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmsSnapshot {
    pub ams: Option<Value>,
    pub vt_tray: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    /// `(spool, tray key)` pairs that changed.
    pub assigned: Vec<(SpoolId, String)>,
    /// Tags with no matching inventory spool.
    pub unknown_tags: Vec<String>,
    pub untagged: usize,
}

#[derive(Debug, Default)]
pub struct AmsScanner {
    last: AmsSnapshot,
}

impl AmsScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_config(&self) -> &AmsSnapshot {
        &self.last
    }

    pub async fn scan(
        &mut self,
        registry: &mut ActiveTrayRegistry,
        layout: &TrayLayout,
        delta: &Value,
    ) -> ScanReport {
        let mut report = ScanReport::default();
        if let Some(vt_tray) = lookup(delta, &["print", "vt_tray"]) {
            self.last.vt_tray = Some(vt_tray.clone());
        }
        let Some(units) = lookup(delta, &["print", "ams", "ams"]).and_then(Value::as_array) else {
            return report;
        };
        self.last.ams = Some(Value::Array(units.clone()));

        for unit in units {
            let Some(ams_id) = unit.get("id").and_then(telemetry_index) else {
                continue;
            };
            let trays = unit.get("tray").and_then(Value::as_array);
            for tray in trays.into_iter().flatten() {
                let Some(uuid) = tray.get("tray_uuid").and_then(Value::as_str) else {
                    continue;
                };
                let Some(tray_id) = tray.get("id").and_then(telemetry_index) else {
                    continue;
                };
                if uuid.is_empty() || uuid == EMPTY_TRAY_UUID {
                    debug!(ams = ams_id, tray = tray_id, "tray has no tagged spool");
                    report.untagged += 1;
                    continue;
                }
                let identity = layout.in_unit(ams_id, tray_id);
                let Some(spool_id) = registry.spool_by_tag(uuid).map(|s| s.id) else {
                    info!(tray = %identity, tag = uuid, "no spool carries this tag");
                    report.unknown_tags.push(uuid.to_string());
                    continue;
                };
                match registry.set_active(spool_id, &identity).await {
                    Ok(true) => report.assigned.push((spool_id, identity.key())),
                    Ok(false) => {}
                    Err(err) => warn!(spool = spool_id, tray = %identity, error = %err, "failed to set active tray"),
                }
            }
        }
        report
    }
}

/// Unit or tray index from telemetry; negative or oversized ids are rejected.
pub(crate) fn telemetry_index(value: &Value) -> Option<u32> {
    as_int(value).and_then(|n| u32::try_from(n).ok())
}
