//! Per-tray view joining the last AMS report with the inventory.

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use spoolsync_inventory::{ActiveTrayRegistry, Spool, SpoolId, TrayIdentity, TrayLayout};

use crate::ams::{AmsSnapshot, telemetry_index};

const LAST_USED_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrayStatus {
    pub tray: String,
    /// Material the printer reports for the tray.
    pub tray_type: Option<String>,
    pub matched: bool,
    /// The tray holds filament but no inventory spool is active for it.
    pub issue: bool,
    pub spool: Option<SpoolId>,
    pub name: Option<String>,
    pub vendor: Option<String>,
    pub remaining_weight: Option<f64>,
    /// Local time, `dd.mm.yyyy HH:MM:SS`.
    pub last_used: Option<String>,
    pub colors: Vec<String>,
    pub color_direction: Option<String>,
}

impl TrayStatus {
    fn unmatched(tray: &TrayIdentity, tray_type: Option<String>) -> Self {
        let issue = tray_type.is_some();
        Self {
            tray: tray.key(),
            tray_type,
            matched: false,
            issue,
            spool: None,
            name: None,
            vendor: None,
            remaining_weight: None,
            last_used: None,
            colors: Vec::new(),
            color_direction: None,
        }
    }

    fn matched(tray: &TrayIdentity, tray_type: Option<String>, spool: &Spool) -> Self {
        let filament = spool.filament.as_ref();
        Self {
            tray: tray.key(),
            tray_type,
            matched: true,
            issue: false,
            spool: Some(spool.id),
            name: filament.and_then(|f| f.name.clone()),
            vendor: filament.and_then(|f| f.vendor.as_ref()).map(|v| v.name.clone()),
            remaining_weight: spool.remaining_weight,
            last_used: spool.last_used.as_deref().map(local_timestamp),
            colors: spool.multi_colors(),
            color_direction: filament.and_then(|f| f.multi_color_direction.clone()),
        }
    }
}

/// Status of every tray in `snapshot`: AMS trays first, then the external
/// spool holder.
pub fn tray_status(
    snapshot: &AmsSnapshot,
    registry: &ActiveTrayRegistry,
    layout: &TrayLayout,
) -> Vec<TrayStatus> {
    let mut out = Vec::new();
    let units = snapshot.ams.as_ref().and_then(Value::as_array);
    for unit in units.into_iter().flatten() {
        let Some(ams_id) = unit.get("id").and_then(telemetry_index) else {
            continue;
        };
        let trays = unit.get("tray").and_then(Value::as_array);
        for tray in trays.into_iter().flatten() {
            let Some(tray_id) = tray.get("id").and_then(telemetry_index) else {
                continue;
            };
            out.push(status_for(registry, &layout.in_unit(ams_id, tray_id), tray));
        }
    }
    if let Some(vt_tray) = &snapshot.vt_tray {
        out.push(status_for(registry, &layout.external(), vt_tray));
    }
    out
}

fn status_for(registry: &ActiveTrayRegistry, identity: &TrayIdentity, tray: &Value) -> TrayStatus {
    let tray_type = tray
        .get("tray_type")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    let spool = registry
        .resolve(identity)
        .and_then(|id| registry.spools().iter().find(|s| s.id == id));
    match spool {
        Some(spool) => TrayStatus::matched(identity, tray_type, spool),
        None => TrayStatus::unmatched(identity, tray_type),
    }
}

/// Inventory timestamps are UTC; unparseable values pass through unchanged.
fn local_timestamp(raw: &str) -> String {
    match NaiveDateTime::parse_from_str(raw, LAST_USED_FORMAT) {
        Ok(utc) => utc
            .and_utc()
            .with_timezone(&Local)
            .format("%d.%m.%Y %H:%M:%S")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use spoolsync_inventory::{ACTIVE_TRAY_FIELD, MemInventory, encode_extra_value};

    use super::*;

    fn active_spool(layout: &TrayLayout) -> Spool {
        let mut spool: Spool = serde_json::from_value(json!({
            "id": 9,
            "remaining_weight": 640.5,
            "last_used": "2024-03-01T10:15:00Z",
            "filament": {
                "id": 2,
                "name": "Silk Dual",
                "vendor": {"name": "Bambu Lab"},
                "multi_color_hexes": "FF0000,00FF00",
                "multi_color_direction": "coaxial"
            }
        }))
        .expect("spool");
        spool.extra.insert(
            ACTIVE_TRAY_FIELD.into(),
            encode_extra_value(&layout.in_unit(0, 0).key()),
        );
        spool
    }

    #[tokio::test]
    async fn joins_trays_with_active_spools() {
        let layout = TrayLayout::for_printer("P1S");
        let inventory = MemInventory::new([active_spool(&layout)]);
        let mut registry = ActiveTrayRegistry::new(Arc::new(inventory));
        registry.refresh().await.expect("refresh");
        let snapshot = AmsSnapshot {
            ams: Some(json!([{"id": "0", "tray": [
                {"id": "0", "tray_type": "PLA"},
                {"id": "1", "tray_type": "PETG"},
                {"id": "2", "tray_type": ""}
            ]}])),
            vt_tray: Some(json!({"id": "254"})),
        };

        let status = tray_status(&snapshot, &registry, &layout);

        assert_eq!(status.len(), 4);
        let first = &status[0];
        assert_eq!(first.tray, "P1S_0_0");
        assert!(first.matched && !first.issue);
        assert_eq!(first.spool, Some(9));
        assert_eq!(first.name.as_deref(), Some("Silk Dual"));
        assert_eq!(first.vendor.as_deref(), Some("Bambu Lab"));
        assert_eq!(first.remaining_weight, Some(640.5));
        assert_eq!(first.colors, vec!["FF0000".to_string(), "00FF00".to_string()]);
        assert_eq!(first.color_direction.as_deref(), Some("coaxial"));
        let last_used = first.last_used.as_deref().expect("last used");
        assert!(last_used.contains(".2024 "), "got {last_used}");

        assert!(!status[1].matched);
        assert!(status[1].issue, "loaded tray without spool is flagged");
        assert!(!status[2].issue, "empty tray is not an issue");
        assert_eq!(status[3].tray, "P1S_255_254");
        assert!(!status[3].issue);
    }

    #[test]
    fn unparseable_timestamp_passes_through() {
        assert_eq!(local_timestamp("yesterday"), "yesterday");
    }
}
