//! Physical tray addressing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A physical filament holder: printer, AMS unit and slot within the unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrayIdentity {
    pub printer_id: String,
    pub ams_id: u32,
    pub tray_id: u32,
}

impl TrayIdentity {
    pub fn new(printer_id: impl Into<String>, ams_id: u32, tray_id: u32) -> Self {
        Self {
            printer_id: printer_id.into(),
            ams_id,
            tray_id,
        }
    }

    /// String key stored in the spool's `active_tray` extra field.
    pub fn key(&self) -> String {
        format!("{}_{}_{}", self.printer_id, self.ams_id, self.tray_id)
    }
}

impl fmt::Display for TrayIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// How tray ordinals reported by the printer map onto tray identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrayLayout {
    pub printer_id: String,
    pub trays_per_unit: u32,
    /// AMS unit id reserved for the externally mounted spool.
    pub external_ams_id: u32,
    /// Tray ordinal the printer reports for the externally mounted spool.
    pub external_tray_id: u32,
}

impl Default for TrayLayout {
    fn default() -> Self {
        Self {
            printer_id: String::new(),
            trays_per_unit: 4,
            external_ams_id: 255,
            external_tray_id: 254,
        }
    }
}

impl TrayLayout {
    pub fn for_printer(printer_id: impl Into<String>) -> Self {
        Self {
            printer_id: printer_id.into(),
            ..Self::default()
        }
    }

    pub fn external(&self) -> TrayIdentity {
        TrayIdentity::new(&self.printer_id, self.external_ams_id, self.external_tray_id)
    }

    pub fn in_unit(&self, ams_id: u32, tray_id: u32) -> TrayIdentity {
        TrayIdentity::new(&self.printer_id, ams_id, tray_id)
    }

    /// Resolve a printer-wide tray ordinal (as in `tray_tar`).
    pub fn from_ordinal(&self, ordinal: u32) -> TrayIdentity {
        if ordinal == self.external_tray_id {
            return self.external();
        }
        let per_unit = self.trays_per_unit.max(1);
        self.in_unit(ordinal / per_unit, ordinal % per_unit)
    }
}
