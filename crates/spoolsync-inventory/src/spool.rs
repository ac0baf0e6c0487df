use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{InventoryError, InventoryResult};

pub type SpoolId = i64;

/// Extra field holding the tray a spool is loaded in (JSON-encoded key).
pub const ACTIVE_TRAY_FIELD: &str = "active_tray";
/// Extra field holding the RFID tag uuid of a spool (JSON-encoded).
pub const TAG_FIELD: &str = "tag";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filament {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub vendor: Option<Vendor>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub color_hex: Option<String>,
    #[serde(default)]
    pub multi_color_hexes: Option<String>,
    #[serde(default)]
    pub multi_color_direction: Option<String>,
}

/// A spool as reported by the inventory service.
///
/// Extra fields are free-form; the service stores every value as a
/// JSON-encoded string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spool {
    pub id: SpoolId,
    #[serde(default)]
    pub filament: Option<Filament>,
    #[serde(default)]
    pub remaining_weight: Option<f64>,
    #[serde(default)]
    pub used_weight: Option<f64>,
    #[serde(default)]
    pub last_used: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Spool {
    pub fn new(id: SpoolId) -> Self {
        Self {
            id,
            filament: None,
            remaining_weight: None,
            used_weight: None,
            last_used: None,
            extra: BTreeMap::new(),
        }
    }

    /// Decoded string value of an extra field; empty strings count as unset.
    pub fn extra_str(&self, field: &str) -> Option<String> {
        self.extra
            .get(field)
            .and_then(|raw| serde_json::from_str::<String>(raw).ok())
            .filter(|value| !value.is_empty())
    }

    pub fn active_tray(&self) -> Option<String> {
        self.extra_str(ACTIVE_TRAY_FIELD)
    }

    pub fn tag(&self) -> Option<String> {
        self.extra_str(TAG_FIELD)
    }

    pub fn is_active_for(&self, tray_key: &str) -> bool {
        self.active_tray().as_deref() == Some(tray_key)
    }

    /// Colors of a multi-color filament, split from the comma separated form.
    pub fn multi_colors(&self) -> Vec<String> {
        self.filament
            .as_ref()
            .and_then(|f| f.multi_color_hexes.as_deref())
            .map(|hexes| hexes.split(',').map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Encode a plain string the way the inventory stores extra values.
pub fn encode_extra_value(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySettings {
    pub extra_fields_spool: Value,
    pub extra_fields_filament: Value,
    pub base_url: String,
    pub currency: String,
}

impl InventorySettings {
    /// Decode the raw `/setting/` document, where every value is a JSON string
    /// wrapped in `{"value": ...}`.
    pub fn from_raw(raw: &Value) -> InventoryResult<Self> {
        let setting = |key: &str| -> InventoryResult<&str> {
            raw.get(key)
                .and_then(|s| s.get("value"))
                .and_then(Value::as_str)
                .ok_or_else(|| InventoryError::Settings(format!("missing setting '{key}'")))
        };

        Ok(Self {
            extra_fields_spool: serde_json::from_str(setting("extra_fields_spool")?)?,
            extra_fields_filament: serde_json::from_str(setting("extra_fields_filament")?)?,
            base_url: setting("base_url")?.replace('"', ""),
            currency: setting("currency")?.replace('"', ""),
        })
    }
}
