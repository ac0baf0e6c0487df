use std::path::{Path, PathBuf};
use std::time::Duration;

use spoolsync_inventory::TrayLayout;

use crate::error::{HostError, HostResult};

const DEFAULT_SPOOLMAN_URL: &str = "http://localhost:7912";
const SPOOLMAN_API_PATH: &str = "/api/v1";

#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Printer serial; names the telemetry topics and tray keys.
    pub printer_id: String,
    pub printer_ip: Option<String>,
    pub access_code: Option<String>,
    /// Base URL of the Spoolman server (without `/api/v1`).
    pub spoolman_url: String,
    /// Book consumption for finished tray mappings.
    pub auto_spend: bool,
    pub trays_per_unit: u32,
    pub external_ams_id: u32,
    pub external_tray_id: u32,
    pub history_db: PathBuf,
    pub thumbnail_dir: Option<PathBuf>,
    pub http_timeout: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        let layout = TrayLayout::default();
        Self {
            printer_id: String::new(),
            printer_ip: None,
            access_code: None,
            spoolman_url: DEFAULT_SPOOLMAN_URL.into(),
            auto_spend: false,
            trays_per_unit: layout.trays_per_unit,
            external_ams_id: layout.external_ams_id,
            external_tray_id: layout.external_tray_id,
            history_db: PathBuf::from("data").join("3d_printer_logs.db"),
            thumbnail_dir: None,
            http_timeout: Duration::from_secs(10),
        }
    }
}

impl HostConfig {
    /// Build from process environment variables.
    pub fn from_env() -> HostResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. `SPOOLSYNC_*` names win over
    /// the legacy unprefixed ones.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> HostResult<Self> {
        let get = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| lookup(name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut cfg = Self::default();

        if let Some(id) = get(&["SPOOLSYNC_PRINTER_ID", "PRINTER_ID"]) {
            cfg.printer_id = id;
        }
        cfg.printer_ip = get(&["SPOOLSYNC_PRINTER_IP", "PRINTER_IP"]);
        cfg.access_code = get(&["SPOOLSYNC_PRINTER_ACCESS_CODE", "PRINTER_ACCESS_CODE"]);
        if let Some(url) = get(&["SPOOLSYNC_SPOOLMAN_URL", "SPOOLMAN_BASE_URL"]) {
            cfg.spoolman_url = url;
        }
        if let Some(raw) = get(&["SPOOLSYNC_AUTO_SPEND", "AUTO_SPEND"]) {
            cfg.auto_spend = parse_bool("AUTO_SPEND", &raw)?;
        }
        if let Some(raw) = get(&["SPOOLSYNC_TRAYS_PER_UNIT"]) {
            cfg.trays_per_unit = parse_num("SPOOLSYNC_TRAYS_PER_UNIT", &raw)?;
        }
        if let Some(raw) = get(&["SPOOLSYNC_EXTERNAL_AMS_ID", "EXTERNAL_SPOOL_AMS_ID"]) {
            cfg.external_ams_id = parse_num("EXTERNAL_SPOOL_AMS_ID", &raw)?;
        }
        if let Some(raw) = get(&["SPOOLSYNC_EXTERNAL_TRAY_ID", "EXTERNAL_SPOOL_ID"]) {
            cfg.external_tray_id = parse_num("EXTERNAL_SPOOL_ID", &raw)?;
        }
        if let Some(path) = get(&["SPOOLSYNC_HISTORY_DB"]) {
            cfg.history_db = PathBuf::from(path);
        }
        cfg.thumbnail_dir = get(&["SPOOLSYNC_THUMBNAIL_DIR"]).map(PathBuf::from);
        if let Some(raw) = get(&["SPOOLSYNC_HTTP_TIMEOUT_SECS"]) {
            cfg.http_timeout = Duration::from_secs(parse_num("SPOOLSYNC_HTTP_TIMEOUT_SECS", &raw)?);
        }

        if cfg.trays_per_unit == 0 {
            return Err(HostError::Config("trays per unit must be at least 1".into()));
        }
        Ok(cfg)
    }

    /// Spoolman REST root, e.g. `http://localhost:7912/api/v1`.
    pub fn spoolman_api_url(&self) -> String {
        let base = self.spoolman_url.trim_end_matches('/');
        if base.ends_with(SPOOLMAN_API_PATH) {
            base.to_string()
        } else {
            format!("{base}{SPOOLMAN_API_PATH}")
        }
    }

    pub fn layout(&self) -> TrayLayout {
        TrayLayout {
            printer_id: self.printer_id.clone(),
            trays_per_unit: self.trays_per_unit,
            external_ams_id: self.external_ams_id,
            external_tray_id: self.external_tray_id,
        }
    }
}

/// Load `path` as a `.env` file without overriding variables that are
/// already set. A missing file is not an error.
pub fn load_env_file(path: &Path) -> HostResult<()> {
    if !path.exists() {
        return Ok(());
    }
    let items = dotenvy::from_path_iter(path)
        .map_err(|err| HostError::Config(format!("load {}: {err}", path.display())))?;
    for item in items {
        let (key, val) =
            item.map_err(|err| HostError::Config(format!("parse {}: {err}", path.display())))?;
        if std::env::var_os(&key).is_none() {
            // SAFETY: called during startup before any worker threads read the environment.
            unsafe {
                std::env::set_var(&key, &val);
            }
        }
    }
    Ok(())
}

fn parse_bool(name: &str, raw: &str) -> HostResult<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(HostError::Config(format!("{name}: expected a boolean, got '{raw}'"))),
    }
}

fn parse_num<T: std::str::FromStr>(name: &str, raw: &str) -> HostResult<T> {
    raw.parse()
        .map_err(|_| HostError::Config(format!("{name}: expected a number, got '{raw}'")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> HostResult<HostConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        HostConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_variables() {
        let cfg = from_pairs(&[]).expect("config");
        assert!(!cfg.auto_spend);
        assert_eq!(cfg.trays_per_unit, 4);
        assert_eq!(cfg.spoolman_api_url(), "http://localhost:7912/api/v1");
        assert_eq!(cfg.layout().external().key(), "_255_254");
    }

    #[test]
    fn legacy_names_are_read() {
        let cfg = from_pairs(&[
            ("PRINTER_ID", "01P00A000000000"),
            ("PRINTER_IP", "192.168.1.20"),
            ("PRINTER_ACCESS_CODE", "12345678"),
            ("SPOOLMAN_BASE_URL", "http://spoolman:7912/"),
            ("AUTO_SPEND", "True"),
        ])
        .expect("config");
        assert_eq!(cfg.printer_id, "01P00A000000000");
        assert_eq!(cfg.printer_ip.as_deref(), Some("192.168.1.20"));
        assert_eq!(cfg.access_code.as_deref(), Some("12345678"));
        assert!(cfg.auto_spend);
        assert_eq!(cfg.spoolman_api_url(), "http://spoolman:7912/api/v1");
    }

    #[test]
    fn prefixed_names_win() {
        let cfg = from_pairs(&[
            ("PRINTER_ID", "legacy"),
            ("SPOOLSYNC_PRINTER_ID", "prefixed"),
            ("SPOOLSYNC_TRAYS_PER_UNIT", "1"),
        ])
        .expect("config");
        assert_eq!(cfg.printer_id, "prefixed");
        assert_eq!(cfg.layout().from_ordinal(2).key(), "prefixed_2_0");
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            from_pairs(&[("AUTO_SPEND", "maybe")]),
            Err(HostError::Config(_))
        ));
        assert!(matches!(
            from_pairs(&[("SPOOLSYNC_TRAYS_PER_UNIT", "0")]),
            Err(HostError::Config(_))
        ));
    }

    #[test]
    fn env_file_does_not_override() {
        let dir = tempfile::tempdir().expect("tmp");
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "SPOOLSYNC_TEST_ENV_FILE_NEW=from-file\nPATH=from-file\n",
        )
        .expect("write env");
        let path_before = std::env::var("PATH").ok();

        load_env_file(&path).expect("load");

        assert_eq!(
            std::env::var("SPOOLSYNC_TEST_ENV_FILE_NEW").ok().as_deref(),
            Some("from-file")
        );
        assert_eq!(std::env::var("PATH").ok(), path_before);
        load_env_file(&dir.path().join("missing.env")).expect("missing is fine");
    }
}
