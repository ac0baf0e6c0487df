use std::sync::Arc;

use spoolsync_history::HistoryStore;
use spoolsync_inventory::{ActiveTrayRegistry, DynInventory, HttpInventory, HttpInventoryConfig};
use spoolsync_plan::{ArchiveFetcher, FetchConfig, PrinterFileStore};
use spoolsync_tracker::{SessionConfig, TrackerSession};
use tracing::info;

use crate::config::HostConfig;
use crate::error::HostResult;

/// Inventory client for the configured Spoolman server.
pub fn http_inventory(config: &HostConfig) -> HostResult<DynInventory> {
    let inventory = HttpInventory::new(HttpInventoryConfig {
        api_url: config.spoolman_api_url(),
        timeout: config.http_timeout,
    })?;
    Ok(Arc::new(inventory))
}

/// Wire a tracker session from host configuration.
///
/// Without a printer file store, jobs referenced by bare file name cannot be
/// fetched and are skipped.
pub fn open_session(
    config: &HostConfig,
    inventory: DynInventory,
    printer_store: Option<Arc<dyn PrinterFileStore>>,
) -> HostResult<TrackerSession> {
    let mut fetcher = ArchiveFetcher::new(FetchConfig::default())?;
    if let Some(store) = printer_store {
        fetcher = fetcher.with_printer_store(store);
    }
    let history = HistoryStore::open(&config.history_db)?;
    info!(db = %config.history_db.display(), printer = %config.printer_id, "tracker session opened");

    let session_config = SessionConfig {
        layout: config.layout(),
        auto_spend: config.auto_spend,
        thumbnail_dir: config.thumbnail_dir.clone(),
    };
    Ok(TrackerSession::new(
        ActiveTrayRegistry::new(inventory),
        Arc::new(fetcher),
        history,
        session_config,
    ))
}
