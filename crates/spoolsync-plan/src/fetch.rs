//! Retrieval of job archives from the three kinds of file references a
//! printer reports.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::archive::read_plan;
use crate::error::{PlanError, PlanResult, io_error};
use crate::plan::UsagePlan;

/// Prefix marking a reference to the local filesystem.
pub const LOCAL_PREFIX: &str = "local:";
/// Directory on the printer's own storage where sent jobs are cached.
pub const PRINTER_CACHE_DIR: &str = "/cache/";

/// Where a job archive lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRef {
    Url(String),
    Local(PathBuf),
    Printer(String),
}

impl FileRef {
    pub fn parse(reference: &str) -> Self {
        if reference.starts_with("http") {
            FileRef::Url(reference.to_string())
        } else if let Some(path) = reference.strip_prefix(LOCAL_PREFIX) {
            FileRef::Local(PathBuf::from(path))
        } else {
            FileRef::Printer(reference.to_string())
        }
    }

    /// Base name of the referenced file.
    pub fn file_name(&self) -> String {
        match self {
            FileRef::Url(raw) => url::Url::parse(raw)
                .ok()
                .and_then(|u| u.path_segments().and_then(|s| s.last()).map(str::to_string))
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| raw.clone()),
            FileRef::Local(path) => base_name(path),
            FileRef::Printer(name) => base_name(Path::new(name)),
        }
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Access to files stored on the printer itself.
///
/// The transfer protocol is left to the implementor; `path` is absolute on the
/// printer (e.g. `/cache/cube.3mf`).
#[async_trait]
pub trait PrinterFileStore: Send + Sync {
    async fn retrieve(&self, path: &str) -> PlanResult<Vec<u8>>;
}

/// Anything that can turn a job file reference into a usage plan.
#[async_trait]
pub trait PlanSource: Send + Sync {
    async fn fetch_plan(&self, reference: &str) -> PlanResult<UsagePlan>;
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
        }
    }
}

/// Default [`PlanSource`]: downloads, reads or retrieves the archive and parses it.
pub struct ArchiveFetcher {
    client: Client,
    printer: Option<Arc<dyn PrinterFileStore>>,
}

impl ArchiveFetcher {
    pub fn new(config: FetchConfig) -> PlanResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            printer: None,
        })
    }

    pub fn with_printer_store(mut self, store: Arc<dyn PrinterFileStore>) -> Self {
        self.printer = Some(store);
        self
    }

    pub async fn fetch_bytes(&self, file_ref: &FileRef) -> PlanResult<Vec<u8>> {
        match file_ref {
            FileRef::Url(url) => {
                info!(%url, "downloading job archive");
                let response = self.client.get(url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(PlanError::Status {
                        url: url.clone(),
                        status: status.as_u16(),
                    });
                }
                Ok(response.bytes().await?.to_vec())
            }
            FileRef::Local(path) => {
                debug!(path = %path.display(), "reading job archive from disk");
                tokio::fs::read(path).await.map_err(|e| io_error(path, e))
            }
            FileRef::Printer(name) => {
                let store = self
                    .printer
                    .as_ref()
                    .ok_or_else(|| PlanError::NoPrinterStore(name.clone()))?;
                let path = format!("{PRINTER_CACHE_DIR}{name}");
                info!(%path, "retrieving job archive from printer");
                store.retrieve(&path).await
            }
        }
    }
}

#[async_trait]
impl PlanSource for ArchiveFetcher {
    async fn fetch_plan(&self, reference: &str) -> PlanResult<UsagePlan> {
        let file_ref = FileRef::parse(reference);
        let bytes = self.fetch_bytes(&file_ref).await?;
        read_plan(Cursor::new(bytes), &file_ref.file_name())
    }
}
