use std::{io, path::PathBuf};

use thiserror::Error;

pub type HostResult<T> = Result<T, HostError>;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("history error: {0}")]
    History(#[from] spoolsync_history::HistoryError),
    #[error("inventory error: {0}")]
    Inventory(#[from] spoolsync_inventory::InventoryError),
    #[error("plan source error: {0}")]
    Plan(#[from] spoolsync_plan::PlanError),
}

pub(crate) fn io_error(path: impl Into<PathBuf>, err: io::Error) -> HostError {
    HostError::Io {
        path: path.into(),
        source: err,
    }
}
