use std::{io, path::PathBuf};

use thiserror::Error;

pub type PlanResult<T> = Result<T, PlanError>;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("download of '{url}' returned status {status}")]
    Status { url: String, status: u16 },
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no printer file store configured for '{0}'")]
    NoPrinterStore(String),
    #[error("printer file store error: {0}")]
    PrinterStore(String),
    #[error("invalid 3MF archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("archive entry '{0}' not found")]
    MissingEntry(String),
    #[error("slice metadata is not valid XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("malformed slice metadata: {0}")]
    Malformed(String),
}

pub(crate) fn io_error(path: impl Into<PathBuf>, err: io::Error) -> PlanError {
    PlanError::Io {
        path: path.into(),
        source: err,
    }
}
