use thiserror::Error;

use crate::spool::SpoolId;

pub type InventoryResult<T> = Result<T, InventoryError>;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("inventory returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("spool {0} not found")]
    SpoolNotFound(SpoolId),
    #[error("invalid settings: {0}")]
    Settings(String),
}
