//! Durable print history: one row per print job plus one row per filament
//! slot it consumed, with the spool that supplied it once known.

mod error;
mod store;

pub use error::{HistoryError, HistoryResult};
pub use store::{
    FilamentUsageRecord, HistoryStore, NewFilamentUsage, NewPrint, PrintId, PrintRecord,
};
