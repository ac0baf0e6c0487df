//! Usage-plan extraction: fetch a sliced 3MF archive and derive the per-slot
//! filament plan (planned grams plus first-use order of each slot).

pub mod archive;
mod error;
pub mod fetch;
pub mod gcode;
mod plan;

pub use archive::read_plan;
pub use error::{PlanError, PlanResult};
pub use fetch::{ArchiveFetcher, FetchConfig, FileRef, PlanSource, PrinterFileStore};
pub use gcode::filament_order;
pub use plan::{FilamentOrder, SlotId, SlotUsage, UsagePlan};
