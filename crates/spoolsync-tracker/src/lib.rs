//! Print-session tracking: folds printer telemetry into a running state,
//! watches for job starts and filament swaps, reconstructs which tray fed
//! which planned slot, and books the consumption against the inventory.

pub mod detect;
pub mod mapping;
pub mod reconcile;
mod session;
pub mod state;

pub use detect::{StageEvent, detect, project_file_url};
pub use mapping::{PendingMapping, SlotAssignment, TrayMapping};
pub use reconcile::{Deduction, ReconcileReport, reconcile};
pub use session::{CycleOutcome, SessionConfig, TrackerSession};
pub use state::{PrinterState, merge};
