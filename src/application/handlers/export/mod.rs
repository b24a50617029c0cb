//! Export handlers.
//!
//! - `ExportManager` - validation, guarded generation, status records
//! - `StatusSweeper` - periodic eviction of expired state

mod export_manager;
mod status_sweeper;

pub use export_manager::{ExportManager, DEFAULT_STATUS_RETENTION};
pub use status_sweeper::{StatusSweeper, StatusSweeperConfig, SweepFn};
