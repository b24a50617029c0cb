//! Application handlers.
//!
//! Orchestration that coordinates domain rules with the ports.

pub mod export;

pub use export::{
    ExportManager, StatusSweeper, StatusSweeperConfig, SweepFn, DEFAULT_STATUS_RETENTION,
};
