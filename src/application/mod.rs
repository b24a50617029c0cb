//! Application layer - Orchestration over the ports.
//!
//! The export manager is the single writer of status records and the only
//! caller of the circuit breaker.

pub mod handlers;

pub use handlers::{
    ExportManager, StatusSweeper, StatusSweeperConfig, SweepFn, DEFAULT_STATUS_RETENTION,
};
