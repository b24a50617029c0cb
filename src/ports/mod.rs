//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the export core and its collaborators. Adapters implement these ports.
//!
//! - `ExportGenerator` - produces one artifact per attempt
//! - `ExportStatusStore` - keyed status records, single writer
//! - `ExportStatusListener` - status change callbacks
//! - `CircuitBreaker` - failure isolation around generation

mod circuit_breaker;
mod export_generator;
mod export_status_store;
mod status_listener;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState};
pub use export_generator::{CancellationToken, ExportGenerator, GenerationJob};
pub use export_status_store::{ExportStatusStore, StatusMutation};
pub use status_listener::{ExportStatusListener, NoOpStatusListener};
