//! HTTP adapters - REST API implementations.

pub mod export;

// Re-export key types for convenience
pub use export::{export_router, ExportApiError, ExportAppState};
