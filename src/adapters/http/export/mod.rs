//! HTTP adapter for the export pipeline.
//!
//! # Endpoints
//!
//! - `POST /api/export` - Export a document
//! - `POST /api/export/download` - Export a document as a file download
//! - `GET /api/export/:id/status` - Query an export's status record
//! - `POST /api/export/:id/cancel` - Cancel a running export
//! - `GET /api/export/health` - Circuit breaker health

pub mod dto;
pub mod handlers;
pub mod routes;

// Re-export commonly used types
pub use handlers::{ExportApiError, ExportAppState, CORRELATION_ID_HEADER};
pub use routes::export_router;
