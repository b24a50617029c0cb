//! Route configuration for export endpoints.
//!
//! Configures Axum router with export-related routes.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{
    cancel_export, download_document, export_document, get_export_status, health, ExportAppState,
};

/// Creates the export router with all endpoints.
///
/// Routes:
/// - `POST /api/export` - Export a document, returning metadata and text content
/// - `POST /api/export/download` - Export a document, returning the raw artifact
/// - `GET /api/export/health` - Circuit breaker state
/// - `GET /api/export/:id/status` - Status record for one export
/// - `POST /api/export/:id/cancel` - Cancel a running export
pub fn export_router() -> Router<ExportAppState> {
    Router::new()
        .route("/api/export", post(export_document))
        .route("/api/export/download", post(download_document))
        .route("/api/export/health", get(health))
        .route("/api/export/:id/status", get(get_export_status))
        .route("/api/export/:id/cancel", post(cancel_export))
}
