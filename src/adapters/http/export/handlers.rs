//! HTTP handlers for export endpoints.
//!
//! These handlers connect Axum routes to the export manager.

use std::sync::Arc;

use axum::extract::{Json, Path, State};
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::application::ExportManager;
use crate::domain::export::{ExportError, ExportOptions, ExportResult};
use crate::domain::foundation::{CorrelationId, ErrorCode};

use super::dto::{CancelResponse, ErrorResponse, ExportRequest, ExportResponse, HealthResponse};

/// Response header carrying the correlation id of a download.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
#[derive(Clone)]
pub struct ExportAppState {
    pub manager: Arc<ExportManager>,
    /// Options every request starts from.
    pub defaults: Arc<ExportOptions>,
    /// Replace internal error detail with a generic message.
    pub redact_internal_errors: bool,
}

impl ExportAppState {
    pub fn new(manager: Arc<ExportManager>, defaults: ExportOptions) -> Self {
        Self {
            manager,
            defaults: Arc::new(defaults),
            redact_internal_errors: false,
        }
    }

    pub fn with_redacted_errors(mut self, redact: bool) -> Self {
        self.redact_internal_errors = redact;
        self
    }

    fn api_error(&self, err: ExportError, correlation_id: Option<CorrelationId>) -> ExportApiError {
        ExportApiError::from_export(err, correlation_id, self.redact_internal_errors)
    }

    async fn run_export(&self, request: ExportRequest) -> Result<ExportResult, ExportApiError> {
        let correlation_id = request.correlation_id.unwrap_or_default();
        let options = request
            .to_options(&self.defaults)
            .map_err(|e| self.api_error(e, Some(correlation_id)))?;

        self.manager
            .export_document_as(correlation_id, &request.content, options)
            .await
            .map_err(|e| self.api_error(e, Some(correlation_id)))
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/export - Export a document and return metadata plus text content
pub async fn export_document(
    State(state): State<ExportAppState>,
    Json(request): Json<ExportRequest>,
) -> Result<impl IntoResponse, ExportApiError> {
    let result = state.run_export(request).await?;
    Ok((StatusCode::OK, Json(ExportResponse::from(result))))
}

/// POST /api/export/download - Export a document and return the raw artifact
pub async fn download_document(
    State(state): State<ExportAppState>,
    Json(request): Json<ExportRequest>,
) -> Result<Response, ExportApiError> {
    let result = state.run_export(request).await?;

    let disposition = format!("attachment; filename=\"{}\"", result.metadata.filename);
    let headers = [
        (header::CONTENT_TYPE, header_value(&result.metadata.content_type)),
        (header::CONTENT_DISPOSITION, header_value(&disposition)),
        (
            HeaderName::from_static(CORRELATION_ID_HEADER),
            header_value(&result.correlation_id.to_string()),
        ),
    ];
    Ok((StatusCode::OK, headers, result.content.into_bytes()).into_response())
}

/// POST /api/export/:id/cancel - Request cancellation of a running export
pub async fn cancel_export(
    State(state): State<ExportAppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ExportApiError> {
    let id = parse_id(&id)?;
    let status = state
        .manager
        .cancel_export(&id)
        .map_err(|e| state.api_error(e, Some(id)))?;

    let response = CancelResponse {
        correlation_id: id,
        message: format!("Cancellation requested while {}", status.status),
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/export/:id/status - Current status record
pub async fn get_export_status(
    State(state): State<ExportAppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ExportApiError> {
    let id = parse_id(&id)?;
    let status = state
        .manager
        .get_export_status(&id)
        .map_err(|e| state.api_error(e, Some(id)))?;
    Ok(Json(status))
}

/// GET /api/export/health - Circuit state and tracked record count
pub async fn health(State(state): State<ExportAppState>) -> impl IntoResponse {
    Json(HealthResponse::new(
        state.manager.tracked_exports(),
        state.manager.circuit_metrics(),
    ))
}

fn parse_id(raw: &str) -> Result<CorrelationId, ExportApiError> {
    raw.parse().map_err(|_| {
        ExportApiError::BadRequest(ErrorResponse::bad_request(format!(
            "Invalid correlation ID format: {}",
            raw
        )))
    })
}

fn header_value(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts export errors to HTTP responses.
#[derive(Debug)]
pub enum ExportApiError {
    BadRequest(ErrorResponse),
    NotFound(ErrorResponse),
    Conflict(ErrorResponse),
    Unavailable(ErrorResponse),
    GatewayTimeout(ErrorResponse),
    Internal(ErrorResponse),
}

impl ExportApiError {
    /// Maps an export error to its HTTP category.
    ///
    /// With `redact_internal` set, internal and conversion failures carry a
    /// generic message; the detail is logged instead.
    pub fn from_export(
        err: ExportError,
        correlation_id: Option<CorrelationId>,
        redact_internal: bool,
    ) -> Self {
        let code = err.code();
        let body = |message: String| {
            ErrorResponse::new(code.as_str(), message).with_correlation_id(correlation_id)
        };

        match err {
            ExportError::Validation(ref inner) => ExportApiError::BadRequest(
                body(err.to_string()).with_details(serde_json::json!({ "field": inner.field() })),
            ),
            ExportError::FormatUnsupported(_) => ExportApiError::BadRequest(body(err.to_string())),
            ExportError::NotFound(_) => ExportApiError::NotFound(body(err.to_string())),
            ExportError::AlreadyExists(_) | ExportError::Cancelled => {
                ExportApiError::Conflict(body(err.to_string()))
            }
            ExportError::CircuitOpen(_) => ExportApiError::Unavailable(body(err.to_string())),
            ExportError::Timeout(_) => ExportApiError::GatewayTimeout(body(err.to_string())),
            ExportError::Conversion { .. } | ExportError::Internal(_) => {
                tracing::error!(
                    correlation_id = ?correlation_id,
                    code = %code,
                    error = %err,
                    "Export request failed"
                );
                let message = if redact_internal && code == ErrorCode::InternalError {
                    "An internal error occurred".to_string()
                } else if redact_internal {
                    "Document conversion failed".to_string()
                } else {
                    err.to_string()
                };
                ExportApiError::Internal(body(message))
            }
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ExportApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ExportApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ExportApiError::Conflict(_) => StatusCode::CONFLICT,
            ExportApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ExportApiError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ExportApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ExportApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            ExportApiError::BadRequest(body)
            | ExportApiError::NotFound(body)
            | ExportApiError::Conflict(body)
            | ExportApiError::Unavailable(body)
            | ExportApiError::GatewayTimeout(body)
            | ExportApiError::Internal(body) => body,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::export::ExportFormat;
    use crate::domain::foundation::ValidationError;
    use std::time::Duration;

    fn status_of(err: ExportError) -> StatusCode {
        ExportApiError::from_export(err, None, false).status_code()
    }

    #[test]
    fn error_categories_map_to_status_codes() {
        assert_eq!(
            status_of(ValidationError::empty_field("metadata.title").into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ExportError::format_unsupported("HTML")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ExportError::NotFound(CorrelationId::new())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ExportError::circuit_open("open")), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_of(ExportError::Timeout(Duration::from_secs(1))),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(ExportError::conversion(ExportFormat::Pdf, "stream closed")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status_of(ExportError::Cancelled), StatusCode::CONFLICT);
        assert_eq!(status_of(ExportError::AlreadyExists(CorrelationId::new())), StatusCode::CONFLICT);
    }

    #[test]
    fn redaction_hides_internal_detail_but_keeps_correlation_id() {
        let id = CorrelationId::new();
        let err = ExportApiError::from_export(ExportError::internal("lock poisoned at x.rs:12"), Some(id), true);
        let ExportApiError::Internal(body) = err else {
            panic!("expected internal error");
        };
        assert_eq!(body.message, "An internal error occurred");
        assert_eq!(body.code, "INTERNAL_ERROR");
        assert_eq!(body.correlation_id, Some(id));
    }

    #[test]
    fn validation_errors_name_the_field() {
        let err = ExportApiError::from_export(
            ValidationError::empty_field("metadata.title").into(),
            None,
            true,
        );
        let ExportApiError::BadRequest(body) = err else {
            panic!("expected bad request");
        };
        assert_eq!(body.code, "VALIDATION_FAILED");
        assert_eq!(body.details.unwrap()["field"], "metadata.title");
    }
}
