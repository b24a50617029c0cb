//! Export pipeline error taxonomy.

use std::time::Duration;

use thiserror::Error;

use crate::domain::foundation::{CorrelationId, ErrorCode, ValidationError};

use super::format::ExportFormat;

/// Errors surfaced by the export pipeline.
///
/// | Variant | Retried | Counts toward breaker |
/// |---------|---------|-----------------------|
/// | `Validation` | no | no |
/// | `FormatUnsupported` | no | no |
/// | `Conversion` | yes | yes |
/// | `Timeout` | yes | yes |
/// | `CircuitOpen` | no | no |
/// | `NotFound` | no | no |
/// | `AlreadyExists` | no | no |
/// | `Cancelled` | no | no |
/// | `Internal` | no | yes |
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExportError {
    /// Content failed structural or security checks.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Format outside the allowed set or beyond a format limit.
    #[error("Unsupported export format: {0}")]
    FormatUnsupported(String),

    /// A renderer failed while producing output.
    #[error("{format} conversion failed: {message}")]
    Conversion {
        format: ExportFormat,
        message: String,
    },

    /// The circuit breaker is open.
    #[error("Export service unavailable: {0}")]
    CircuitOpen(String),

    /// One attempt exceeded its time budget.
    #[error("Export attempt timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Unknown or evicted correlation id.
    #[error("Export not found: {0}")]
    NotFound(CorrelationId),

    /// A record with this correlation id is already tracked.
    #[error("Export already exists: {0}")]
    AlreadyExists(CorrelationId),

    /// The caller cancelled the export.
    #[error("Export cancelled")]
    Cancelled,

    /// Unexpected internal failure.
    #[error("Internal export error: {0}")]
    Internal(String),
}

impl ExportError {
    /// Creates a format-unsupported error.
    pub fn format_unsupported(reason: impl Into<String>) -> Self {
        Self::FormatUnsupported(reason.into())
    }

    /// Creates a conversion error for a format.
    pub fn conversion(format: ExportFormat, message: impl Into<String>) -> Self {
        Self::Conversion {
            format,
            message: message.into(),
        }
    }

    /// Creates a circuit-open error.
    pub fn circuit_open(reason: impl Into<String>) -> Self {
        Self::CircuitOpen(reason.into())
    }

    /// Creates an internal error.
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExportError::Conversion { .. } | ExportError::Timeout(_))
    }

    /// Whether the failure is charged against the downstream's health.
    pub fn counts_as_failure(&self) -> bool {
        matches!(
            self,
            ExportError::Conversion { .. } | ExportError::Timeout(_) | ExportError::Internal(_)
        )
    }

    /// Machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            ExportError::Validation(_) => ErrorCode::ValidationFailed,
            ExportError::FormatUnsupported(_) => ErrorCode::FormatUnsupported,
            ExportError::Conversion { .. } => ErrorCode::ConversionFailed,
            ExportError::CircuitOpen(_) => ErrorCode::ServiceUnavailable,
            ExportError::Timeout(_) => ErrorCode::Timeout,
            ExportError::NotFound(_) => ErrorCode::ExportNotFound,
            ExportError::AlreadyExists(_) => ErrorCode::ExportConflict,
            ExportError::Cancelled => ErrorCode::Cancelled,
            ExportError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conversion_and_timeout_are_retryable() {
        assert!(ExportError::conversion(ExportFormat::Pdf, "boom").is_retryable());
        assert!(ExportError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!ExportError::format_unsupported("HTML").is_retryable());
        assert!(!ExportError::circuit_open("open").is_retryable());
        assert!(!ExportError::Validation(ValidationError::empty_field("title")).is_retryable());
        assert!(!ExportError::Cancelled.is_retryable());
    }

    #[test]
    fn caller_errors_do_not_count_against_breaker() {
        assert!(!ExportError::format_unsupported("too big").counts_as_failure());
        assert!(!ExportError::Cancelled.counts_as_failure());
        assert!(ExportError::internal("bug").counts_as_failure());
    }

    #[test]
    fn conversion_message_keeps_original_cause() {
        let err = ExportError::conversion(ExportFormat::Notion, "block missing payload");
        assert_eq!(err.to_string(), "NOTION conversion failed: block missing payload");
    }

    #[test]
    fn timeout_displays_millis() {
        let err = ExportError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Export attempt timed out after 250ms");
    }

    #[test]
    fn codes_map_to_categories() {
        assert_eq!(ExportError::circuit_open("x").code(), ErrorCode::ServiceUnavailable);
        assert_eq!(ExportError::NotFound(CorrelationId::new()).code(), ErrorCode::ExportNotFound);
        assert_eq!(ExportError::AlreadyExists(CorrelationId::new()).code(), ErrorCode::ExportConflict);
    }
}
