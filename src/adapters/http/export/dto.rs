//! Data Transfer Objects for export HTTP endpoints.
//!
//! Request bodies are camelCase JSON. The format travels as a free string
//! so that unknown formats surface as `FORMAT_UNSUPPORTED` rather than a
//! body-parsing rejection.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::document::DocumentContent;
use crate::domain::export::{
    AccessibilityOptions, CompressionOptions, ExportError, ExportFormat, ExportOptions,
    ExportResult, GenerationMetrics, ResultMetadata, RetryPolicy,
};
use crate::domain::foundation::CorrelationId;
use crate::ports::{CircuitBreakerMetrics, CircuitState};

// ════════════════════════════════════════════════════════════════════════════════
// Requests
// ════════════════════════════════════════════════════════════════════════════════

/// Body of `POST /api/export`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub content: DocumentContent,
    /// Wire name of the target format, e.g. `"MARKDOWN"`.
    pub format: String,
    #[serde(default)]
    pub options: Option<ExportRequestOptions>,
    /// Caller-chosen id, useful for cancelling a long export.
    #[serde(default)]
    pub correlation_id: Option<CorrelationId>,
}

/// Per-request overrides of the server defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequestOptions {
    pub include_graphs: Option<bool>,
    pub timeout_ms: Option<u64>,
    pub retry: Option<RetryRequest>,
    pub locale: Option<String>,
    pub timezone: Option<String>,
    pub compression: Option<CompressionOptions>,
    pub accessibility: Option<AccessibilityRequest>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryRequest {
    pub attempts: u32,
    pub delay_ms: u64,
    pub backoff: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilityRequest {
    #[serde(default = "default_true")]
    pub tagged: bool,
    pub language: Option<String>,
    pub document_role: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ExportRequest {
    /// Resolves the request against the server defaults.
    ///
    /// Validation rules always come from `defaults`; callers cannot raise
    /// the size ceiling or widen the format set.
    pub fn to_options(&self, defaults: &ExportOptions) -> Result<ExportOptions, ExportError> {
        let format: ExportFormat = self.format.parse()?;
        let mut options = defaults.clone();
        options.generation.format = format;

        let Some(overrides) = &self.options else {
            return Ok(options);
        };

        if let Some(include) = overrides.include_graphs {
            options.generation.include_graphs = include;
        }
        if let Some(ms) = overrides.timeout_ms {
            options.timeout = Duration::from_millis(ms);
        }
        if let Some(retry) = &overrides.retry {
            options.retry = RetryPolicy {
                max_attempts: retry.attempts,
                base_delay: Duration::from_millis(retry.delay_ms),
                backoff_factor: retry.backoff,
            };
        }
        if let Some(locale) = &overrides.locale {
            options.generation.locale = locale.clone();
        }
        if let Some(timezone) = &overrides.timezone {
            options.generation.timezone = timezone.clone();
        }
        if let Some(compression) = overrides.compression {
            options.generation.compression = compression;
        }
        if let Some(accessibility) = &overrides.accessibility {
            let current = &options.generation.accessibility;
            options.generation.accessibility = AccessibilityOptions {
                tagged: accessibility.tagged,
                language: accessibility
                    .language
                    .clone()
                    .unwrap_or_else(|| current.language.clone()),
                document_role: accessibility
                    .document_role
                    .clone()
                    .unwrap_or_else(|| current.document_role.clone()),
                display_title: current.display_title,
            };
        }
        Ok(options)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Responses
// ════════════════════════════════════════════════════════════════════════════════

/// Body returned by a successful `POST /api/export`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub correlation_id: CorrelationId,
    pub status: &'static str,
    pub metadata: ResultMetadata,
    pub metrics: GenerationMetrics,
    pub retry_count: u32,
    /// Rendered text; absent for binary formats, which are served by the
    /// download endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl From<ExportResult> for ExportResponse {
    fn from(result: ExportResult) -> Self {
        Self {
            correlation_id: result.correlation_id,
            status: "completed",
            content: result.content.as_text().map(str::to_string),
            metadata: result.metadata,
            metrics: result.metrics,
            retry_count: result.retry_count,
        }
    }
}

/// Body of `POST /api/export/:id/cancel`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub correlation_id: CorrelationId,
    pub message: String,
}

/// Body of `GET /api/export/health`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok` while the circuit accepts requests, `degraded` while open.
    pub status: &'static str,
    pub tracked_exports: usize,
    pub circuit: CircuitBreakerMetrics,
}

impl HealthResponse {
    pub fn new(tracked_exports: usize, circuit: CircuitBreakerMetrics) -> Self {
        let status = match circuit.state {
            Some(CircuitState::Open) => "degraded",
            _ => "ok",
        };
        Self {
            status,
            tracked_exports,
            circuit,
        }
    }
}

/// Standard error response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Request the error belongs to, when one was assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    /// Additional error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            correlation_id: None,
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn with_correlation_id(mut self, id: Option<CorrelationId>) -> Self {
        self.correlation_id = id;
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: serde_json::Value) -> ExportRequest {
        serde_json::from_value(body).unwrap()
    }

    fn minimal_content() -> serde_json::Value {
        json!({
            "metadata": { "id": "doc-1", "title": "Notes" },
            "sections": [{ "id": "s1", "title": "Intro", "content": "Hello world" }]
        })
    }

    #[test]
    fn export_request_deserializes_minimal_body() {
        let req = request(json!({ "content": minimal_content(), "format": "MARKDOWN" }));
        assert_eq!(req.format, "MARKDOWN");
        assert_eq!(req.content.sections.len(), 1);
        assert!(req.options.is_none());
        assert!(req.correlation_id.is_none());
    }

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let req = request(json!({
            "content": minimal_content(),
            "format": "pdf",
            "options": {
                "includeGraphs": false,
                "timeoutMs": 500,
                "retry": { "attempts": 2, "delayMs": 10, "backoff": 1.5 },
                "accessibility": { "language": "de-DE" }
            }
        }));
        let options = req.to_options(&ExportOptions::default()).unwrap();

        assert_eq!(options.format(), ExportFormat::Pdf);
        assert!(!options.generation.include_graphs);
        assert_eq!(options.timeout, Duration::from_millis(500));
        assert_eq!(options.retry.max_attempts, 2);
        assert_eq!(options.generation.accessibility.language, "de-DE");
        assert_eq!(options.generation.accessibility.document_role, "Document");
    }

    #[test]
    fn unknown_format_is_unsupported() {
        let req = request(json!({ "content": minimal_content(), "format": "HTML" }));
        let err = req.to_options(&ExportOptions::default()).unwrap_err();
        assert!(matches!(err, ExportError::FormatUnsupported(_)));
    }

    #[test]
    fn error_response_omits_empty_fields() {
        let body = serde_json::to_value(ErrorResponse::bad_request("nope")).unwrap();
        assert_eq!(body, json!({ "code": "BAD_REQUEST", "message": "nope" }));
    }

    #[test]
    fn health_is_degraded_while_open() {
        let metrics = CircuitBreakerMetrics {
            state: Some(CircuitState::Open),
            ..Default::default()
        };
        assert_eq!(HealthResponse::new(0, metrics).status, "degraded");
        assert_eq!(HealthResponse::new(0, CircuitBreakerMetrics::default()).status, "ok");
    }
}
