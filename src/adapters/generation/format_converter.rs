//! Format Converter - dispatch to a renderer with metrics and an error log.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::adapters::render::{RenderError, Renderer};
use crate::domain::document::Document;
use crate::domain::export::{ExportError, ExportFormat, GenerationOptions, RenderedContent};
use crate::domain::foundation::Timestamp;

/// Errors kept for diagnostics.
pub const DEFAULT_ERROR_LOG_CAPACITY: usize = 100;

/// Upper bound on waiting for a blocking PDF render to finish.
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// Counters across every conversion this converter performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionMetrics {
    pub conversions: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_ms: u64,
    pub last_ms: u64,
}

/// One failed conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionFailure {
    pub at: Timestamp,
    pub format: ExportFormat,
    pub message: String,
}

/// Runs renderers and maps their failures to `ExportError::Conversion`.
///
/// Shared between generations; the counters and error log are process-wide
/// for one pipeline.
#[derive(Debug)]
pub struct FormatConverter {
    metrics: Mutex<ConversionMetrics>,
    errors: Mutex<VecDeque<ConversionFailure>>,
    error_log_capacity: usize,
    stream_timeout: Duration,
}

impl Default for FormatConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatConverter {
    pub fn new() -> Self {
        Self {
            metrics: Mutex::new(ConversionMetrics::default()),
            errors: Mutex::new(VecDeque::new()),
            error_log_capacity: DEFAULT_ERROR_LOG_CAPACITY,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
        }
    }

    pub fn with_error_log_capacity(mut self, capacity: usize) -> Self {
        self.error_log_capacity = capacity;
        self
    }

    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Re-validates the document, renders it and records the outcome.
    ///
    /// PDF rendering runs on the blocking pool and is awaited for at most
    /// the stream timeout.
    pub async fn convert(
        &self,
        document: Arc<Document>,
        renderer: &Renderer,
        options: &GenerationOptions,
    ) -> Result<RenderedContent, ExportError> {
        document.ensure_fresh()?;

        let format = renderer.format();
        let started = Instant::now();
        let outcome = match renderer {
            Renderer::Pdf(_) => self.render_blocking(document, renderer.clone(), options.clone()).await,
            Renderer::Markdown(_) | Renderer::Notion(_) => renderer.render(&document, options),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let mut metrics = self.lock_metrics();
        metrics.conversions += 1;
        metrics.total_ms += elapsed_ms;
        metrics.last_ms = elapsed_ms;

        match outcome {
            Ok(content) => {
                metrics.successes += 1;
                tracing::debug!(%format, elapsed_ms, bytes = content.len(), "Conversion succeeded");
                Ok(content)
            }
            Err(e) => {
                metrics.failures += 1;
                drop(metrics);
                let message = e.to_string();
                tracing::warn!(%format, elapsed_ms, error = %message, "Conversion failed");
                self.log_error(format, &message);
                Err(ExportError::conversion(format, message))
            }
        }
    }

    async fn render_blocking(
        &self,
        document: Arc<Document>,
        renderer: Renderer,
        options: GenerationOptions,
    ) -> Result<RenderedContent, RenderError> {
        let task = tokio::task::spawn_blocking(move || renderer.render(&document, &options));
        match tokio::time::timeout(self.stream_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(RenderError::Stream(format!("render task failed: {}", join))),
            Err(_) => Err(RenderError::Timeout(self.stream_timeout)),
        }
    }

    pub fn metrics(&self) -> ConversionMetrics {
        *self.lock_metrics()
    }

    /// Most recent failures, oldest first.
    pub fn recent_errors(&self) -> Vec<ConversionFailure> {
        self.lock_errors().iter().cloned().collect()
    }

    fn log_error(&self, format: ExportFormat, message: &str) {
        if self.error_log_capacity == 0 {
            return;
        }
        let mut errors = self.lock_errors();
        while errors.len() >= self.error_log_capacity {
            errors.pop_front();
        }
        errors.push_back(ConversionFailure {
            at: Timestamp::now(),
            format,
            message: message.to_string(),
        });
    }

    fn lock_metrics(&self) -> MutexGuard<'_, ConversionMetrics> {
        self.metrics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_errors(&self) -> MutexGuard<'_, VecDeque<ConversionFailure>> {
        self.errors.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
