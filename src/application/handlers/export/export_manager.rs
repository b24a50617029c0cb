//! ExportManager - Orchestrates one export request end to end.
//!
//! Owns the status records, the shared circuit breaker and the per-request
//! cancellation flags. Every status mutation goes through this type; readers
//! only ever receive copies.
//!
//! ```text
//! export_document
//!   ├─ insert Pending record
//!   ├─ validate (size, formats, security) ── fail ──▶ Failed
//!   ├─ Pending ──▶ Processing
//!   └─ attempt loop
//!        ├─ cancelled? ─────────────▶ Failed("Export cancelled")
//!        ├─ breaker rejects ────────▶ Failed(CircuitOpen)
//!        ├─ generate under timeout
//!        ├─ ok ─────────────────────▶ Completed(metrics)
//!        └─ retryable and budget left? sleep(backoff) : Failed(last error)
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::domain::document::{security, Document, DocumentContent};
use crate::domain::export::{
    ExportError, ExportMetrics, ExportOptions, ExportResult, ExportState, ExportStatus,
    ExportStatusChanged, GenerationEvent, GenerationResult,
};
use crate::domain::foundation::{CorrelationId, Percentage, Timestamp, ValidationError};
use crate::ports::{
    CancellationToken, CircuitBreaker, CircuitBreakerMetrics, CircuitState, ExportGenerator,
    ExportStatusListener, ExportStatusStore, GenerationJob,
};

/// How long terminal status records stay queryable.
pub const DEFAULT_STATUS_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Handler for export requests.
///
/// # Dependencies
///
/// - `ExportGenerator` - produces the artifact for one attempt
/// - `ExportStatusStore` - keyed status records
/// - `CircuitBreaker` - shared by every request this manager serves
///
/// # Usage
///
/// ```rust,ignore
/// let manager = ExportManager::new(generator, store, breaker);
/// let result = manager
///     .export_document(&content, ExportOptions::new(ExportFormat::Markdown))
///     .await?;
/// let status = manager.get_export_status(&result.correlation_id)?;
/// ```
pub struct ExportManager {
    generator: Arc<dyn ExportGenerator>,
    store: Arc<dyn ExportStatusStore>,
    breaker: Arc<dyn CircuitBreaker>,
    listeners: RwLock<Vec<Arc<dyn ExportStatusListener>>>,
    cancellations: Mutex<HashMap<CorrelationId, CancellationToken>>,
    retention: Duration,
}

impl ExportManager {
    pub fn new(
        generator: Arc<dyn ExportGenerator>,
        store: Arc<dyn ExportStatusStore>,
        breaker: Arc<dyn CircuitBreaker>,
    ) -> Self {
        Self {
            generator,
            store,
            breaker,
            listeners: RwLock::new(Vec::new()),
            cancellations: Mutex::new(HashMap::new()),
            retention: DEFAULT_STATUS_RETENTION,
        }
    }

    /// Overrides how long terminal records are kept before eviction.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Registers a callback for every status transition.
    pub fn add_listener(&self, listener: Arc<dyn ExportStatusListener>) {
        self.listeners
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .push(listener);
    }

    /// Exports `content` under a freshly assigned correlation id.
    pub async fn export_document(
        &self,
        content: &DocumentContent,
        options: ExportOptions,
    ) -> Result<ExportResult, ExportError> {
        self.export_document_as(CorrelationId::new(), content, options)
            .await
    }

    /// Exports `content` under a caller-chosen correlation id.
    ///
    /// Fails with `AlreadyExists` if the id is already tracked; the existing
    /// record is left alone.
    pub async fn export_document_as(
        &self,
        correlation_id: CorrelationId,
        content: &DocumentContent,
        options: ExportOptions,
    ) -> Result<ExportResult, ExportError> {
        let format = options.format();
        self.store
            .insert(ExportStatus::pending(correlation_id, format))?;

        // Registered with the record so a cancel while pending is honoured.
        let token = CancellationToken::new();
        self.cancellations
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(correlation_id, token.clone());

        self.notify(&ExportStatusChanged::new(
            correlation_id,
            None,
            ExportState::Pending,
            Percentage::ZERO,
            None,
        ));
        tracing::info!(%correlation_id, %format, "Export requested");

        let document = match validate_request(content, &options) {
            Ok(document) => Arc::new(document),
            Err(err) => {
                tracing::warn!(%correlation_id, %format, error = %err, "Export rejected by validation");
                self.unregister(&correlation_id);
                self.fail(&correlation_id, &err, 0);
                return Err(err);
            }
        };

        if let Err(err) = token.check() {
            tracing::info!(%correlation_id, %format, "Export cancelled before processing");
            self.unregister(&correlation_id);
            self.fail(&correlation_id, &err, 0);
            return Err(err);
        }

        if let Err(err) = self.transition(&correlation_id, |status| status.start_processing()) {
            self.unregister(&correlation_id);
            return Err(err);
        }

        let (events, receiver) = mpsc::unbounded_channel();
        let forwarder = self.forward_progress(correlation_id, receiver);
        let started = Instant::now();
        let outcome = self
            .run_guarded(correlation_id, document, &options, &token, events)
            .await;
        // All senders are gone once the attempt loop returns.
        let _ = forwarder.await;
        self.unregister(&correlation_id);

        match outcome {
            Ok((generation, retry_count)) => {
                let metrics = ExportMetrics {
                    duration_ms: Some(started.elapsed().as_millis() as u64),
                    memory_usage_bytes: Some(generation.metrics.memory.peak_bytes),
                    retry_count,
                };
                self.transition(&correlation_id, |status| status.complete(metrics.clone()))?;
                tracing::info!(
                    %correlation_id,
                    %format,
                    retry_count,
                    content_size = generation.metadata.content_size,
                    "Export completed"
                );
                Ok(ExportResult::from_generation(
                    correlation_id,
                    generation,
                    retry_count,
                ))
            }
            Err((err, retry_count)) => {
                tracing::error!(%correlation_id, %format, retry_count, error = %err, "Export failed");
                self.fail(&correlation_id, &err, retry_count);
                Err(err)
            }
        }
    }

    /// Returns a copy of the current status record.
    pub fn get_export_status(&self, id: &CorrelationId) -> Result<ExportStatus, ExportError> {
        self.store.get(id).ok_or(ExportError::NotFound(*id))
    }

    /// Requests cancellation of an in-flight export.
    ///
    /// The running attempt stops at its next checkpoint and the record ends
    /// `failed` with "Export cancelled". Returns the record as it stood when
    /// the request was accepted.
    pub fn cancel_export(&self, id: &CorrelationId) -> Result<ExportStatus, ExportError> {
        let status = self.get_export_status(id)?;
        if status.is_terminal() {
            return Err(ValidationError::invalid_format(
                "status",
                format!("export {} is already {}", id, status.status),
            )
            .into());
        }

        if let Some(token) = self
            .cancellations
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(id)
        {
            token.cancel();
        }
        tracing::info!(correlation_id = %id, state = %status.status, "Export cancellation requested");
        Ok(status)
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn circuit_metrics(&self) -> CircuitBreakerMetrics {
        self.breaker.metrics()
    }

    /// Number of records currently tracked.
    pub fn tracked_exports(&self) -> usize {
        self.store.len()
    }

    /// Evicts terminal records older than the retention window.
    pub fn sweep_expired(&self) -> usize {
        let cutoff = Timestamp::now().minus_secs(self.retention.as_secs());
        let evicted = self.store.evict_terminal_before(cutoff);
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted expired export status records");
        }
        evicted
    }

    // ════════════════════════════════════════════════════════════════
    // Guarded generation
    // ════════════════════════════════════════════════════════════════

    /// Runs the breaker-guarded retry loop. The error side carries the
    /// number of retries performed before giving up.
    async fn run_guarded(
        &self,
        correlation_id: CorrelationId,
        document: Arc<Document>,
        options: &ExportOptions,
        token: &CancellationToken,
        events: mpsc::UnboundedSender<GenerationEvent>,
    ) -> Result<(GenerationResult, u32), (ExportError, u32)> {
        let policy = &options.retry;
        let mut attempt: u32 = 1;

        loop {
            let retries = attempt - 1;
            token.check().map_err(|e| (e, retries))?;

            if !self.breaker.should_allow() {
                tracing::warn!(%correlation_id, attempt, "Circuit open, rejecting export attempt");
                return Err((
                    ExportError::circuit_open("renderer circuit is open, try again later"),
                    retries,
                ));
            }

            let job = GenerationJob::new(
                correlation_id,
                Arc::clone(&document),
                options.generation.clone(),
            )
            .with_cancellation(token.clone())
            .with_events(events.clone());

            let outcome = match tokio::time::timeout(options.timeout, self.generator.generate(job)).await {
                Ok(result) => result,
                Err(_) => Err(ExportError::Timeout(options.timeout)),
            };

            let err = match outcome {
                Ok(result) => {
                    self.breaker.record_success();
                    return Ok((result, retries));
                }
                Err(err) => err,
            };

            if err.counts_as_failure() {
                self.breaker.record_failure();
            } else {
                self.breaker.release();
            }

            if !err.is_retryable() || attempt >= policy.max_attempts {
                return Err((err, retries));
            }

            let delay = policy.delay_for_attempt(attempt);
            tracing::warn!(
                %correlation_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Export attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Applies progress events to the status record until every sender is dropped.
    fn forward_progress(
        &self,
        correlation_id: CorrelationId,
        mut receiver: mpsc::UnboundedReceiver<GenerationEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if let GenerationEvent::Progress { percent, .. } = event {
                    let _ = store.update(&correlation_id, &mut |status: &mut ExportStatus| {
                        status.record_progress(percent);
                        Ok(())
                    });
                }
            }
        })
    }

    // ════════════════════════════════════════════════════════════════
    // Status writes
    // ════════════════════════════════════════════════════════════════

    fn transition<F>(&self, id: &CorrelationId, mut change: F) -> Result<ExportStatus, ExportError>
    where
        F: FnMut(&mut ExportStatus) -> Result<(), ValidationError>,
    {
        let mut previous = None;
        let updated = self.store.update(id, &mut |status: &mut ExportStatus| {
            previous = Some(status.status);
            change(status)
        })?;
        self.notify(&ExportStatusChanged::new(
            *id,
            previous,
            updated.status,
            updated.progress,
            updated.error.clone(),
        ));
        Ok(updated)
    }

    /// Marks the record failed. Terminal failures always land in the store
    /// before the error reaches the caller.
    fn fail(&self, id: &CorrelationId, err: &ExportError, retry_count: u32) {
        let message = err.to_string();
        if let Err(store_err) = self.transition(id, |status| status.fail(message.clone(), retry_count)) {
            tracing::error!(correlation_id = %id, error = %store_err, "Failed to record export failure");
        }
    }

    fn unregister(&self, id: &CorrelationId) {
        self.cancellations
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(id);
    }

    fn notify(&self, event: &ExportStatusChanged) {
        let listeners = self.listeners.read().unwrap_or_else(|p| p.into_inner());
        for listener in listeners.iter() {
            listener.on_status_changed(event);
        }
    }
}

impl std::fmt::Debug for ExportManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportManager")
            .field("tracked_exports", &self.store.len())
            .field("circuit_state", &self.breaker.state())
            .field("retention", &self.retention)
            .finish()
    }
}

/// Request-level checks that run before anything is rendered.
fn validate_request(content: &DocumentContent, options: &ExportOptions) -> Result<Document, ExportError> {
    options.retry.validate()?;

    let format = options.format();
    if !options.validation.allowed_formats.contains(&format) {
        return Err(ExportError::format_unsupported(format!(
            "{} is not enabled for export",
            format
        )));
    }

    let size = content.serialized_size();
    let max = options.validation.max_content_size;
    if size > max {
        return Err(ValidationError::out_of_range("content", 0, max as i64, size as i64).into());
    }

    if options.validation.security_checks {
        security::check_content(content)?;
    }

    Ok(Document::new(content)?)
}
