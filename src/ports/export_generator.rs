//! Export Generator Port - the operation guarded by retry and the breaker.
//!
//! The Export Manager drives one generation per attempt through this trait.
//! Adapters (like `PipelineExportGenerator`) build a document generator for
//! the job and run validate → render template → convert format.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use crate::domain::document::Document;
use crate::domain::export::{ExportError, GenerationEvent, GenerationOptions, GenerationResult};
use crate::domain::foundation::CorrelationId;

/// Port for producing one rendered artifact.
///
/// # Contract
///
/// Implementations must:
/// - Leave the document untouched, so a retried job is side-effect free
/// - Check the job's cancellation token at each progress checkpoint
/// - Report renderer failures as `ExportError::Conversion`
/// - Report format limit violations as `ExportError::FormatUnsupported`
#[async_trait]
pub trait ExportGenerator: Send + Sync {
    /// Generate the artifact described by `job`.
    async fn generate(&self, job: GenerationJob) -> Result<GenerationResult, ExportError>;
}

/// Everything one generation attempt needs.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub correlation_id: CorrelationId,
    pub document: Arc<Document>,
    pub options: GenerationOptions,
    /// Receives lifecycle events, if anyone listens.
    pub events: Option<UnboundedSender<GenerationEvent>>,
    pub cancellation: CancellationToken,
}

impl GenerationJob {
    pub fn new(correlation_id: CorrelationId, document: Arc<Document>, options: GenerationOptions) -> Self {
        Self {
            correlation_id,
            document,
            options,
            events: None,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_events(mut self, events: UnboundedSender<GenerationEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Sends an event; a dropped receiver is not an error.
    pub fn emit(&self, event: GenerationEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

/// Shared flag checked cooperatively at generation checkpoints.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns `ExportError::Cancelled` once cancelled.
    pub fn check(&self) -> Result<(), ExportError> {
        if self.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(clone.check().is_ok());
        token.cancel();
        assert_eq!(clone.check(), Err(ExportError::Cancelled));
    }

    #[test]
    fn export_generator_is_object_safe() {
        fn check<T: ExportGenerator + ?Sized>() {}
        check::<dyn ExportGenerator>();
    }
}
