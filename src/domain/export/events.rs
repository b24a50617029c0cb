//! Lifecycle notifications.
//!
//! Generation events flow from the document generator to whoever holds the
//! receiving end of the job's channel. Status changes are delivered to
//! registered [`ExportStatusListener`](crate::ports::ExportStatusListener)s.

use crate::domain::foundation::{CorrelationId, Percentage, Timestamp};

use super::result::ResultMetadata;
use super::status::ExportState;

/// Discrete events emitted while one document is generated.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    /// The document failed validation; nothing was rendered.
    ValidationFailed { errors: Vec<String> },
    /// Progress crossed a reporting checkpoint.
    Progress { percent: Percentage, stage: GenerationStage },
    /// Memory crossed a configured threshold.
    MemoryWarning { bytes: u64, critical: bool },
    /// Generation finished.
    Completed { metadata: ResultMetadata },
    /// Generation failed.
    Error { message: String },
}

/// Named checkpoints of one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    Validated,
    TemplateRendered,
    Converted,
}

/// A status record moved to a new state.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportStatusChanged {
    pub correlation_id: CorrelationId,
    pub previous: Option<ExportState>,
    pub current: ExportState,
    pub progress: Percentage,
    pub error: Option<String>,
    pub occurred_at: Timestamp,
}

impl ExportStatusChanged {
    pub fn new(
        correlation_id: CorrelationId,
        previous: Option<ExportState>,
        current: ExportState,
        progress: Percentage,
        error: Option<String>,
    ) -> Self {
        Self {
            correlation_id,
            previous,
            current,
            progress,
            error,
            occurred_at: Timestamp::now(),
        }
    }
}
