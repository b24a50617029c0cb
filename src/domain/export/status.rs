//! Export status record and its lifecycle state machine.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    CorrelationId, Percentage, StateMachine, Timestamp, ValidationError,
};

use super::format::ExportFormat;

/// Lifecycle of one export request.
///
/// ```text
/// Pending --> Processing --> Completed
///                      \--> Failed
/// Pending --> Failed   (validation rejected before processing)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl StateMachine for ExportState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ExportState::*;
        matches!(
            (self, target),
            (Pending, Processing) | (Pending, Failed) | (Processing, Completed) | (Processing, Failed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ExportState::*;
        match self {
            Pending => vec![Processing, Failed],
            Processing => vec![Completed, Failed],
            Completed | Failed => vec![],
        }
    }
}

impl std::fmt::Display for ExportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExportState::Pending => "pending",
            ExportState::Processing => "processing",
            ExportState::Completed => "completed",
            ExportState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Runtime figures recorded against a status record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetrics {
    pub duration_ms: Option<u64>,
    pub memory_usage_bytes: Option<u64>,
    pub retry_count: u32,
}

/// Queryable status of one export request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportStatus {
    pub correlation_id: CorrelationId,
    pub status: ExportState,
    pub progress: Percentage,
    pub format: ExportFormat,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub error: Option<String>,
    pub metrics: ExportMetrics,
}

impl ExportStatus {
    /// Creates a fresh record in `Pending`.
    pub fn pending(correlation_id: CorrelationId, format: ExportFormat) -> Self {
        Self {
            correlation_id,
            status: ExportState::Pending,
            progress: Percentage::ZERO,
            format,
            started_at: Timestamp::now(),
            ended_at: None,
            error: None,
            metrics: ExportMetrics::default(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Moves to `Processing`.
    pub fn start_processing(&mut self) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(ExportState::Processing)?;
        Ok(())
    }

    /// Records progress; ignored once terminal and never moves backwards.
    pub fn record_progress(&mut self, progress: Percentage) {
        if !self.is_terminal() && progress > self.progress {
            self.progress = progress;
        }
    }

    /// Moves to `Completed` with final metrics.
    pub fn complete(&mut self, metrics: ExportMetrics) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(ExportState::Completed)?;
        let ended = Timestamp::now();
        self.progress = Percentage::HUNDRED;
        self.metrics = ExportMetrics {
            duration_ms: metrics
                .duration_ms
                .or_else(|| Some(ended.millis_since(&self.started_at))),
            ..metrics
        };
        self.ended_at = Some(ended);
        Ok(())
    }

    /// Moves to `Failed` recording the triggering message.
    pub fn fail(&mut self, message: impl Into<String>, retry_count: u32) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(ExportState::Failed)?;
        let ended = Timestamp::now();
        self.error = Some(message.into());
        self.metrics.retry_count = retry_count;
        self.metrics.duration_ms = Some(ended.millis_since(&self.started_at));
        self.ended_at = Some(ended);
        Ok(())
    }
}
