//! Results produced by a successful generation.

use serde::Serialize;

use crate::domain::foundation::{CorrelationId, Timestamp};

use super::format::ExportFormat;

/// Rendered artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedContent {
    Text(String),
    Binary(Vec<u8>),
}

impl RenderedContent {
    pub fn len(&self) -> usize {
        match self {
            RenderedContent::Text(text) => text.len(),
            RenderedContent::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            RenderedContent::Text(text) => text.as_bytes(),
            RenderedContent::Binary(bytes) => bytes,
        }
    }

    /// Text view, if the artifact is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RenderedContent::Text(text) => Some(text),
            RenderedContent::Binary(_) => None,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            RenderedContent::Text(text) => text.into_bytes(),
            RenderedContent::Binary(bytes) => bytes,
        }
    }
}

/// Descriptive facts about a rendered artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub generated_at: Timestamp,
    pub format: ExportFormat,
    pub content_type: String,
    pub filename: String,
    pub content_size: usize,
    /// Best-effort estimate from character counts, not a measured layout.
    pub page_count: usize,
    pub graph_count: usize,
}

/// Resident memory sampled around the conversion step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub initial_bytes: u64,
    pub peak_bytes: u64,
    pub final_bytes: u64,
    pub low_bytes: u64,
}

/// Stage timings and memory figures for one generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetrics {
    pub validation_ms: u64,
    pub template_ms: u64,
    pub conversion_ms: u64,
    pub total_ms: u64,
    pub memory: MemoryStats,
}

/// Output of one successful generation. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub content: RenderedContent,
    pub metadata: ResultMetadata,
    pub metrics: GenerationMetrics,
}

/// Output of one successful export request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    pub correlation_id: CorrelationId,
    pub content: RenderedContent,
    pub metadata: ResultMetadata,
    pub metrics: GenerationMetrics,
    /// Failed attempts that preceded the successful one.
    pub retry_count: u32,
}

impl ExportResult {
    pub fn from_generation(
        correlation_id: CorrelationId,
        generation: GenerationResult,
        retry_count: u32,
    ) -> Self {
        Self {
            correlation_id,
            content: generation.content,
            metadata: generation.metadata,
            metrics: generation.metrics,
            retry_count,
        }
    }
}
