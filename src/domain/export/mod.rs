//! Export domain - formats, options, status lifecycle, results and errors.

mod errors;
mod events;
mod format;
mod options;
mod result;
mod status;

pub use errors::ExportError;
pub use events::{ExportStatusChanged, GenerationEvent, GenerationStage};
pub use format::ExportFormat;
pub use options::{
    AccessibilityOptions, CompressionOptions, ExportOptions, FormatLimits, GenerationOptions,
    GenerationOptionsPatch, MemoryThresholds, RetryPolicy, ValidationRules,
};
pub use result::{
    ExportResult, GenerationMetrics, GenerationResult, MemoryStats, RenderedContent,
    ResultMetadata,
};
pub use status::{ExportMetrics, ExportState, ExportStatus};
