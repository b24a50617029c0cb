//! Generation adapters - the Document Generator and the stages it drives.
//!
//! - `TemplateEngine` - per-format renderer cache and format preconditions
//! - `FormatConverter` - renderer dispatch, conversion metrics, error log
//! - `DocumentGenerator` - validate → template → convert for one document
//! - `PipelineExportGenerator` - the `ExportGenerator` port over all three

mod format_converter;
mod generator;
mod pipeline;
mod template_engine;

pub use format_converter::{
    ConversionFailure, ConversionMetrics, FormatConverter, DEFAULT_ERROR_LOG_CAPACITY,
    DEFAULT_STREAM_TIMEOUT,
};
pub use generator::{estimate_pages, DocumentGenerator};
pub use pipeline::PipelineExportGenerator;
pub use template_engine::TemplateEngine;
