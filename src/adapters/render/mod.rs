//! Renderers - pure transformations from a `Document` to one format.
//!
//! The set of renderers is closed. [`Renderer`] is the tagged variant the
//! rest of the pipeline dispatches on, so adding a format is a compile
//! error everywhere it is not yet handled.

mod markdown;
mod notion;
mod pdf;

use std::time::Duration;

use thiserror::Error;

use crate::domain::document::Document;
use crate::domain::export::{ExportFormat, GenerationOptions, RenderedContent};

pub use markdown::MarkdownRenderer;
pub use notion::{BlockCache, NotionBlockRenderer, MAX_RICH_TEXT_CHARS};
pub use pdf::PdfRenderer;

/// Failure inside a renderer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The output stream failed before signalling completion.
    #[error("output stream failed: {0}")]
    Stream(String),

    #[error("rendering timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// One initialized renderer.
///
/// Settings such as graph inclusion or compression are read from the
/// options passed to [`Renderer::render`]; the instance itself only holds
/// long-lived resources like the block cache.
#[derive(Debug, Clone)]
pub enum Renderer {
    Markdown(MarkdownRenderer),
    Notion(NotionBlockRenderer),
    Pdf(PdfRenderer),
}

impl Renderer {
    /// Builds the renderer for `format`, sharing `blocks` with the Notion renderer.
    pub fn for_format(format: ExportFormat, blocks: &BlockCache) -> Self {
        match format {
            ExportFormat::Markdown => Renderer::Markdown(MarkdownRenderer),
            ExportFormat::Notion => Renderer::Notion(NotionBlockRenderer::new(blocks.clone())),
            ExportFormat::Pdf => Renderer::Pdf(PdfRenderer),
        }
    }

    pub fn format(&self) -> ExportFormat {
        match self {
            Renderer::Markdown(_) => ExportFormat::Markdown,
            Renderer::Notion(_) => ExportFormat::Notion,
            Renderer::Pdf(_) => ExportFormat::Pdf,
        }
    }

    /// Renders synchronously on the calling thread.
    pub fn render(&self, document: &Document, options: &GenerationOptions) -> Result<RenderedContent, RenderError> {
        match self {
            Renderer::Markdown(r) => r.render(document, options).map(RenderedContent::Text),
            Renderer::Notion(r) => r.render(document, options).map(RenderedContent::Text),
            Renderer::Pdf(r) => r.render(document, options).map(RenderedContent::Binary),
        }
    }
}
