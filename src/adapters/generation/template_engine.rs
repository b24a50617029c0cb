//! Template Engine - renderer selection and format preconditions.

use std::collections::HashMap;

use crate::adapters::render::{BlockCache, Renderer};
use crate::domain::document::Document;
use crate::domain::export::{ExportError, ExportFormat, GenerationOptions, GenerationOptionsPatch};

/// Selects and caches one renderer per format.
///
/// Renderers are built on first use and reused until the requested format
/// changes. Preconditions run before every render.
#[derive(Debug)]
pub struct TemplateEngine {
    options: GenerationOptions,
    blocks: BlockCache,
    renderers: HashMap<ExportFormat, Renderer>,
}

impl TemplateEngine {
    pub fn new(options: GenerationOptions, blocks: BlockCache) -> Self {
        Self {
            options,
            blocks,
            renderers: HashMap::new(),
        }
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Number of renderers currently cached.
    pub fn cached_renderers(&self) -> usize {
        self.renderers.len()
    }

    /// Checks format limits and returns the renderer for the current format.
    ///
    /// # Errors
    ///
    /// - `FormatUnsupported` when the content is too large for PDF output
    /// - `FormatUnsupported` when there are more sections than Notion
    ///   accepts under one parent
    pub fn generate_output(&mut self, document: &Document) -> Result<Renderer, ExportError> {
        self.check_preconditions(document)?;

        let format = self.options.format;
        let blocks = &self.blocks;
        let renderer = self
            .renderers
            .entry(format)
            .or_insert_with(|| Renderer::for_format(format, blocks));
        Ok(renderer.clone())
    }

    /// Merges new options. Drops the cached renderer only when the format
    /// changed; returns whether it did.
    pub fn update_options(&mut self, patch: GenerationOptionsPatch) -> bool {
        let previous = self.options.format;
        let changed = self.options.apply(patch);
        if changed {
            self.renderers.remove(&previous);
            tracing::debug!(from = %previous, to = %self.options.format, "Renderer cache invalidated");
        }
        changed
    }

    fn check_preconditions(&self, document: &Document) -> Result<(), ExportError> {
        let limits = &self.options.limits;
        match self.options.format {
            ExportFormat::Pdf => {
                let size = document.serialized_size();
                if size > limits.pdf_max_content_bytes {
                    return Err(ExportError::format_unsupported(format!(
                        "content of {} bytes exceeds the {} byte PDF limit",
                        size, limits.pdf_max_content_bytes
                    )));
                }
            }
            ExportFormat::Notion => {
                let sections = document.section_count();
                if sections > limits.notion_max_children {
                    return Err(ExportError::format_unsupported(format!(
                        "{} sections exceed the Notion limit of {} children per parent",
                        sections, limits.notion_max_children
                    )));
                }
            }
            ExportFormat::Markdown => {
                if !self.options.include_graphs && !document.graphs().is_empty() {
                    tracing::warn!(
                        document_id = %document.metadata().id,
                        graphs = document.graphs().len(),
                        "Document has graphs but graph output is disabled"
                    );
                }
            }
        }
        Ok(())
    }
}
