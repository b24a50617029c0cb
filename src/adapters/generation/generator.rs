//! Document Generator - one document through validate → template → convert.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::UnboundedSender;

use crate::adapters::memory::{MemoryLevel, MemoryTracker};
use crate::adapters::render::BlockCache;
use crate::domain::document::Document;
use crate::domain::export::{
    ExportError, ExportFormat, GenerationEvent, GenerationMetrics, GenerationOptions,
    GenerationOptionsPatch, GenerationResult, GenerationStage, ResultMetadata,
};
use crate::domain::foundation::{Percentage, Timestamp};
use crate::ports::CancellationToken;

use super::format_converter::FormatConverter;
use super::template_engine::TemplateEngine;

/// Owns one document and drives it through the generation stages.
#[derive(Debug)]
pub struct DocumentGenerator {
    document: Arc<Document>,
    engine: TemplateEngine,
    converter: Arc<FormatConverter>,
}

impl DocumentGenerator {
    pub fn new(
        document: Arc<Document>,
        options: GenerationOptions,
        blocks: BlockCache,
        converter: Arc<FormatConverter>,
    ) -> Self {
        Self {
            document,
            engine: TemplateEngine::new(options, blocks),
            converter,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn options(&self) -> &GenerationOptions {
        self.engine.options()
    }

    /// Merges new options; a format change invalidates the cached renderer.
    pub fn update_options(&mut self, patch: GenerationOptionsPatch) -> bool {
        self.engine.update_options(patch)
    }

    /// Runs the full sequence.
    ///
    /// Events go to `events` when given. The cancellation token is checked
    /// before each stage.
    pub async fn generate(
        &mut self,
        cancellation: &CancellationToken,
        events: Option<&UnboundedSender<GenerationEvent>>,
    ) -> Result<GenerationResult, ExportError> {
        let result = self.run(cancellation, events).await;
        if let Err(e) = &result {
            emit(events, GenerationEvent::Error { message: e.to_string() });
        }
        result
    }

    async fn run(
        &mut self,
        cancellation: &CancellationToken,
        events: Option<&UnboundedSender<GenerationEvent>>,
    ) -> Result<GenerationResult, ExportError> {
        let started = Instant::now();
        let mut progress = ProgressReporter::new(self.options().progress_granularity, events);

        cancellation.check()?;
        let stage = Instant::now();
        if let Err(e) = self.document.ensure_fresh() {
            emit(events, GenerationEvent::ValidationFailed { errors: vec![e.to_string()] });
            return Err(e.into());
        }
        let validation_ms = elapsed_ms(stage);
        progress.report(Percentage::new(10), GenerationStage::Validated);

        cancellation.check()?;
        let stage = Instant::now();
        let renderer = self.engine.generate_output(&self.document)?;
        let template_ms = elapsed_ms(stage);
        progress.report(Percentage::new(50), GenerationStage::TemplateRendered);

        cancellation.check()?;
        let options = self.engine.options().clone();
        let mut memory = MemoryTracker::new(options.memory);
        let stage = Instant::now();
        let converted = self
            .converter
            .convert(Arc::clone(&self.document), &renderer, &options)
            .await;
        let conversion_ms = elapsed_ms(stage);
        if let Some((bytes, level)) = memory.sample() {
            emit(
                events,
                GenerationEvent::MemoryWarning {
                    bytes,
                    critical: level == MemoryLevel::Critical,
                },
            );
        }
        let memory = memory.finish();
        let content = converted?;
        cancellation.check()?;
        progress.report(Percentage::HUNDRED, GenerationStage::Converted);

        let metadata = self.metadata(options.format, content.len());
        emit(events, GenerationEvent::Completed { metadata: metadata.clone() });

        Ok(GenerationResult {
            content,
            metadata,
            metrics: GenerationMetrics {
                validation_ms,
                template_ms,
                conversion_ms,
                total_ms: elapsed_ms(started),
                memory,
            },
        })
    }

    fn metadata(&self, format: ExportFormat, content_size: usize) -> ResultMetadata {
        let metadata = self.document.metadata();
        ResultMetadata {
            generated_at: Timestamp::now(),
            format,
            content_type: format.content_type().to_string(),
            filename: format!("{}.{}", slugify(&metadata.title, &metadata.id), format.extension()),
            content_size,
            page_count: estimate_pages(self.document.serialized_size(), format),
            graph_count: self.document.graphs().len(),
        }
    }
}

/// Pages implied by the serialized character count. Never less than one.
pub fn estimate_pages(chars: usize, format: ExportFormat) -> usize {
    let per_page = format.chars_per_page();
    ((chars + per_page - 1) / per_page).max(1)
}

/// Lowercase ASCII file stem; falls back to `fallback` when nothing survives.
fn slugify(title: &str, fallback: &str) -> String {
    let mut slug = String::new();
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug.to_string()
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

fn emit(events: Option<&UnboundedSender<GenerationEvent>>, event: GenerationEvent) {
    if let Some(events) = events {
        let _ = events.send(event);
    }
}

/// Emits progress only when the quantized value moves forward.
struct ProgressReporter<'a> {
    granularity: u8,
    last: Option<Percentage>,
    events: Option<&'a UnboundedSender<GenerationEvent>>,
}

impl<'a> ProgressReporter<'a> {
    fn new(granularity: u8, events: Option<&'a UnboundedSender<GenerationEvent>>) -> Self {
        Self {
            granularity,
            last: None,
            events,
        }
    }

    fn report(&mut self, raw: Percentage, stage: GenerationStage) {
        let percent = raw.quantize(self.granularity);
        if self.last.map_or(false, |last| percent <= last) {
            return;
        }
        self.last = Some(percent);
        emit(self.events, GenerationEvent::Progress { percent, stage });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::{DocumentContent, DocumentMetadata, GraphData, GraphNode, Section};
    use tokio::sync::mpsc;

    fn document() -> Arc<Document> {
        Arc::new(
            Document::new(&DocumentContent {
                metadata: DocumentMetadata {
                    id: "doc-1".into(),
                    title: "Field Notes: Vol 1".into(),
                    author: "Ada".into(),
                    version: "1.0.0".into(),
                    tags: vec![],
                    created_at: Timestamp::now(),
                    updated_at: Timestamp::now(),
                },
                sections: vec![Section::new("s1", "Intro", "Hello world")],
                graphs: vec![GraphData {
                    id: "g1".into(),
                    nodes: vec![GraphNode::new("a", "Alpha")],
                    edges: vec![],
                    layout: Default::default(),
                }],
                references: vec![],
            })
            .unwrap(),
        )
    }

    fn generator(format: ExportFormat) -> DocumentGenerator {
        DocumentGenerator::new(
            document(),
            GenerationOptions::for_format(format),
            BlockCache::new(),
            Arc::new(FormatConverter::new()),
        )
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<GenerationEvent>) -> Vec<GenerationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    // ───────────────────────────────────────────────────────────────
    // Generation
    // ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn generates_markdown_with_metadata() {
        let result = generator(ExportFormat::Markdown)
            .generate(&CancellationToken::new(), None)
            .await
            .unwrap();

        assert!(result.content.as_text().unwrap().contains("# Intro"));
        assert_eq!(result.metadata.format, ExportFormat::Markdown);
        assert_eq!(result.metadata.filename, "field-notes-vol-1.md");
        assert_eq!(result.metadata.graph_count, 1);
        assert_eq!(result.metadata.page_count, 1);
        assert_eq!(result.metadata.content_size, result.content.len());
    }

    #[tokio::test]
    async fn emits_progress_then_completion() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        generator(ExportFormat::Notion)
            .generate(&CancellationToken::new(), Some(&tx))
            .await
            .unwrap();

        let events = drain(&mut rx);
        let progress: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                GenerationEvent::Progress { percent, .. } => Some(percent.value()),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![10, 50, 100]);
        assert!(matches!(events.last(), Some(GenerationEvent::Completed { .. })));
    }

    #[tokio::test]
    async fn coarse_granularity_suppresses_checkpoints() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut generator = generator(ExportFormat::Markdown);
        generator.update_options(GenerationOptionsPatch {
            progress_granularity: Some(50),
            ..Default::default()
        });
        generator.generate(&CancellationToken::new(), Some(&tx)).await.unwrap();

        let progress: Vec<u8> = drain(&mut rx)
            .iter()
            .filter_map(|e| match e {
                GenerationEvent::Progress { percent, .. } => Some(percent.value()),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![0, 50, 100]);
    }

    #[tokio::test]
    async fn cancelled_before_start_renders_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let err = generator(ExportFormat::Markdown)
            .generate(&token, Some(&tx))
            .await
            .unwrap_err();

        assert_eq!(err, ExportError::Cancelled);
        let events = drain(&mut rx);
        assert!(matches!(events.as_slice(), [GenerationEvent::Error { .. }]));
    }

    #[tokio::test]
    async fn format_limit_is_reported_as_unsupported() {
        let mut options = GenerationOptions::for_format(ExportFormat::Notion);
        options.limits.notion_max_children = 0;
        let mut generator = DocumentGenerator::new(
            document(),
            options,
            BlockCache::new(),
            Arc::new(FormatConverter::new()),
        );
        let err = generator.generate(&CancellationToken::new(), None).await.unwrap_err();
        assert!(matches!(err, ExportError::FormatUnsupported(_)));
    }

    // ───────────────────────────────────────────────────────────────
    // Helpers
    // ───────────────────────────────────────────────────────────────

    #[test]
    fn page_estimate_rounds_up_per_format() {
        assert_eq!(estimate_pages(0, ExportFormat::Pdf), 1);
        assert_eq!(estimate_pages(2500, ExportFormat::Pdf), 1);
        assert_eq!(estimate_pages(2501, ExportFormat::Pdf), 2);
        assert_eq!(estimate_pages(9000, ExportFormat::Markdown), 3);
        assert_eq!(estimate_pages(9000, ExportFormat::Notion), 3);
    }

    #[test]
    fn slug_falls_back_to_id() {
        assert_eq!(slugify("Hello, World!", "x"), "hello-world");
        assert_eq!(slugify("漢字", "doc-1"), "doc-1");
    }
}
