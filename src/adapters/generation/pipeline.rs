//! `ExportGenerator` adapter backed by the in-process rendering pipeline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::adapters::render::BlockCache;
use crate::domain::export::{ExportError, GenerationResult};
use crate::ports::{ExportGenerator, GenerationJob};

use super::format_converter::FormatConverter;
use super::generator::DocumentGenerator;

/// Builds a [`DocumentGenerator`] per job over shared caches and metrics.
#[derive(Debug, Clone, Default)]
pub struct PipelineExportGenerator {
    blocks: BlockCache,
    converter: Arc<FormatConverter>,
}

impl PipelineExportGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds how long a blocking PDF render may take.
    pub fn with_stream_timeout(timeout: Duration) -> Self {
        Self {
            blocks: BlockCache::new(),
            converter: Arc::new(FormatConverter::new().with_stream_timeout(timeout)),
        }
    }

    /// Block cache shared by every Notion render; swept by the status sweeper.
    pub fn block_cache(&self) -> &BlockCache {
        &self.blocks
    }

    pub fn converter(&self) -> &FormatConverter {
        &self.converter
    }
}

#[async_trait]
impl ExportGenerator for PipelineExportGenerator {
    async fn generate(&self, job: GenerationJob) -> Result<GenerationResult, ExportError> {
        let mut generator = DocumentGenerator::new(
            Arc::clone(&job.document),
            job.options.clone(),
            self.blocks.clone(),
            Arc::clone(&self.converter),
        );
        generator.generate(&job.cancellation, job.events.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::{Document, DocumentContent, DocumentMetadata, Section};
    use crate::domain::export::{ExportFormat, GenerationOptions};
    use crate::domain::foundation::{CorrelationId, Timestamp};

    fn job(format: ExportFormat) -> GenerationJob {
        let document = Document::new(&DocumentContent {
            metadata: DocumentMetadata {
                id: "doc-1".into(),
                title: "Title".into(),
                author: "Ada".into(),
                version: "1.0.0".into(),
                tags: vec![],
                created_at: Timestamp::now(),
                updated_at: Timestamp::now(),
            },
            sections: vec![Section::new("s1", "Intro", "Hello world")],
            graphs: vec![],
            references: vec![],
        })
        .unwrap();
        GenerationJob::new(
            CorrelationId::new(),
            Arc::new(document),
            GenerationOptions::for_format(format),
        )
    }

    #[tokio::test]
    async fn notion_jobs_share_the_block_cache() {
        let pipeline = PipelineExportGenerator::new();
        pipeline.generate(job(ExportFormat::Notion)).await.unwrap();
        pipeline.generate(job(ExportFormat::Notion)).await.unwrap();

        assert_eq!(pipeline.block_cache().len(), 1);
        assert_eq!(pipeline.converter().metrics().successes, 2);
    }

    #[tokio::test]
    async fn pdf_job_produces_binary() {
        let pipeline = PipelineExportGenerator::with_stream_timeout(Duration::from_secs(30));
        let result = pipeline.generate(job(ExportFormat::Pdf)).await.unwrap();
        assert!(result.content.as_bytes().starts_with(b"%PDF-"));
        assert_eq!(result.metadata.content_type, "application/pdf");
    }
}
