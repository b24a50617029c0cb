//! Integration tests for the export pipeline.
//!
//! These tests drive the public API end to end:
//! 1. ExportManager validates the request and creates a status record
//! 2. The circuit breaker and retry loop guard each generation attempt
//! 3. The real rendering pipeline produces Markdown, Notion blocks and PDF
//! 4. Status lookups reflect the terminal state of every request
//!
//! Uses in-memory stores and counting mock generators; no network or disk.

use async_trait::async_trait;
use proptest::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use knowledge_export::adapters::generation::PipelineExportGenerator;
use knowledge_export::adapters::render::{BlockCache, Renderer};
use knowledge_export::adapters::resilience::InMemoryCircuitBreaker;
use knowledge_export::adapters::status::InMemoryStatusStore;
use knowledge_export::application::ExportManager;
use knowledge_export::domain::document::{
    Document, DocumentContent, DocumentMetadata, GraphData, GraphEdge, GraphNode, Section,
};
use knowledge_export::domain::export::{
    ExportError, ExportFormat, ExportOptions, ExportState, GenerationOptions, GenerationResult,
    RetryPolicy,
};
use knowledge_export::domain::foundation::Timestamp;
use knowledge_export::ports::{
    CircuitBreakerConfig, CircuitState, ExportGenerator, GenerationJob,
};

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Wraps the real pipeline, failing the first `failures` calls.
struct CountingGenerator {
    inner: PipelineExportGenerator,
    calls: AtomicU32,
    failures: u32,
}

impl CountingGenerator {
    fn new(failures: u32) -> Self {
        Self {
            inner: PipelineExportGenerator::new(),
            calls: AtomicU32::new(0),
            failures,
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExportGenerator for CountingGenerator {
    async fn generate(&self, job: GenerationJob) -> Result<GenerationResult, ExportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(ExportError::conversion(job.options.format, "renderer unavailable"));
        }
        self.inner.generate(job).await
    }
}

fn manager(generator: Arc<dyn ExportGenerator>, breaker: CircuitBreakerConfig) -> ExportManager {
    ExportManager::new(
        generator,
        Arc::new(InMemoryStatusStore::new()),
        Arc::new(InMemoryCircuitBreaker::new("export", breaker)),
    )
}

fn metadata(title: &str) -> DocumentMetadata {
    DocumentMetadata {
        id: "doc-42".to_string(),
        title: title.to_string(),
        author: "Ada Lovelace".to_string(),
        version: "1.0.0".to_string(),
        tags: vec!["notes".to_string()],
        created_at: Timestamp::now(),
        updated_at: Timestamp::now(),
    }
}

fn intro_document() -> DocumentContent {
    DocumentContent {
        metadata: metadata("Field Notes"),
        sections: vec![Section::new("intro", "Intro", "Hello world")],
        graphs: vec![],
        references: vec![],
    }
}

fn graph_document() -> DocumentContent {
    DocumentContent {
        graphs: vec![GraphData {
            id: "concepts".to_string(),
            nodes: vec![GraphNode::new("a", "Alpha"), GraphNode::new("b", "Beta")],
            edges: vec![GraphEdge::new("a", "b", "depends_on")],
            layout: Default::default(),
        }],
        ..intro_document()
    }
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        backoff_factor: 2.0,
    }
}

fn render(content: &DocumentContent, format: ExportFormat) -> Vec<u8> {
    let document = Document::new(content).unwrap();
    let mut options = GenerationOptions::for_format(format);
    options.compression.enabled = false;
    Renderer::for_format(format, &BlockCache::new())
        .render(&document, &options)
        .unwrap()
        .into_bytes()
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn oversized_content_never_invokes_generator() {
    let generator = Arc::new(CountingGenerator::new(0));
    let manager = manager(generator.clone(), CircuitBreakerConfig::default());
    let mut options = ExportOptions::new(ExportFormat::Markdown);
    options.validation.max_content_size = 64;

    let err = manager
        .export_document(&intro_document(), options)
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::Validation(_)));
    assert_eq!(generator.calls(), 0);
}

// =============================================================================
// Retry and Circuit Breaker
// =============================================================================

#[tokio::test]
async fn retry_count_matches_failed_attempts() {
    for k in 0..3 {
        let generator = Arc::new(CountingGenerator::new(k));
        let manager = manager(generator.clone(), CircuitBreakerConfig::default());
        let options = ExportOptions::new(ExportFormat::Markdown).with_retry(fast_retry(3));

        let result = manager.export_document(&intro_document(), options).await.unwrap();
        let status = manager.get_export_status(&result.correlation_id).unwrap();

        assert_eq!(result.retry_count, k);
        assert_eq!(status.metrics.retry_count, k);
        assert_eq!(status.status, ExportState::Completed);
        assert_eq!(generator.calls(), k + 1);
    }
}

#[tokio::test]
async fn open_circuit_fails_fast_until_recovery() {
    let generator = Arc::new(CountingGenerator::new(3));
    let manager = manager(
        generator.clone(),
        CircuitBreakerConfig {
            failure_threshold: 3,
            recovery_timeout: Duration::from_millis(100),
            ..Default::default()
        },
    );
    let options = ExportOptions::new(ExportFormat::Notion).with_retry(RetryPolicy::no_retry());

    for _ in 0..3 {
        let err = manager
            .export_document(&intro_document(), options.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Conversion { .. }));
    }
    assert_eq!(manager.circuit_state(), CircuitState::Open);

    let err = manager
        .export_document(&intro_document(), options.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::CircuitOpen(_)));
    assert_eq!(generator.calls(), 3);

    tokio::time::sleep(Duration::from_millis(150)).await;

    let result = manager.export_document(&intro_document(), options).await;
    assert!(result.is_ok());
    assert_eq!(generator.calls(), 4);
    assert_eq!(manager.circuit_state(), CircuitState::Closed);
}

// =============================================================================
// Rendering Scenarios
// =============================================================================

#[tokio::test]
async fn intro_section_renders_heading_and_body() {
    let manager = manager(Arc::new(PipelineExportGenerator::new()), CircuitBreakerConfig::default());

    let result = manager
        .export_document(&intro_document(), ExportOptions::new(ExportFormat::Markdown))
        .await
        .unwrap();

    let text = result.content.as_text().unwrap();
    assert!(text.contains("# Intro"));
    assert!(text.contains("Hello world"));
    assert_eq!(result.metadata.filename, "field-notes.md");
    assert_eq!(result.metadata.page_count, 1);
}

#[test]
fn graph_renders_node_and_edge_declarations() {
    let out = String::from_utf8(render(&graph_document(), ExportFormat::Markdown)).unwrap();

    let node_lines = out.lines().filter(|l| l.contains("[\"")).count();
    let edge_lines: Vec<_> = out.lines().filter(|l| l.contains("-->")).collect();
    assert_eq!(node_lines, 2);
    assert_eq!(edge_lines, vec!["    a -->|depends_on| b"]);
}

#[test]
fn script_tags_never_reach_any_format() {
    let mut content = intro_document();
    content.metadata.title = "<script>alert(1)</script>Field Notes".to_string();
    content.sections[0].content = "Hello <script>steal()</script>world".to_string();

    for format in ExportFormat::ALL {
        let out = render(&content, format);
        assert!(!contains(&out, b"<script"), "{} output kept a script tag", format);
    }
}

#[test]
fn script_tags_in_identifiers_never_reach_any_format() {
    let mut content = graph_document();
    content.metadata.id = "doc-42<script>alert(1)</script>".to_string();
    content.metadata.version = "1.0.0<script>alert(2)</script>".to_string();
    content.graphs[0].id = "concepts<script>alert(3)</script>".to_string();

    for format in ExportFormat::ALL {
        let out = render(&content, format);
        assert!(!contains(&out, b"<script"), "{} output kept a script tag", format);
        assert!(!contains(&out, b"alert("), "{} output kept script content", format);
    }
}

#[tokio::test]
async fn script_marker_in_graph_id_is_rejected_before_generation() {
    let generator = Arc::new(CountingGenerator::new(0));
    let manager = manager(generator.clone(), CircuitBreakerConfig::default());
    let mut content = graph_document();
    content.graphs[0].id = "<script>alert(1)</script>".to_string();

    let err = manager
        .export_document(&content, ExportOptions::new(ExportFormat::Markdown))
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::Validation(_)));
    assert_eq!(generator.calls(), 0);
}

#[test]
fn markdown_and_blocks_are_deterministic() {
    let content = graph_document();
    for format in [ExportFormat::Markdown, ExportFormat::Notion] {
        assert_eq!(render(&content, format), render(&content, format));
    }
}

#[test]
fn pdf_has_tagged_structure() {
    let out = render(&intro_document(), ExportFormat::Pdf);
    assert!(out.starts_with(b"%PDF-"));
    assert!(contains(&out, b"/StructTreeRoot"));
    assert!(contains(&out, b"/MarkInfo"));
    assert!(contains(&out, b"/Lang"));
    assert!(String::from_utf8_lossy(&out).trim_end().ends_with("%%EOF"));
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn concurrent_exports_complete_independently() {
    let manager = Arc::new(manager(
        Arc::new(PipelineExportGenerator::new()),
        CircuitBreakerConfig::default(),
    ));

    let markdown = {
        let manager = Arc::clone(&manager);
        async move {
            manager
                .export_document(&intro_document(), ExportOptions::new(ExportFormat::Markdown))
                .await
        }
    };
    let pdf = {
        let manager = Arc::clone(&manager);
        async move {
            manager
                .export_document(&graph_document(), ExportOptions::new(ExportFormat::Pdf))
                .await
        }
    };

    let results = futures::future::join_all(vec![
        tokio::spawn(markdown),
        tokio::spawn(pdf),
    ])
    .await;

    let mut ids = Vec::new();
    for joined in results {
        let result = joined.unwrap().unwrap();
        let status = manager.get_export_status(&result.correlation_id).unwrap();
        assert_eq!(status.status, ExportState::Completed);
        assert_eq!(status.correlation_id, result.correlation_id);
        assert_eq!(status.format, result.metadata.format);
        ids.push(result.correlation_id);
    }
    assert_ne!(ids[0], ids[1]);
    assert_eq!(manager.tracked_exports(), 2);
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn backoff_delay_grows_geometrically(base in 1u64..2_000, factor in 1.0f64..3.0, attempt in 1u32..6) {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(base),
            backoff_factor: factor,
        };
        let expected = (base as f64 * factor.powi(attempt as i32 - 1)) as u64;
        let actual = policy.delay_for_attempt(attempt).as_millis() as u64;
        prop_assert!(actual.abs_diff(expected) <= 1);
        prop_assert!(policy.delay_for_attempt(attempt + 1) >= policy.delay_for_attempt(attempt));
    }

    #[test]
    fn deep_headings_clamp_to_six(level in 7u64..=1_000_000) {
        let mut wire = serde_json::to_value(intro_document()).unwrap();
        wire["sections"] = serde_json::json!([
            { "id": "deep", "title": "Deep", "content": "body", "level": level }
        ]);
        let content: DocumentContent = serde_json::from_value(wire).unwrap();
        let out = String::from_utf8(render(&content, ExportFormat::Markdown)).unwrap();
        prop_assert!(out.contains("\n###### Deep\n"));
        prop_assert!(!out.contains("####### Deep"));
    }
}
