//! The validated, sanitized document handed to renderers.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::domain::foundation::ValidationError;

use super::content::{
    DocumentContent, DocumentMetadata, GraphData, Reference, Section, MAX_HEADING_LEVEL,
    MIN_HEADING_LEVEL,
};
use super::sanitizer::sanitize_text;

/// How long a validation result is trusted before it is re-checked on access.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(300);

/// Immutable export input.
///
/// Construction deep-copies the caller's content, normalizes it (heading
/// levels clamped to 1..=6, children sorted by `order`), strips markup from
/// every text field and validates the result. After that the content never
/// changes for the life of the export.
#[derive(Debug)]
pub struct Document {
    content: DocumentContent,
    validated_at: Mutex<Instant>,
    freshness_window: Duration,
}

impl Document {
    /// Builds a document from caller-supplied content.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` when a required id or title is missing,
    /// either in the input or after sanitization emptied it.
    pub fn new(content: &DocumentContent) -> Result<Self, ValidationError> {
        let mut owned = content.clone();
        validate(&owned)?;
        normalize(&mut owned);
        validate(&owned)?;

        Ok(Self {
            content: owned,
            validated_at: Mutex::new(Instant::now()),
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
        })
    }

    /// Overrides the freshness window.
    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    /// Re-validates the content if the last validation is older than the
    /// freshness window.
    pub fn ensure_fresh(&self) -> Result<(), ValidationError> {
        let mut validated_at = self
            .validated_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if validated_at.elapsed() >= self.freshness_window {
            validate(&self.content)?;
            *validated_at = Instant::now();
        }
        Ok(())
    }

    pub fn content(&self) -> &DocumentContent {
        &self.content
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.content.metadata
    }

    pub fn sections(&self) -> &[Section] {
        &self.content.sections
    }

    pub fn graphs(&self) -> &[GraphData] {
        &self.content.graphs
    }

    pub fn references(&self) -> &[Reference] {
        &self.content.references
    }

    /// Identity of this exact content: document id plus version.
    pub fn cache_key(&self) -> String {
        format!("{}@{}", self.content.metadata.id, self.content.metadata.version)
    }

    /// Size in bytes of the JSON serialization.
    pub fn serialized_size(&self) -> usize {
        self.content.serialized_size()
    }

    /// Total number of sections, including nested ones.
    pub fn section_count(&self) -> usize {
        self.content.section_count()
    }
}

/// Clamps a requested heading level into the supported range.
pub fn clamp_heading_level(level: u8) -> u8 {
    level.clamp(MIN_HEADING_LEVEL, MAX_HEADING_LEVEL)
}

fn validate(content: &DocumentContent) -> Result<(), ValidationError> {
    require("metadata.id", &content.metadata.id)?;
    require("metadata.title", &content.metadata.title)?;

    for (i, section) in content.sections.iter().enumerate() {
        validate_section(&format!("sections[{}]", i), section)?;
    }

    for (i, graph) in content.graphs.iter().enumerate() {
        require(&format!("graphs[{}].id", i), &graph.id)?;
        for (j, node) in graph.nodes.iter().enumerate() {
            require(&format!("graphs[{}].nodes[{}].id", i, j), &node.id)?;
            require(&format!("graphs[{}].nodes[{}].label", i, j), &node.label)?;
        }
        for (j, edge) in graph.edges.iter().enumerate() {
            require(&format!("graphs[{}].edges[{}].source", i, j), &edge.source)?;
            require(&format!("graphs[{}].edges[{}].target", i, j), &edge.target)?;
        }
    }

    for (i, reference) in content.references.iter().enumerate() {
        require(&format!("references[{}].id", i), &reference.id)?;
        require(&format!("references[{}].title", i), &reference.title)?;
    }

    Ok(())
}

fn validate_section(path: &str, section: &Section) -> Result<(), ValidationError> {
    require(&format!("{}.id", path), &section.id)?;
    require(&format!("{}.title", path), &section.title)?;
    for (i, child) in section.subsections.iter().enumerate() {
        validate_section(&format!("{}.subsections[{}]", path, i), child)?;
    }
    Ok(())
}

fn require(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::empty_field(field));
    }
    Ok(())
}

fn normalize(content: &mut DocumentContent) {
    let metadata = &mut content.metadata;
    metadata.id = sanitize_text(&metadata.id);
    metadata.version = sanitize_text(&metadata.version);
    metadata.title = sanitize_text(&metadata.title);
    metadata.author = sanitize_text(&metadata.author);
    for tag in metadata.tags.iter_mut() {
        *tag = sanitize_text(tag);
    }

    content.sections.sort_by_key(|s| s.order);
    for section in content.sections.iter_mut() {
        normalize_section(section);
    }

    for graph in content.graphs.iter_mut() {
        graph.id = sanitize_text(&graph.id);
        for node in graph.nodes.iter_mut() {
            node.id = sanitize_text(&node.id);
            node.label = sanitize_text(&node.label);
        }
        for edge in graph.edges.iter_mut() {
            edge.source = sanitize_text(&edge.source);
            edge.target = sanitize_text(&edge.target);
            edge.edge_type = sanitize_text(&edge.edge_type);
        }
    }

    for reference in content.references.iter_mut() {
        reference.title = sanitize_text(&reference.title);
        reference.url = reference.url.as_deref().map(sanitize_text);
        for author in reference.authors.iter_mut() {
            *author = sanitize_text(author);
        }
    }
}

fn normalize_section(section: &mut Section) {
    section.level = clamp_heading_level(section.level);
    section.title = sanitize_text(&section.title);
    section.content = sanitize_text(&section.content);
    section.subsections.sort_by_key(|s| s.order);
    for child in section.subsections.iter_mut() {
        normalize_section(child);
    }
}
