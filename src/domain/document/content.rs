//! Caller-supplied document content.
//!
//! These are plain data carriers as they arrive over the wire. They become a
//! usable [`Document`](super::Document) only after validation and sanitization.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::foundation::Timestamp;

/// Deepest heading level supported by the markup renderer.
pub const MAX_HEADING_LEVEL: u8 = 6;

/// Shallowest heading level.
pub const MIN_HEADING_LEVEL: u8 = 1;

/// Complete payload for one export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentContent {
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub graphs: Vec<GraphData>,
    #[serde(default)]
    pub references: Vec<Reference>,
}

impl DocumentContent {
    /// Size in bytes of the JSON serialization.
    ///
    /// This is the figure compared against the configured content ceilings.
    pub fn serialized_size(&self) -> usize {
        serde_json::to_vec(self).map(|bytes| bytes.len()).unwrap_or(usize::MAX)
    }

    /// Total number of sections, including nested subsections.
    pub fn section_count(&self) -> usize {
        self.sections.iter().map(Section::tree_size).sum()
    }

    /// Visits every free-text field with a dotted path naming it.
    pub fn for_each_text<F>(&self, mut visit: F)
    where
        F: FnMut(&str, &str),
    {
        visit("metadata.id", &self.metadata.id);
        visit("metadata.title", &self.metadata.title);
        visit("metadata.author", &self.metadata.author);
        visit("metadata.version", &self.metadata.version);
        for (i, tag) in self.metadata.tags.iter().enumerate() {
            visit(&format!("metadata.tags[{}]", i), tag);
        }
        for (i, section) in self.sections.iter().enumerate() {
            section.for_each_text(&format!("sections[{}]", i), &mut visit);
        }
        for (i, graph) in self.graphs.iter().enumerate() {
            visit(&format!("graphs[{}].id", i), &graph.id);
            for (j, node) in graph.nodes.iter().enumerate() {
                visit(&format!("graphs[{}].nodes[{}].id", i, j), &node.id);
                visit(&format!("graphs[{}].nodes[{}].label", i, j), &node.label);
            }
            for (j, edge) in graph.edges.iter().enumerate() {
                visit(&format!("graphs[{}].edges[{}].source", i, j), &edge.source);
                visit(&format!("graphs[{}].edges[{}].target", i, j), &edge.target);
                visit(&format!("graphs[{}].edges[{}].type", i, j), &edge.edge_type);
            }
        }
        for (i, reference) in self.references.iter().enumerate() {
            visit(&format!("references[{}].title", i), &reference.title);
            if let Some(url) = &reference.url {
                visit(&format!("references[{}].url", i), url);
            }
            for (j, author) in reference.authors.iter().enumerate() {
                visit(&format!("references[{}].authors[{}]", i, j), author);
            }
        }
    }
}

/// Descriptive metadata for the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Timestamp,
    #[serde(default)]
    pub updated_at: Timestamp,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// One node of the section tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Any integer is accepted on the wire and clamped into 1..=6.
    #[serde(default = "default_level", deserialize_with = "deserialize_level")]
    pub level: u8,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub subsections: Vec<Section>,
}

fn default_level() -> u8 {
    MIN_HEADING_LEVEL
}

fn deserialize_level<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    struct LevelVisitor;

    impl<'de> Visitor<'de> for LevelVisitor {
        type Value = u8;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an integer heading level")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u8, E> {
            Ok(v.clamp(u64::from(MIN_HEADING_LEVEL), u64::from(MAX_HEADING_LEVEL)) as u8)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u8, E> {
            Ok(v.clamp(i64::from(MIN_HEADING_LEVEL), i64::from(MAX_HEADING_LEVEL)) as u8)
        }
    }

    deserializer.deserialize_u64(LevelVisitor)
}

impl Section {
    /// Creates a leaf section at level 1.
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            level: MIN_HEADING_LEVEL,
            order: 0,
            subsections: Vec::new(),
        }
    }

    /// Sets the heading level.
    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    /// Sets the sort order among siblings.
    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    /// Appends a child section.
    pub fn with_subsection(mut self, child: Section) -> Self {
        self.subsections.push(child);
        self
    }

    /// Number of sections in this subtree, itself included.
    pub fn tree_size(&self) -> usize {
        1 + self.subsections.iter().map(Section::tree_size).sum::<usize>()
    }

    /// Depth of this subtree; a leaf has depth 1.
    pub fn tree_depth(&self) -> usize {
        1 + self.subsections.iter().map(Section::tree_depth).max().unwrap_or(0)
    }

    fn for_each_text<F>(&self, path: &str, visit: &mut F)
    where
        F: FnMut(&str, &str),
    {
        visit(&format!("{}.title", path), &self.title);
        visit(&format!("{}.content", path), &self.content);
        for (i, child) in self.subsections.iter().enumerate() {
            child.for_each_text(&format!("{}.subsections[{}]", path, i), visit);
        }
    }
}

/// Knowledge-graph data attached to the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphData {
    pub id: String,
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    #[serde(default)]
    pub layout: Map<String, Value>,
}

/// A single graph vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            properties: Map::new(),
        }
    }
}

/// A directed, typed relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type", default)]
    pub edge_type: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl GraphEdge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        edge_type: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            edge_type: edge_type.into(),
            properties: Map::new(),
        }
    }
}

/// A bibliographic reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub id: String,
    #[serde(rename = "type", default)]
    pub reference_type: ReferenceType,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
}

/// Kind of cited material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Article,
    Book,
    Video,
    Podcast,
    #[default]
    Web,
}

impl ReferenceType {
    /// Human-readable label used by renderers.
    pub fn label(&self) -> &'static str {
        match self {
            ReferenceType::Article => "Article",
            ReferenceType::Book => "Book",
            ReferenceType::Video => "Video",
            ReferenceType::Podcast => "Podcast",
            ReferenceType::Web => "Web",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content() -> DocumentContent {
        DocumentContent {
            metadata: DocumentMetadata {
                id: "doc-1".into(),
                title: "Title".into(),
                author: "Ada".into(),
                version: "1.0.0".into(),
                tags: vec!["graph".into()],
                created_at: Timestamp::now(),
                updated_at: Timestamp::now(),
            },
            sections: vec![Section::new("s1", "One", "body")
                .with_subsection(Section::new("s1a", "One A", "nested").with_level(2))],
            graphs: vec![],
            references: vec![],
        }
    }

    #[test]
    fn section_count_includes_nested() {
        assert_eq!(content().section_count(), 2);
    }

    #[test]
    fn tree_depth_counts_levels() {
        let c = content();
        assert_eq!(c.sections[0].tree_depth(), 2);
    }

    #[test]
    fn for_each_text_visits_nested_fields_with_paths() {
        let mut paths = Vec::new();
        content().for_each_text(|path, _| paths.push(path.to_string()));
        assert!(paths.contains(&"metadata.title".to_string()));
        assert!(paths.contains(&"sections[0].subsections[0].content".to_string()));
        assert!(paths.contains(&"metadata.id".to_string()));
        assert!(paths.contains(&"metadata.version".to_string()));
    }

    #[test]
    fn deserializes_wire_shape() {
        let json = serde_json::json!({
            "metadata": { "id": "d", "title": "T" },
            "sections": [{ "id": "s", "title": "Intro", "content": "Hello" }],
            "graphs": [{
                "id": "g",
                "nodes": [{ "id": "a", "label": "A" }],
                "edges": [{ "source": "a", "target": "a", "type": "self" }]
            }],
            "references": [{ "id": "r", "type": "book", "title": "B", "authors": ["X"] }]
        });
        let parsed: DocumentContent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.sections[0].level, 1);
        assert_eq!(parsed.graphs[0].edges[0].edge_type, "self");
        assert_eq!(parsed.references[0].reference_type, ReferenceType::Book);
        assert_eq!(parsed.metadata.version, "1.0.0");
    }

    #[test]
    fn out_of_range_levels_clamp_on_the_wire() {
        let section = |level: serde_json::Value| {
            serde_json::from_value::<Section>(serde_json::json!({
                "id": "s", "title": "T", "level": level
            }))
            .unwrap()
            .level
        };
        assert_eq!(section(serde_json::json!(300)), 6);
        assert_eq!(section(serde_json::json!(u64::MAX)), 6);
        assert_eq!(section(serde_json::json!(0)), 1);
        assert_eq!(section(serde_json::json!(-4)), 1);
        assert_eq!(section(serde_json::json!(3)), 3);
    }

    #[test]
    fn fractional_level_is_rejected() {
        let parsed = serde_json::from_value::<Section>(serde_json::json!({
            "id": "s", "title": "T", "level": 2.5
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn serialized_size_is_json_length() {
        let c = content();
        assert_eq!(c.serialized_size(), serde_json::to_vec(&c).unwrap().len());
    }
}
