//! Notion block renderer.
//!
//! Produces the JSON block objects accepted by the Notion "append block
//! children" API. One heading per section, body text tokenized line by line,
//! graphs as `mermaid` code blocks and references as numbered items. Blocks
//! are grouped into batches no larger than the per-parent child limit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::domain::document::{Document, GraphData, Reference, Section};
use crate::domain::export::GenerationOptions;

use super::markdown::{effective_level, mermaid_id, mermaid_label};
use super::RenderError;

/// Notion rejects rich-text content longer than this.
pub const MAX_RICH_TEXT_CHARS: usize = 2000;

/// Deepest heading block type Notion offers.
const MAX_NOTION_HEADING: u8 = 3;

/// Block types this renderer emits.
const BLOCK_TYPES: [&str; 8] = [
    "heading_1",
    "heading_2",
    "heading_3",
    "paragraph",
    "bulleted_list_item",
    "numbered_list_item",
    "quote",
    "code",
];

// ════════════════════════════════════════════════════════════════════════════
// Block cache
// ════════════════════════════════════════════════════════════════════════════

type CacheKey = [u8; 32];

/// Rendered blocks keyed by SHA-256 of document id and version.
///
/// Clones share storage. Entries are evicted by [`BlockCache::sweep`], never
/// on access.
#[derive(Debug, Clone, Default)]
pub struct BlockCache {
    entries: Arc<Mutex<HashMap<CacheKey, CachedBlocks>>>,
}

#[derive(Debug)]
struct CachedBlocks {
    blocks: Arc<Vec<Value>>,
    inserted_at: Instant,
}

impl BlockCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops entries older than `max_age`. Returns how many were removed.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, cached| cached.inserted_at.elapsed() < max_age);
        before - entries.len()
    }

    fn get(&self, key: &CacheKey) -> Option<Arc<Vec<Value>>> {
        self.lock().get(key).map(|cached| Arc::clone(&cached.blocks))
    }

    fn insert(&self, key: CacheKey, blocks: Arc<Vec<Value>>) {
        self.lock().insert(
            key,
            CachedBlocks {
                blocks,
                inserted_at: Instant::now(),
            },
        );
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CachedBlocks>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Renderer
// ════════════════════════════════════════════════════════════════════════════

/// Renders a document into Notion blocks.
#[derive(Debug, Clone, Default)]
pub struct NotionBlockRenderer {
    cache: BlockCache,
}

impl NotionBlockRenderer {
    pub fn new(cache: BlockCache) -> Self {
        Self { cache }
    }

    /// Renders the document to the JSON payload.
    pub fn render(&self, document: &Document, options: &GenerationOptions) -> Result<String, RenderError> {
        let blocks = self.blocks(document, options.include_graphs);
        let batches: Vec<Value> = blocks
            .chunks(options.limits.notion_max_children.max(1))
            .map(|chunk| json!({ "children": chunk }))
            .collect();

        let metadata = document.metadata();
        let payload = json!({
            "documentId": metadata.id,
            "title": metadata.title,
            "version": metadata.version,
            "blockCount": blocks.len(),
            "batches": batches,
        });
        serde_json::to_string_pretty(&payload).map_err(|e| RenderError::Serialization(e.to_string()))
    }

    /// Returns the validated block list, from cache when possible.
    pub fn blocks(&self, document: &Document, include_graphs: bool) -> Arc<Vec<Value>> {
        let key = cache_key(document, include_graphs);
        if let Some(blocks) = self.cache.get(&key) {
            tracing::debug!(document_id = %document.metadata().id, "Block cache hit");
            return blocks;
        }

        let blocks = Arc::new(build(document, include_graphs));
        self.cache.insert(key, Arc::clone(&blocks));
        blocks
    }
}

fn cache_key(document: &Document, include_graphs: bool) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(document.cache_key().as_bytes());
    hasher.update([u8::from(include_graphs)]);
    hasher.finalize().into()
}

fn build(document: &Document, include_graphs: bool) -> Vec<Value> {
    let mut raw = Vec::new();
    for section in document.sections() {
        section_blocks(&mut raw, section, 0);
    }
    if include_graphs {
        for graph in document.graphs() {
            graph_blocks(&mut raw, graph);
        }
    }
    if !document.references().is_empty() {
        raw.push(heading_block(1, "References"));
        for reference in document.references() {
            raw.push(reference_block(reference));
        }
    }

    let mut blocks = Vec::with_capacity(raw.len());
    for block in raw {
        match validate_block(&block) {
            Ok(()) => blocks.push(block),
            Err(reason) => {
                tracing::warn!(
                    document_id = %document.metadata().id,
                    reason = %reason,
                    "Dropping invalid block"
                );
            }
        }
    }
    blocks
}

fn section_blocks(out: &mut Vec<Value>, section: &Section, parent_level: u8) {
    let level = effective_level(section, parent_level);
    out.push(heading_block(level, &section.title));
    tokenize_body(out, &section.content);
    for child in &section.subsections {
        section_blocks(out, child, level);
    }
}

fn graph_blocks(out: &mut Vec<Value>, graph: &GraphData) {
    let mut source = String::from("graph TD\n");
    for node in &graph.nodes {
        source.push_str(&format!("    {}[\"{}\"]\n", mermaid_id(&node.id), mermaid_label(&node.label)));
    }
    for edge in &graph.edges {
        let arrow = if edge.edge_type.is_empty() {
            "-->".to_string()
        } else {
            format!("-->|{}|", mermaid_label(&edge.edge_type))
        };
        source.push_str(&format!(
            "    {} {} {}\n",
            mermaid_id(&edge.source),
            arrow,
            mermaid_id(&edge.target)
        ));
    }
    out.push(heading_block(3, &graph.id));
    out.push(code_block(source.trim_end(), "mermaid"));
}

fn reference_block(reference: &Reference) -> Value {
    let mut rich = Vec::new();
    if !reference.authors.is_empty() {
        rich.extend(rich_text(&format!("{}. ", reference.authors.join(", "))));
    }
    match reference.url.as_deref().filter(|u| !u.is_empty()) {
        Some(url) => rich.push(json!({
            "type": "text",
            "text": { "content": reference.title, "link": { "url": url } },
        })),
        None => rich.extend(rich_text(&reference.title)),
    }
    rich.extend(rich_text(&format!(" ({})", reference.reference_type.label())));
    json!({
        "object": "block",
        "type": "numbered_list_item",
        "numbered_list_item": { "rich_text": rich },
    })
}

/// Splits body text into blocks by line prefix.
///
/// | Prefix | Block |
/// |--------|-------|
/// | `- ` or `* ` | bulleted_list_item |
/// | `1. ` (any digits) | numbered_list_item |
/// | `> ` | quote |
/// | ```` ``` ```` fence | code (until the closing fence) |
/// | other non-blank | paragraph |
pub(crate) fn tokenize_body(out: &mut Vec<Value>, body: &str) {
    let mut lines = body.lines();
    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(language) = trimmed.strip_prefix("```") {
            let mut code = Vec::new();
            for inner in lines.by_ref() {
                if inner.trim_start().starts_with("```") {
                    break;
                }
                code.push(inner);
            }
            let language = match language.trim() {
                "" => "plain text",
                lang => lang,
            };
            out.push(code_block(&code.join("\n"), language));
        } else if let Some(item) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
            out.push(text_block("bulleted_list_item", item));
        } else if let Some(item) = numbered_item(trimmed) {
            out.push(text_block("numbered_list_item", item));
        } else if let Some(quote) = trimmed.strip_prefix("> ").or_else(|| trimmed.strip_prefix('>')) {
            out.push(text_block("quote", quote.trim_start()));
        } else {
            out.push(text_block("paragraph", trimmed));
        }
    }
}

fn numbered_item(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    line[digits..].strip_prefix(". ")
}

fn heading_block(level: u8, text: &str) -> Value {
    let kind = format!("heading_{}", level.clamp(1, MAX_NOTION_HEADING));
    text_block(&kind, text)
}

fn text_block(kind: &str, text: &str) -> Value {
    let mut block = json!({ "object": "block", "type": kind });
    block[kind] = json!({ "rich_text": rich_text(text) });
    block
}

fn code_block(source: &str, language: &str) -> Value {
    json!({
        "object": "block",
        "type": "code",
        "code": { "rich_text": rich_text(source), "language": language },
    })
}

/// Rich-text segments, each at most [`MAX_RICH_TEXT_CHARS`] characters.
pub(crate) fn rich_text(text: &str) -> Vec<Value> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(MAX_RICH_TEXT_CHARS)
        .map(|chunk| {
            let content: String = chunk.iter().collect();
            json!({ "type": "text", "text": { "content": content } })
        })
        .collect()
}

/// A block is valid when its `type` is known and the payload under that key
/// carries non-empty rich text (plus a language for code).
pub(crate) fn validate_block(block: &Value) -> Result<(), String> {
    let kind = block
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| "block has no type".to_string())?;
    if !BLOCK_TYPES.contains(&kind) {
        return Err(format!("unknown block type '{}'", kind));
    }

    let payload = block
        .get(kind)
        .and_then(Value::as_object)
        .ok_or_else(|| format!("{} block has no payload", kind))?;
    let rich = payload
        .get("rich_text")
        .and_then(Value::as_array)
        .ok_or_else(|| format!("{} block has no rich_text", kind))?;
    if rich.is_empty() {
        return Err(format!("{} block has empty rich_text", kind));
    }
    if kind == "code" && payload.get("language").and_then(Value::as_str).is_none() {
        return Err("code block has no language".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::{DocumentContent, DocumentMetadata, GraphEdge, GraphNode};
    use crate::domain::foundation::Timestamp;

    fn document(sections: Vec<Section>) -> Document {
        Document::new(&DocumentContent {
            metadata: DocumentMetadata {
                id: "doc-1".into(),
                title: "Field Notes".into(),
                author: "Ada".into(),
                version: "2.0.0".into(),
                tags: vec![],
                created_at: Timestamp::now(),
                updated_at: Timestamp::now(),
            },
            sections,
            graphs: vec![GraphData {
                id: "g1".into(),
                nodes: vec![GraphNode::new("a", "Alpha"), GraphNode::new("b", "Beta")],
                edges: vec![GraphEdge::new("a", "b", "cites")],
                layout: Default::default(),
            }],
            references: vec![],
        })
        .unwrap()
    }

    fn renderer() -> NotionBlockRenderer {
        NotionBlockRenderer::new(BlockCache::new())
    }

    fn types(blocks: &[Value]) -> Vec<&str> {
        blocks.iter().map(|b| b["type"].as_str().unwrap()).collect()
    }

    // ───────────────────────────────────────────────────────────────
    // Tokenizer
    // ───────────────────────────────────────────────────────────────

    #[test]
    fn tokenizes_line_prefixes() {
        let mut out = Vec::new();
        tokenize_body(
            &mut out,
            "Plain line\n- bullet\n* star\n12. numbered\n> quoted\n```rust\nfn main() {}\n```\n",
        );
        assert_eq!(
            types(&out),
            vec![
                "paragraph",
                "bulleted_list_item",
                "bulleted_list_item",
                "numbered_list_item",
                "quote",
                "code"
            ]
        );
        assert_eq!(out[5]["code"]["language"], "rust");
        assert_eq!(out[5]["code"]["rich_text"][0]["text"]["content"], "fn main() {}");
    }

    #[test]
    fn blank_lines_produce_no_blocks() {
        let mut out = Vec::new();
        tokenize_body(&mut out, "\n\n   \n");
        assert!(out.is_empty());
    }

    #[test]
    fn long_text_is_chunked() {
        let text = "x".repeat(MAX_RICH_TEXT_CHARS * 2 + 5);
        let chunks = rich_text(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2]["text"]["content"].as_str().unwrap().len(), 5);
    }

    // ───────────────────────────────────────────────────────────────
    // Validation
    // ───────────────────────────────────────────────────────────────

    #[test]
    fn validation_requires_matching_payload() {
        assert!(validate_block(&json!({ "type": "paragraph" })).is_err());
        assert!(validate_block(&json!({ "type": "paragraph", "quote": {} })).is_err());
        assert!(validate_block(&json!({ "type": "mystery", "mystery": {} })).is_err());
        assert!(validate_block(&text_block("paragraph", "ok")).is_ok());
    }

    #[test]
    fn empty_list_item_is_dropped() {
        let doc = document(vec![Section::new("s1", "Intro", "- \n- kept")]);
        let blocks = renderer().blocks(&doc, true);
        let bullets = blocks.iter().filter(|b| b["type"] == "bulleted_list_item").count();
        assert_eq!(bullets, 1);
    }

    // ───────────────────────────────────────────────────────────────
    // Document rendering
    // ───────────────────────────────────────────────────────────────

    #[test]
    fn headings_clamp_to_level_three() {
        let section = Section::new("s1", "Deep", "").with_level(6);
        let blocks = renderer().blocks(&document(vec![section]), true);
        assert_eq!(blocks[0]["type"], "heading_3");
    }

    #[test]
    fn graph_becomes_mermaid_code_block() {
        let blocks = renderer().blocks(&document(vec![]), true);
        let code = blocks.iter().find(|b| b["type"] == "code").unwrap();
        assert_eq!(code["code"]["language"], "mermaid");
        let source = code["code"]["rich_text"][0]["text"]["content"].as_str().unwrap();
        assert!(source.contains("a -->|cites| b"));
    }

    #[test]
    fn batches_respect_child_limit() {
        let body = (0..7).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
        let doc = document(vec![Section::new("s1", "Intro", body)]);
        let mut options = GenerationOptions::for_format(crate::domain::export::ExportFormat::Notion);
        options.include_graphs = false;
        options.limits.notion_max_children = 3;
        let payload: Value = serde_json::from_str(&renderer().render(&doc, &options).unwrap()).unwrap();

        assert_eq!(payload["blockCount"], 8);
        let batches = payload["batches"].as_array().unwrap();
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| b["children"].as_array().unwrap().len() <= 3));
    }

    #[test]
    fn repeated_render_uses_cache() {
        let cache = BlockCache::new();
        let renderer = NotionBlockRenderer::new(cache.clone());
        let doc = document(vec![Section::new("s1", "Intro", "Hello world")]);

        let first = renderer.blocks(&doc, true);
        let second = renderer.blocks(&doc, true);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let options = GenerationOptions::default();
        assert_eq!(
            renderer.render(&doc, &options).unwrap(),
            renderer.render(&doc, &options).unwrap()
        );
    }

    #[test]
    fn sweep_evicts_old_entries() {
        let cache = BlockCache::new();
        let renderer = NotionBlockRenderer::new(cache.clone());
        renderer.blocks(&document(vec![]), true);

        assert_eq!(cache.sweep(Duration::from_secs(60)), 0);
        assert_eq!(cache.sweep(Duration::ZERO), 1);
        assert!(cache.is_empty());
    }
}
