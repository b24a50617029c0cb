//! Markdown renderer.
//!
//! Output layout:
//!
//! ```text
//! ---
//! <YAML front matter>
//! ---
//!
//! # <document title>
//!
//! <sections, headings scaled by depth>
//!
//! ## Knowledge Graphs        (one mermaid block per graph)
//!
//! ## References              (numbered citation list)
//! ```

use std::borrow::Cow;
use std::fmt::Write as _;

use serde::Serialize;

use crate::domain::document::{clamp_heading_level, Document, GraphData, Reference, Section};
use crate::domain::export::GenerationOptions;

use super::RenderError;

/// Renders a document to Markdown text.
///
/// Pure and deterministic: the same document always yields the same bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkdownRenderer;

#[derive(Serialize)]
struct FrontMatter<'a> {
    id: &'a str,
    title: &'a str,
    author: &'a str,
    version: &'a str,
    tags: &'a [String],
    created: String,
    updated: String,
}

impl MarkdownRenderer {
    pub fn render(&self, document: &Document, options: &GenerationOptions) -> Result<String, RenderError> {
        let metadata = document.metadata();
        let mut out = String::new();

        let front = FrontMatter {
            id: &metadata.id,
            title: &metadata.title,
            author: &metadata.author,
            version: &metadata.version,
            tags: &metadata.tags,
            created: metadata.created_at.to_string(),
            updated: metadata.updated_at.to_string(),
        };
        let yaml = serde_yaml::to_string(&front)
            .map_err(|e| RenderError::Serialization(format!("front matter: {}", e)))?;
        out.push_str("---\n");
        out.push_str(&yaml);
        out.push_str("---\n\n");

        let _ = writeln!(out, "# {}\n", escape_markup(&metadata.title));
        if !metadata.author.is_empty() {
            let _ = writeln!(out, "*{}*\n", escape_markup(&metadata.author));
        }

        for section in document.sections() {
            render_section(&mut out, section, 0);
        }

        if options.include_graphs && !document.graphs().is_empty() {
            out.push_str("## Knowledge Graphs\n\n");
            for graph in document.graphs() {
                render_graph(&mut out, graph);
            }
        }

        if !document.references().is_empty() {
            out.push_str("## References\n\n");
            for (i, reference) in document.references().iter().enumerate() {
                let _ = writeln!(out, "{}. {}", i + 1, format_reference(reference));
            }
            out.push('\n');
        }

        Ok(out)
    }
}

/// Heading level for a section nested under a heading of `parent_level`.
///
/// Children never render shallower than their parent plus one, and nothing
/// renders deeper than the deepest Markdown heading.
pub(crate) fn effective_level(section: &Section, parent_level: u8) -> u8 {
    clamp_heading_level(section.level.max(parent_level.saturating_add(1)))
}

fn render_section(out: &mut String, section: &Section, parent_level: u8) {
    let level = effective_level(section, parent_level);
    let _ = writeln!(out, "{} {}\n", "#".repeat(level as usize), escape_markup(&section.title));

    let body = section.content.trim_end();
    if !body.is_empty() {
        out.push_str(&escape_markup(body));
        out.push_str("\n\n");
    }

    for child in &section.subsections {
        render_section(out, child, level);
    }
}

fn render_graph(out: &mut String, graph: &GraphData) {
    let _ = writeln!(out, "### {}\n", escape_markup(&graph.id));
    out.push_str("```mermaid\ngraph TD\n");
    for node in &graph.nodes {
        let _ = writeln!(out, "    {}[\"{}\"]", mermaid_id(&node.id), mermaid_label(&node.label));
    }
    for edge in &graph.edges {
        let source = mermaid_id(&edge.source);
        let target = mermaid_id(&edge.target);
        if edge.edge_type.is_empty() {
            let _ = writeln!(out, "    {} --> {}", source, target);
        } else {
            let _ = writeln!(
                out,
                "    {} -->|{}| {}",
                source,
                mermaid_label(&edge.edge_type),
                target
            );
        }
    }
    out.push_str("```\n\n");
}

/// Stored text is plain; Markdown readers treat `<` as the start of HTML.
fn escape_markup(text: &str) -> Cow<'_, str> {
    if text.contains('<') {
        Cow::Owned(text.replace('<', "&lt;"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Node ids restricted to characters Mermaid accepts unquoted.
pub(crate) fn mermaid_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

pub(crate) fn mermaid_label(label: &str) -> String {
    label
        .replace('"', "#quot;")
        .replace('|', "#124;")
        .replace('<', "#lt;")
        .replace('\n', " ")
}

fn format_reference(reference: &Reference) -> String {
    let mut line = String::new();
    if !reference.authors.is_empty() {
        let _ = write!(line, "{}. ", escape_markup(&reference.authors.join(", ")));
    }
    let _ = write!(line, "*{}*", escape_markup(&reference.title));
    if let Some(url) = reference.url.as_deref().filter(|u| !u.is_empty()) {
        let _ = write!(line, ". [Link]({})", escape_markup(url));
    }
    let _ = write!(line, " ({})", reference.reference_type.label());
    line
}
