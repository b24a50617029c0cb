//! Security checks run before a document is accepted for export.
//!
//! Two families of checks:
//! - structural well-formedness (unique section ids, bounded nesting,
//!   edges pointing at existing nodes)
//! - rejection of executable-script markers in any text field

use std::collections::HashSet;

use crate::domain::foundation::ValidationError;

use super::content::{DocumentContent, Section};

/// Deepest section nesting accepted from callers.
pub const MAX_SECTION_DEPTH: usize = 32;

/// Lower-cased substrings that mark executable content.
const SCRIPT_MARKERS: &[&str] = &[
    "<script",
    "</script",
    "javascript:",
    "vbscript:",
    "data:text/html",
    "onerror=",
    "onload=",
    "onclick=",
    "onmouseover=",
];

/// Runs every security check, returning the first violation found.
pub fn check_content(content: &DocumentContent) -> Result<(), ValidationError> {
    check_structure(content)?;
    check_script_markers(content)
}

/// Rejects malformed trees and dangling graph references.
pub fn check_structure(content: &DocumentContent) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for section in &content.sections {
        if section.tree_depth() > MAX_SECTION_DEPTH {
            return Err(ValidationError::out_of_range(
                "sections.depth",
                1,
                MAX_SECTION_DEPTH as i64,
                section.tree_depth() as i64,
            ));
        }
        collect_unique_ids(section, &mut seen)?;
    }

    for (i, graph) in content.graphs.iter().enumerate() {
        let node_ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        if node_ids.len() != graph.nodes.len() {
            return Err(ValidationError::invalid_format(
                format!("graphs[{}].nodes", i),
                "duplicate node id",
            ));
        }
        for (j, edge) in graph.edges.iter().enumerate() {
            if !node_ids.contains(edge.source.as_str()) || !node_ids.contains(edge.target.as_str()) {
                return Err(ValidationError::invalid_format(
                    format!("graphs[{}].edges[{}]", i, j),
                    format!("edge {} -> {} references an unknown node", edge.source, edge.target),
                ));
            }
        }
    }
    Ok(())
}

fn collect_unique_ids<'a>(
    section: &'a Section,
    seen: &mut HashSet<&'a str>,
) -> Result<(), ValidationError> {
    if !seen.insert(section.id.as_str()) {
        return Err(ValidationError::invalid_format(
            "sections.id",
            format!("duplicate section id '{}'", section.id),
        ));
    }
    for child in &section.subsections {
        collect_unique_ids(child, seen)?;
    }
    Ok(())
}

/// Rejects any text field carrying an executable-script marker.
pub fn check_script_markers(content: &DocumentContent) -> Result<(), ValidationError> {
    let mut violation = None;
    content.for_each_text(|path, text| {
        if violation.is_some() {
            return;
        }
        if let Some(marker) = find_script_marker(text) {
            violation = Some(ValidationError::invalid_format(
                path,
                format!("contains executable content marker '{}'", marker),
            ));
        }
    });
    match violation {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn find_script_marker(text: &str) -> Option<&'static str> {
    let lowered = text.to_ascii_lowercase();
    SCRIPT_MARKERS.iter().copied().find(|marker| lowered.contains(marker))
}
