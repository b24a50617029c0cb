//! Document domain - the content being exported.
//!
//! - `content` - wire-level payload types
//! - `Document` - validated, sanitized, immutable form used by renderers
//! - `security` - structural and script-marker checks run before export

mod content;
mod document;
mod sanitizer;
pub mod security;

pub use content::{
    DocumentContent, DocumentMetadata, GraphData, GraphEdge, GraphNode, Reference,
    ReferenceType, Section, MAX_HEADING_LEVEL, MIN_HEADING_LEVEL,
};
pub use document::{clamp_heading_level, Document, DEFAULT_FRESHNESS_WINDOW};
pub use sanitizer::sanitize_text;
