//! Adapters - Implementations of port interfaces.
//!
//! - `render` - Markdown, Notion block and PDF renderers
//! - `generation` - Document generator, template engine, format converter
//! - `resilience` - in-memory circuit breaker
//! - `status` - in-memory status store
//! - `memory` - resident memory sampling
//! - `http` - REST endpoints

pub mod generation;
pub mod http;
pub mod memory;
pub mod render;
pub mod resilience;
pub mod status;

pub use generation::PipelineExportGenerator;
pub use resilience::InMemoryCircuitBreaker;
pub use status::InMemoryStatusStore;
