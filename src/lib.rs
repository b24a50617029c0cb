//! Knowledge Export - Document export pipeline
//!
//! Turns structured knowledge documents (section trees, graphs and
//! references) into Markdown, Notion block JSON or tagged PDF, with
//! validation, retries, a circuit breaker and queryable status records.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
