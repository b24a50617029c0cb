//! Domain layer - Core business logic and types.
//!
//! - `foundation` - identifiers, timestamps, errors, state machine trait
//! - `document` - the content being exported
//! - `export` - export lifecycle, options and results

pub mod document;
pub mod export;
pub mod foundation;
