//! Status adapters - storage for export status records.

mod in_memory_status_store;

pub use in_memory_status_store::InMemoryStatusStore;
