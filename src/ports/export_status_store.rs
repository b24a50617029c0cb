//! Export Status Store Port - keyed storage for status records.
//!
//! The Export Manager is the single writer; everything else reads copies.

use crate::domain::export::{ExportError, ExportStatus};
use crate::domain::foundation::{CorrelationId, Timestamp, ValidationError};

/// Mutation applied to a stored record under the store's lock.
pub type StatusMutation<'a> = &'a mut dyn FnMut(&mut ExportStatus) -> Result<(), ValidationError>;

/// Port for storing export status records.
pub trait ExportStatusStore: Send + Sync {
    /// Stores a new record.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::AlreadyExists` if the correlation id is taken.
    fn insert(&self, status: ExportStatus) -> Result<(), ExportError>;

    /// Returns a copy of the record.
    fn get(&self, id: &CorrelationId) -> Option<ExportStatus>;

    /// Applies `mutation` atomically and returns a copy of the updated record.
    ///
    /// A failing mutation leaves the stored record unchanged.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::NotFound` for unknown ids and
    /// `ExportError::Validation` when the mutation rejects the change.
    fn update(&self, id: &CorrelationId, mutation: StatusMutation<'_>) -> Result<ExportStatus, ExportError>;

    /// Removes terminal records that ended before `cutoff`. Returns how many.
    fn evict_terminal_before(&self, cutoff: Timestamp) -> usize;

    /// Number of stored records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_status_store_is_object_safe() {
        fn check<T: ExportStatusStore + ?Sized>() {}
        check::<dyn ExportStatusStore>();
    }
}
