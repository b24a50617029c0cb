//! In-memory export status store.
//!
//! Holds one record per correlation id. Readers get clones; the Export
//! Manager is the only caller of `update`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::export::{ExportError, ExportStatus};
use crate::domain::foundation::{CorrelationId, Timestamp};
use crate::ports::{ExportStatusStore, StatusMutation};

/// Status records kept in a `HashMap` behind an `RwLock`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStatusStore {
    records: Arc<RwLock<HashMap<CorrelationId, ExportStatus>>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all records (useful for tests)
    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<CorrelationId, ExportStatus>> {
        self.records.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CorrelationId, ExportStatus>> {
        self.records.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ExportStatusStore for InMemoryStatusStore {
    fn insert(&self, status: ExportStatus) -> Result<(), ExportError> {
        let mut records = self.write();
        if records.contains_key(&status.correlation_id) {
            return Err(ExportError::AlreadyExists(status.correlation_id));
        }
        records.insert(status.correlation_id, status);
        Ok(())
    }

    fn get(&self, id: &CorrelationId) -> Option<ExportStatus> {
        self.read().get(id).cloned()
    }

    fn update(&self, id: &CorrelationId, mutation: StatusMutation<'_>) -> Result<ExportStatus, ExportError> {
        let mut records = self.write();
        let record = records.get_mut(id).ok_or(ExportError::NotFound(*id))?;

        // Mutate a copy so a rejected transition leaves the record as it was.
        let mut draft = record.clone();
        mutation(&mut draft)?;
        *record = draft.clone();
        Ok(draft)
    }

    fn evict_terminal_before(&self, cutoff: Timestamp) -> usize {
        let mut records = self.write();
        let before = records.len();
        records.retain(|_, status| match (status.is_terminal(), status.ended_at) {
            (true, Some(ended)) => !ended.is_before(&cutoff),
            _ => true,
        });
        before - records.len()
    }

    fn len(&self) -> usize {
        self.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::export::{ExportFormat, ExportMetrics, ExportState};

    fn pending() -> ExportStatus {
        ExportStatus::pending(CorrelationId::new(), ExportFormat::Markdown)
    }

    #[test]
    fn insert_then_get_returns_copy() {
        let store = InMemoryStatusStore::new();
        let status = pending();
        let id = status.correlation_id;
        store.insert(status.clone()).unwrap();

        assert_eq!(store.get(&id), Some(status));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let store = InMemoryStatusStore::new();
        let status = pending();
        store.insert(status.clone()).unwrap();
        let id = status.correlation_id;
        assert_eq!(store.insert(status), Err(ExportError::AlreadyExists(id)));
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let store = InMemoryStatusStore::new();
        let id = CorrelationId::new();
        let result = store.update(&id, &mut |s| s.start_processing());
        assert_eq!(result, Err(ExportError::NotFound(id)));
    }

    #[test]
    fn update_applies_mutation() {
        let store = InMemoryStatusStore::new();
        let status = pending();
        let id = status.correlation_id;
        store.insert(status).unwrap();

        let updated = store.update(&id, &mut |s| s.start_processing()).unwrap();
        assert_eq!(updated.status, ExportState::Processing);
        assert_eq!(store.get(&id).unwrap().status, ExportState::Processing);
    }

    #[test]
    fn rejected_mutation_leaves_record_unchanged() {
        let store = InMemoryStatusStore::new();
        let status = pending();
        let id = status.correlation_id;
        store.insert(status.clone()).unwrap();

        let result = store.update(&id, &mut |s| s.complete(ExportMetrics::default()));
        assert!(matches!(result, Err(ExportError::Validation(_))));
        assert_eq!(store.get(&id), Some(status));
    }

    #[test]
    fn eviction_removes_only_old_terminal_records() {
        let store = InMemoryStatusStore::new();

        let running = pending();
        let running_id = running.correlation_id;
        store.insert(running).unwrap();

        let finished = pending();
        let finished_id = finished.correlation_id;
        store.insert(finished).unwrap();
        store
            .update(&finished_id, &mut |s| {
                s.start_processing()?;
                s.complete(ExportMetrics::default())
            })
            .unwrap();

        // Cutoff in the past keeps everything.
        assert_eq!(store.evict_terminal_before(Timestamp::now().minus_secs(60)), 0);

        let future = Timestamp::from_datetime(*Timestamp::now().as_datetime() + chrono::Duration::seconds(1));
        assert_eq!(store.evict_terminal_before(future), 1);
        assert!(store.get(&finished_id).is_none());
        assert!(store.get(&running_id).is_some());
    }
}
