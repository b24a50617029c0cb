//! Status Listener Port - callbacks for status record changes.

use crate::domain::export::ExportStatusChanged;

/// Receives every status transition made by the Export Manager.
///
/// Called synchronously on the writer's path; implementations should hand
/// work off rather than block.
pub trait ExportStatusListener: Send + Sync {
    fn on_status_changed(&self, event: &ExportStatusChanged);
}

/// Listener that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpStatusListener;

impl ExportStatusListener for NoOpStatusListener {
    fn on_status_changed(&self, _event: &ExportStatusChanged) {}
}
