//! In-flight download bookkeeping.

use std::sync::Arc;

use dashmap::DashMap;

/// Identifier assigned by the [`SystemDownloadManager`](super::SystemDownloadManager).
pub type DownloadId = u64;

/// Maps in-flight download ids to the names shown to the user.
///
/// Cloning shares the same map. Enqueue paths insert and completion
/// handling removes, possibly from different tasks, so the map is a
/// `DashMap`. Entries are never persisted.
#[derive(Debug, Clone, Default)]
pub struct ActiveDownloadRegistry {
    entries: Arc<DashMap<DownloadId, String>>,
}

impl ActiveDownloadRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `file_name` for `id`, replacing any previous name.
    pub fn insert(&self, id: DownloadId, file_name: impl Into<String>) {
        self.entries.insert(id, file_name.into());
    }

    /// Removes and returns the name recorded for `id`.
    pub fn remove(&self, id: DownloadId) -> Option<String> {
        self.entries.remove(&id).map(|(_, name)| name)
    }

    #[must_use]
    pub fn get(&self, id: DownloadId) -> Option<String> {
        self.entries.get(&id).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
