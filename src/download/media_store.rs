//! Shared-storage collections with pending entries.
//!
//! A [`MediaStore`] hands out a pending entry, the caller writes the bytes,
//! and only [`MediaStore::publish`] makes the entry visible under its final
//! name. [`DirectoryMediaStore`] implements this on a plain directory tree:
//! pending entries are `.pending-<row>-<name>` files renamed on publish.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs::File;
use tracing::{debug, instrument, warn};

use super::error::MediaStoreError;
use super::filename::{resolve_unique_path, sanitize_filename};

const PENDING_PREFIX: &str = ".pending-";

/// Collection an entry is inserted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCollection {
    Downloads,
    Images,
}

impl MediaCollection {
    fn uri_segment(self) -> &'static str {
        match self {
            Self::Downloads => "downloads",
            Self::Images => "images",
        }
    }
}

/// Column values for a new entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEntry {
    pub display_name: String,
    pub mime_type: String,
    pub collection: MediaCollection,
    /// Directory relative to the store root, e.g. `Pictures/Browser`.
    pub relative_path: String,
}

/// An inserted but not yet visible entry.
#[derive(Debug)]
pub struct PendingMedia {
    /// `content://media/<collection>/<n>` identifier of the entry.
    pub content_uri: String,
    /// Where bytes are written while pending.
    pub pending_path: PathBuf,
    /// Where the entry appears once published.
    pub final_path: PathBuf,
}

impl PendingMedia {
    /// Opens the pending entry for writing.
    ///
    /// # Errors
    ///
    /// Returns `MediaStoreError::Io` if the pending file cannot be opened.
    pub async fn open_writer(&self) -> Result<File, MediaStoreError> {
        tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.pending_path)
            .await
            .map_err(|e| MediaStoreError::io(&self.pending_path, e))
    }
}

/// Scoped-storage backend.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Inserts a pending entry.
    async fn insert(&self, entry: &MediaEntry) -> Result<PendingMedia, MediaStoreError>;

    /// Makes a pending entry visible, returning its final location.
    async fn publish(&self, pending: PendingMedia) -> Result<PathBuf, MediaStoreError>;

    /// Drops a pending entry after a failed write.
    async fn discard(&self, pending: PendingMedia);
}

/// [`MediaStore`] backed by a directory tree.
#[derive(Debug)]
pub struct DirectoryMediaStore {
    root: PathBuf,
    next_row: AtomicU64,
}

impl DirectoryMediaStore {
    /// Creates a store rooted at `root` (created lazily on insert).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            next_row: AtomicU64::new(1),
        }
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, entry: &MediaEntry) -> Result<PathBuf, MediaStoreError> {
        let mut dir = self.root.clone();
        for segment in entry.relative_path.split(['/', '\\']) {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let safe = sanitize_filename(segment);
            if safe.trim_matches('_').is_empty() {
                return Err(MediaStoreError::rejected(
                    &entry.display_name,
                    format!("invalid relative path segment '{segment}'"),
                ));
            }
            dir.push(safe);
        }
        if dir == self.root {
            return Err(MediaStoreError::rejected(
                &entry.display_name,
                "empty relative path",
            ));
        }
        Ok(dir)
    }
}

#[async_trait]
impl MediaStore for DirectoryMediaStore {
    #[instrument(level = "debug", skip(self), fields(name = %entry.display_name))]
    async fn insert(&self, entry: &MediaEntry) -> Result<PendingMedia, MediaStoreError> {
        if entry.display_name.trim().is_empty() {
            return Err(MediaStoreError::rejected(&entry.display_name, "empty display name"));
        }
        let dir = self.collection_dir(entry)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| MediaStoreError::io(&dir, e))?;

        let final_path = resolve_unique_path(&dir, &entry.display_name);
        let final_name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| sanitize_filename(&entry.display_name));
        let row = self.next_row.fetch_add(1, Ordering::SeqCst);
        let pending_path = dir.join(format!("{PENDING_PREFIX}{row}-{final_name}"));

        File::create(&pending_path)
            .await
            .map_err(|e| MediaStoreError::io(&pending_path, e))?;

        let content_uri = format!("content://media/{}/{row}", entry.collection.uri_segment());
        debug!(%content_uri, pending = %pending_path.display(), "inserted pending entry");

        Ok(PendingMedia {
            content_uri,
            pending_path,
            final_path,
        })
    }

    async fn publish(&self, pending: PendingMedia) -> Result<PathBuf, MediaStoreError> {
        // Another writer may have claimed the name while this entry was pending.
        let final_path = if tokio::fs::try_exists(&pending.final_path)
            .await
            .unwrap_or(false)
        {
            let dir = pending
                .final_path
                .parent()
                .map_or_else(|| self.root.clone(), Path::to_path_buf);
            let name = pending
                .final_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            resolve_unique_path(&dir, &name)
        } else {
            pending.final_path.clone()
        };

        if let Err(e) = tokio::fs::rename(&pending.pending_path, &final_path).await {
            let _ = tokio::fs::remove_file(&pending.pending_path).await;
            return Err(MediaStoreError::io(&final_path, e));
        }
        debug!(uri = %pending.content_uri, path = %final_path.display(), "published entry");
        Ok(final_path)
    }

    async fn discard(&self, pending: PendingMedia) {
        if let Err(e) = tokio::fs::remove_file(&pending.pending_path).await {
            warn!(
                path = %pending.pending_path.display(),
                error = %e,
                "failed to remove pending entry"
            );
        }
    }
}

/// Copies an existing file into a collection (insert, write, publish).
///
/// # Errors
///
/// Returns `MediaStoreError` if any step fails; the pending entry is
/// discarded in that case.
pub async fn copy_into_collection(
    store: &dyn MediaStore,
    entry: &MediaEntry,
    source: &Path,
) -> Result<PathBuf, MediaStoreError> {
    let pending = store.insert(entry).await?;
    if let Err(e) = tokio::fs::copy(source, &pending.pending_path).await {
        store.discard(pending).await;
        return Err(MediaStoreError::io(source, e));
    }
    store.publish(pending).await
}
