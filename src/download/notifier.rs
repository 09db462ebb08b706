//! Reacts to download-manager completions.
//!
//! One watch per enqueued id. When the id reaches a terminal state the
//! watch stops listening, drops the registry entry, repairs the file's
//! MIME type and extension, publishes it to shared storage if it was
//! written app-privately, then tells the user.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::constants::{DOWNLOADS_RELATIVE_PATH, PICTURES_RELATIVE_PATH};
use super::executor::BackgroundExecutor;
use super::extension::ensure_extension;
use super::filename::resolve_unique_path;
use super::manager::{DownloadRecord, DownloadStatus, ManagerDestination, SystemDownloadManager};
use super::media_store::{MediaCollection, MediaEntry, MediaStore, copy_into_collection};
use super::mime::{is_image, resolve_mime_type};
use super::registry::{ActiveDownloadRegistry, DownloadId};
use super::storage::StorageLayout;
use crate::ui::{CompletedDownload, UiEvent, UiHandle};

/// What the user sees when a download finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// Post a "download complete" notification.
    Notify,
    /// Offer to open the file immediately.
    PromptOpen,
}

/// Awaitable result of a watch.
#[derive(Debug)]
pub struct CompletionHandle {
    task: JoinHandle<Option<CompletedDownload>>,
}

impl CompletionHandle {
    /// Waits for the download to finish. `None` if it failed.
    pub async fn wait(self) -> Option<CompletedDownload> {
        self.task.await.ok().flatten()
    }
}

#[derive(Clone)]
pub struct CompletionNotifier {
    manager: SystemDownloadManager,
    registry: ActiveDownloadRegistry,
    media_store: Arc<dyn MediaStore>,
    layout: StorageLayout,
    executor: BackgroundExecutor,
    ui: UiHandle,
}

impl std::fmt::Debug for CompletionNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionNotifier")
            .field("layout", &self.layout)
            .field("active", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl CompletionNotifier {
    #[must_use]
    pub fn new(
        manager: SystemDownloadManager,
        registry: ActiveDownloadRegistry,
        media_store: Arc<dyn MediaStore>,
        layout: StorageLayout,
        executor: BackgroundExecutor,
        ui: UiHandle,
    ) -> Self {
        Self {
            manager,
            registry,
            media_store,
            layout,
            executor,
            ui,
        }
    }

    /// Starts watching `id`. Must be called inside a Tokio runtime.
    ///
    /// The subscription is taken before the record is checked, so a download
    /// that already finished is still handled exactly once.
    pub fn watch(&self, id: DownloadId, mode: CompletionMode) -> CompletionHandle {
        let mut events = self.manager.subscribe();
        let this = self.clone();
        let task = tokio::spawn(async move {
            while !this.is_finished(id) {
                match events.recv().await {
                    Ok(done) if done == id => break,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(id, skipped, "completion events lagged, rechecking record");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
            drop(events);
            this.complete(id, mode).await
        });
        CompletionHandle { task }
    }

    fn is_finished(&self, id: DownloadId) -> bool {
        self.manager
            .query(id)
            .is_none_or(|record| record.status.is_terminal())
    }

    async fn complete(&self, id: DownloadId, mode: CompletionMode) -> Option<CompletedDownload> {
        let tracked = self.registry.remove(id);
        let record = self.manager.query(id)?;
        let file_name = tracked.unwrap_or_else(|| record.file_name.clone());

        let path = match (&record.status, &record.local_path) {
            (DownloadStatus::Successful, Some(path)) => path.clone(),
            (DownloadStatus::Failed { reason }, _) => {
                warn!(id, %file_name, %reason, "download did not complete");
                self.ui.toast(format!("Download failed: {file_name}"));
                return None;
            }
            _ => {
                warn!(id, %file_name, "download finished without a file");
                self.ui.toast(format!("Download failed: {file_name}"));
                return None;
            }
        };

        let mime_type = resolve_mime_type(&record.url, &file_name, Some(&record.mime_type));
        let path = repair_extension(&path, &mime_type).await;
        let path = if record.destination == ManagerDestination::AppSpecific {
            self.publish_shared(&record, path, &mime_type).await
        } else {
            path
        };

        let done = CompletedDownload {
            file_name: display_name(&path),
            path,
            mime_type,
        };
        info!(id, path = %done.path.display(), "download ready");
        self.ui.post(match mode {
            CompletionMode::Notify => UiEvent::Notification(done.clone()),
            CompletionMode::PromptOpen => UiEvent::OpenPrompt(done.clone()),
        });
        Some(done)
    }

    /// Copies an app-private file into the shared collection on the
    /// background executor, removing the private copy on success.
    ///
    /// Falls back to a plain copy into the public downloads directory, and
    /// keeps the private file if that fails too.
    async fn publish_shared(&self, record: &DownloadRecord, path: PathBuf, mime_type: &str) -> PathBuf {
        let image = is_image(mime_type);
        let entry = MediaEntry {
            display_name: display_name(&path),
            mime_type: mime_type.to_string(),
            collection: if image {
                MediaCollection::Images
            } else {
                MediaCollection::Downloads
            },
            relative_path: if image {
                PICTURES_RELATIVE_PATH.to_string()
            } else {
                DOWNLOADS_RELATIVE_PATH.to_string()
            },
        };
        let store = Arc::clone(&self.media_store);
        let public_dir = self.layout.public_downloads();
        let source = path.clone();
        let id = record.id;

        let job = self.executor.submit(async move {
            let shared = match copy_into_collection(store.as_ref(), &entry, &source).await {
                Ok(shared) => shared,
                Err(e) => {
                    warn!(id, error = %e, "media store publish failed, copying to public downloads");
                    copy_to_dir(&source, &public_dir).await?
                }
            };
            if let Err(e) = tokio::fs::remove_file(&source).await {
                debug!(path = %source.display(), error = %e, "could not remove app-private copy");
            }
            Some(shared)
        });
        job.wait().await.flatten().unwrap_or(path)
    }
}

async fn copy_to_dir(source: &Path, dir: &Path) -> Option<PathBuf> {
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        warn!(dir = %dir.display(), error = %e, "cannot create public downloads directory");
        return None;
    }
    let target = resolve_unique_path(dir, &display_name(source));
    match tokio::fs::copy(source, &target).await {
        Ok(_) => Some(target),
        Err(e) => {
            warn!(target = %target.display(), error = %e, "copy to public downloads failed");
            None
        }
    }
}

/// Renames `path` when its extension disagrees with `mime_type`.
async fn repair_extension(path: &Path, mime_type: &str) -> PathBuf {
    let current = display_name(path);
    let repaired = ensure_extension(&current, mime_type);
    if repaired == current {
        return path.to_path_buf();
    }
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let target = resolve_unique_path(dir, &repaired);
    match tokio::fs::rename(path, &target).await {
        Ok(()) => {
            debug!(from = %current, to = %target.display(), "repaired extension");
            target
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "extension repair failed, keeping name");
            path.to_path_buf()
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
