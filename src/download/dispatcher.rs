//! Executes a resolved plan.
//!
//! The dispatcher checks storage permission, asks for confirmation when the
//! plan requires it, and then either hands the transfer to the
//! [`SystemDownloadManager`] (watched by the [`CompletionNotifier`]) or
//! streams it on the [`BackgroundExecutor`] into the media store or a
//! public file. Failures are reported to the user as toasts; nothing is
//! retried.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::client::{HttpClient, ProgressFn, RequestHeaders};
use super::constants::{ACCEPT_ANY, ACCEPT_IMAGE, PICTURES_RELATIVE_PATH};
use super::error::{DispatchError, DownloadError};
use super::executor::{BackgroundExecutor, JobHandle};
use super::filename::resolve_unique_path;
use super::manager::{ManagerDestination, ManagerRequest, SystemDownloadManager};
use super::media_store::{MediaCollection, MediaEntry, MediaStore};
use super::notifier::{CompletionHandle, CompletionMode, CompletionNotifier};
use super::plan::{DestinationStrategy, DownloadRequest, ResolvedDownloadPlan};
use super::registry::{ActiveDownloadRegistry, DownloadId};
use super::storage::{StorageLayout, StoragePermission};
use crate::cookies::BrowserCookies;
use crate::ui::{CompletedDownload, UiEvent, UiHandle};

/// What the confirmation dialog shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub url: String,
    pub file_name: String,
    pub mime_type: String,
    /// Show an image preview.
    pub is_image: bool,
    pub content_length: Option<u64>,
}

/// Asks the user whether a download should start.
#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    /// `true` to download, `false` to cancel.
    async fn confirm(&self, request: ConfirmationRequest) -> bool;
}

/// Accepts every download without asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

#[async_trait]
impl ConfirmationPrompt for AutoConfirm {
    async fn confirm(&self, _request: ConfirmationRequest) -> bool {
        true
    }
}

/// How a dispatched download proceeds.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Handed to the download manager.
    Enqueued {
        id: DownloadId,
        completion: CompletionHandle,
    },
    /// Streaming on the background executor.
    Streaming {
        job: JobHandle<Result<PathBuf, DispatchError>>,
    },
    /// The user declined.
    Cancelled,
}

impl DispatchOutcome {
    /// Waits until the file is saved. `None` if cancelled or failed.
    pub async fn finished(self) -> Option<PathBuf> {
        match self {
            Self::Enqueued { completion, .. } => completion.wait().await.map(|done| done.path),
            Self::Streaming { job } => job.wait().await.and_then(Result::ok),
            Self::Cancelled => None,
        }
    }
}

/// Collaborators the dispatcher drives.
pub struct DispatcherParts {
    pub client: HttpClient,
    pub manager: SystemDownloadManager,
    pub notifier: CompletionNotifier,
    pub registry: ActiveDownloadRegistry,
    pub media_store: Arc<dyn MediaStore>,
    pub executor: BackgroundExecutor,
    pub prompt: Arc<dyn ConfirmationPrompt>,
    pub permission: Arc<dyn StoragePermission>,
    pub cookies: BrowserCookies,
    pub layout: StorageLayout,
    pub ui: UiHandle,
}

pub struct Dispatcher {
    parts: DispatcherParts,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("layout", &self.parts.layout)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new(parts: DispatcherParts) -> Self {
        Self { parts }
    }

    /// Starts the download described by `plan`.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::PermissionDenied` when storage is not
    /// writable; the user has already been told by a toast.
    #[instrument(skip_all, fields(url = %request.url(), file_name = %plan.final_file_name))]
    pub async fn dispatch(
        &self,
        plan: &ResolvedDownloadPlan,
        request: &DownloadRequest,
    ) -> Result<DispatchOutcome, DispatchError> {
        let parts = &self.parts;
        if !parts.permission.is_granted(&parts.layout) {
            warn!("storage permission missing, download aborted");
            parts.ui.toast("Storage permission is required to download files");
            return Err(DispatchError::PermissionDenied {
                dir: parts.layout.gated_dir(),
            });
        }

        if plan.requires_confirmation {
            let confirmation = ConfirmationRequest {
                url: request.url().to_string(),
                file_name: plan.final_file_name.clone(),
                mime_type: plan.final_mime_type.clone(),
                is_image: plan.is_image,
                content_length: request.content_length(),
            };
            if !parts.prompt.confirm(confirmation).await {
                info!("download cancelled by user");
                return Ok(DispatchOutcome::Cancelled);
            }
        }

        let headers = self.headers_for(plan, request);
        let outcome = match plan.destination {
            DestinationStrategy::SystemDownloadManager => {
                let mode = if plan.requires_confirmation {
                    CompletionMode::PromptOpen
                } else {
                    CompletionMode::Notify
                };
                self.enqueue(plan, request, headers, mode)
            }
            DestinationStrategy::MediaStoreInsert | DestinationStrategy::ManualHttpStream => {
                self.stream(plan, request, headers)
            }
        };
        Ok(outcome)
    }

    fn headers_for(&self, plan: &ResolvedDownloadPlan, request: &DownloadRequest) -> RequestHeaders {
        RequestHeaders::new(request.user_agent())
            .with_cookie(self.parts.cookies.header_for(request.url()))
            .with_accept(if plan.is_image { ACCEPT_IMAGE } else { ACCEPT_ANY })
    }

    fn enqueue(
        &self,
        plan: &ResolvedDownloadPlan,
        request: &DownloadRequest,
        headers: RequestHeaders,
        mode: CompletionMode,
    ) -> DispatchOutcome {
        let parts = &self.parts;
        let destination = if parts.layout.scoped {
            ManagerDestination::AppSpecific
        } else {
            ManagerDestination::PublicDownloads
        };
        let id = parts.manager.enqueue(ManagerRequest {
            url: request.url().to_string(),
            file_name: plan.final_file_name.clone(),
            mime_type: plan.final_mime_type.clone(),
            headers,
            destination,
        });
        parts.registry.insert(id, plan.final_file_name.clone());
        let completion = parts.notifier.watch(id, mode);
        parts.ui.toast(format!("Downloading {}", plan.final_file_name));
        DispatchOutcome::Enqueued { id, completion }
    }

    fn stream(
        &self,
        plan: &ResolvedDownloadPlan,
        request: &DownloadRequest,
        headers: RequestHeaders,
    ) -> DispatchOutcome {
        let parts = &self.parts;
        let job = StreamJob {
            client: parts.client.clone(),
            media_store: Arc::clone(&parts.media_store),
            layout: parts.layout.clone(),
            ui: parts.ui.clone(),
            url: request.url().to_string(),
            headers,
            file_name: plan.final_file_name.clone(),
            mime_type: plan.final_mime_type.clone(),
            via_media_store: plan.destination == DestinationStrategy::MediaStoreInsert,
        };
        parts.ui.toast(format!("Downloading {}", plan.final_file_name));
        DispatchOutcome::Streaming {
            job: parts.executor.submit(job.run()),
        }
    }
}

/// An image transfer running on the background executor.
struct StreamJob {
    client: HttpClient,
    media_store: Arc<dyn MediaStore>,
    layout: StorageLayout,
    ui: UiHandle,
    url: String,
    headers: RequestHeaders,
    file_name: String,
    mime_type: String,
    via_media_store: bool,
}

impl StreamJob {
    async fn run(self) -> Result<PathBuf, DispatchError> {
        let result = self.save().await;
        match &result {
            Ok(path) => {
                info!(path = %path.display(), "image saved");
                // Keyed like the progress events; `path` has the name on disk.
                self.ui.post(UiEvent::OpenPrompt(CompletedDownload {
                    file_name: self.file_name.clone(),
                    path: path.clone(),
                    mime_type: self.mime_type.clone(),
                }));
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "image download failed");
                self.ui.toast(format!("Download failed: {}", self.file_name));
            }
        }
        result
    }

    async fn save(&self) -> Result<PathBuf, DispatchError> {
        let ui = self.ui.clone();
        let name = self.file_name.clone();
        let progress = move |bytes: u64, total: Option<u64>| {
            ui.post(UiEvent::Progress {
                file_name: name.clone(),
                bytes,
                total,
            });
        };

        if self.via_media_store {
            match self.save_to_media_store(&progress).await {
                Err(DispatchError::MediaStore(e)) => {
                    warn!(error = %e, "media store unavailable, saving to public pictures");
                }
                other => return other,
            }
        }
        self.save_to_public_dir(&progress).await
    }

    async fn save_to_media_store(&self, progress: &ProgressFn<'_>) -> Result<PathBuf, DispatchError> {
        let entry = MediaEntry {
            display_name: self.file_name.clone(),
            mime_type: self.mime_type.clone(),
            collection: MediaCollection::Images,
            relative_path: PICTURES_RELATIVE_PATH.to_string(),
        };
        let pending = self.media_store.insert(&entry).await?;
        let writer = match pending.open_writer().await {
            Ok(writer) => writer,
            Err(e) => {
                self.media_store.discard(pending).await;
                return Err(e.into());
            }
        };
        let sink = pending.pending_path.clone();
        if let Err(e) = self
            .client
            .stream_to_writer(&self.url, &self.headers, writer, &sink, Some(progress))
            .await
        {
            self.media_store.discard(pending).await;
            return Err(e.into());
        }
        Ok(self.media_store.publish(pending).await?)
    }

    async fn save_to_public_dir(&self, progress: &ProgressFn<'_>) -> Result<PathBuf, DispatchError> {
        let dir = self.layout.public_pictures();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| DownloadError::io(&dir, e))?;
        let path = resolve_unique_path(&dir, &self.file_name);
        self.client
            .stream_to_file(&self.url, &self.headers, &path, Some(progress))
            .await?;
        Ok(path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_auto_confirm_accepts() {
        let request = ConfirmationRequest {
            url: "https://example.com/x.png".into(),
            file_name: "x.png".into(),
            mime_type: "image/png".into(),
            is_image: true,
            content_length: None,
        };
        assert!(AutoConfirm.confirm(request).await);
    }

    #[tokio::test]
    async fn test_cancelled_outcome_has_no_file() {
        assert_eq!(DispatchOutcome::Cancelled.finished().await, None);
    }
}
