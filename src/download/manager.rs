//! Background download manager.
//!
//! Stands in for the platform download service: requests are enqueued,
//! transferred by their own task, and every terminal state is announced on
//! a broadcast channel carrying the download id. Records live in memory for
//! the lifetime of the manager; nothing is retried or resumed.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use super::client::{HttpClient, RequestHeaders};
use super::error::DownloadError;
use super::filename::resolve_unique_path;
use super::registry::DownloadId;
use super::storage::StorageLayout;

const COMPLETION_CHANNEL_CAPACITY: usize = 64;

/// Where the manager writes the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerDestination {
    /// Public `Download/` directory (legacy storage).
    PublicDownloads,
    /// App-specific `Download/` directory (scoped storage).
    AppSpecific,
}

/// A transfer handed to the manager.
#[derive(Debug, Clone)]
pub struct ManagerRequest {
    pub url: String,
    /// Title shown while downloading; also the on-disk name.
    pub file_name: String,
    pub mime_type: String,
    pub headers: RequestHeaders,
    pub destination: ManagerDestination,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    Pending,
    Running,
    Successful,
    Failed { reason: String },
}

impl DownloadStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Successful | Self::Failed { .. })
    }
}

/// Snapshot of a download's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    pub id: DownloadId,
    pub url: String,
    pub file_name: String,
    pub mime_type: String,
    pub destination: ManagerDestination,
    pub status: DownloadStatus,
    /// Final location, set once the transfer succeeded.
    pub local_path: Option<PathBuf>,
    pub bytes_downloaded: u64,
    pub total_bytes: Option<u64>,
}

/// Handle to the manager. Clones share records and completion events.
#[derive(Debug, Clone)]
pub struct SystemDownloadManager {
    inner: Arc<ManagerInner>,
}

#[derive(Debug)]
struct ManagerInner {
    client: HttpClient,
    layout: StorageLayout,
    records: DashMap<DownloadId, DownloadRecord>,
    next_id: AtomicU64,
    completions: broadcast::Sender<DownloadId>,
}

impl SystemDownloadManager {
    #[must_use]
    pub fn new(client: HttpClient, layout: StorageLayout) -> Self {
        let (completions, _) = broadcast::channel(COMPLETION_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(ManagerInner {
                client,
                layout,
                records: DashMap::new(),
                next_id: AtomicU64::new(1),
                completions,
            }),
        }
    }

    /// Enqueues a transfer and returns its id immediately.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn enqueue(&self, request: ManagerRequest) -> DownloadId {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.records.insert(
            id,
            DownloadRecord {
                id,
                url: request.url.clone(),
                file_name: request.file_name.clone(),
                mime_type: request.mime_type.clone(),
                destination: request.destination,
                status: DownloadStatus::Pending,
                local_path: None,
                bytes_downloaded: 0,
                total_bytes: None,
            },
        );
        info!(id, file_name = %request.file_name, "download enqueued");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run(id, request).await });
        id
    }

    /// Current state of `id`, if the manager knows it.
    #[must_use]
    pub fn query(&self, id: DownloadId) -> Option<DownloadRecord> {
        self.inner.records.get(&id).map(|r| r.value().clone())
    }

    /// Receives the id of every download reaching a terminal state after
    /// this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DownloadId> {
        self.inner.completions.subscribe()
    }
}

impl ManagerInner {
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn run(&self, id: DownloadId, request: ManagerRequest) {
        self.update(id, |r| r.status = DownloadStatus::Running);

        let outcome = self.transfer(id, &request).await;
        match outcome {
            Ok(path) => {
                info!(id, path = %path.display(), "download successful");
                self.update(id, |r| {
                    r.status = DownloadStatus::Successful;
                    r.local_path = Some(path);
                });
            }
            Err(e) => {
                warn!(id, error = %e, "download failed");
                self.update(id, |r| {
                    r.status = DownloadStatus::Failed {
                        reason: e.to_string(),
                    };
                });
            }
        }

        // No subscribers is fine; queries still see the record.
        let _ = self.completions.send(id);
    }

    async fn transfer(&self, id: DownloadId, request: &ManagerRequest) -> Result<PathBuf, DownloadError> {
        let dir = self.target_dir(request.destination).await?;
        let path = resolve_unique_path(&dir, &request.file_name);
        let progress = |bytes: u64, total: Option<u64>| {
            self.update(id, |r| {
                r.bytes_downloaded = bytes;
                r.total_bytes = total;
            });
        };
        self.client
            .stream_to_file(&request.url, &request.headers, &path, Some(&progress))
            .await?;
        Ok(path)
    }

    /// Public downloads fall back to the app directory when the public one
    /// cannot be created.
    async fn target_dir(&self, destination: ManagerDestination) -> Result<PathBuf, DownloadError> {
        let app = self.layout.app_downloads();
        if destination == ManagerDestination::PublicDownloads {
            let public = self.layout.public_downloads();
            match tokio::fs::create_dir_all(&public).await {
                Ok(()) => return Ok(public),
                Err(e) => {
                    debug!(dir = %public.display(), error = %e, "public downloads unavailable, using app directory");
                }
            }
        }
        tokio::fs::create_dir_all(&app)
            .await
            .map_err(|e| DownloadError::io(&app, e))?;
        Ok(app)
    }

    fn update(&self, id: DownloadId, apply: impl FnOnce(&mut DownloadRecord)) {
        if let Some(mut record) = self.records.get_mut(&id) {
            apply(record.value_mut());
        }
    }
}
