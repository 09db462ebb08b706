//! Download resolution and dispatch.
//!
//! A browser download goes through three stages:
//!
//! - Resolution ([`resolve_plan`]): pick the file name, MIME type and
//!   extension from the URL, `Content-Disposition` and server hints, and
//!   choose a [`DestinationStrategy`].
//! - Dispatch ([`Dispatcher`]): check storage permission, confirm with the
//!   user, then enqueue on the [`SystemDownloadManager`] or stream on the
//!   [`BackgroundExecutor`].
//! - Completion ([`CompletionNotifier`]): repair the saved file, publish it
//!   to shared storage and notify the user.
//!
//! # Example
//!
//! ```
//! use webdownload_core::download::{DownloadRequest, PlanRules, resolve_plan};
//!
//! let request = DownloadRequest::new("https://example.com/files/report.bin", "agent")
//!     .with_mime_type(Some("application/pdf".to_string()));
//! let plan = resolve_plan(&request, &PlanRules::default());
//! assert_eq!(plan.final_file_name, "report.pdf");
//! assert!(plan.requires_confirmation);
//! ```

mod client;
pub mod constants;
mod dispatcher;
mod error;
mod executor;
mod extension;
mod filename;
mod manager;
mod media_store;
mod mime;
mod notifier;
mod plan;
mod registry;
mod storage;

pub use client::{HttpClient, ProbeResult, ProgressFn, RequestHeaders};
pub use dispatcher::{
    AutoConfirm, ConfirmationPrompt, ConfirmationRequest, DispatchOutcome, Dispatcher,
    DispatcherParts,
};
pub use error::{DispatchError, DownloadError, MediaStoreError};
pub use executor::{BackgroundExecutor, JobHandle};
pub use extension::ensure_extension;
pub use filename::{
    extract_file_name, generated_file_name, parse_content_disposition, sanitize_filename,
};
pub use manager::{
    DownloadRecord, DownloadStatus, ManagerDestination, ManagerRequest, SystemDownloadManager,
};
pub use media_store::{
    DirectoryMediaStore, MediaCollection, MediaEntry, MediaStore, PendingMedia,
    copy_into_collection,
};
pub use mime::{canonical_extension, is_image, mime_for_extension, resolve_mime_type};
pub use notifier::{CompletionHandle, CompletionMode, CompletionNotifier};
pub use plan::{
    DestinationStrategy, DownloadRequest, PlanRules, ResolvedDownloadPlan, resolve_plan,
};
pub use registry::{ActiveDownloadRegistry, DownloadId};
pub use storage::{FilesystemPermission, StaticPermission, StorageLayout, StoragePermission};

// Note: no module-local Result aliases; signatures spell out
// `Result<T, DownloadError>` and friends.
