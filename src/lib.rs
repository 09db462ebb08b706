//! Webdownload Core Library
//!
//! Resolves and saves browser-triggered downloads: a URL plus whatever the
//! server and page said about it (Content-Disposition, Content-Type,
//! Content-Length, a filename hint) becomes a file with a sensible name and
//! extension, saved through a download manager or a media store, with the
//! user told when it is done.
//!
//! # Architecture
//!
//! - [`download`] - plan resolution, dispatch, download manager, media store
//!   and completion handling
//! - [`coordinator`] - the process-wide pipeline built from those parts
//! - [`bridge`] - entry points called by page script
//! - [`ui`] - events posted to the UI loop (toasts, progress, dialogs)
//! - [`cookies`] - browser cookies attached to download requests
//! - [`opener`] - opening saved files

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod cookies;
pub mod coordinator;
pub mod download;
pub mod opener;
pub mod ui;
pub mod user_agent;

// Re-export commonly used types
pub use bridge::{BridgeMessage, NativeDownloader, click_handler_script};
pub use cookies::{BrowserCookies, CookieFileError};
pub use coordinator::{CoordinatorBuilder, CoordinatorSettings, DownloadCoordinator};
pub use download::{
    ActiveDownloadRegistry, AutoConfirm, ConfirmationPrompt, ConfirmationRequest,
    DestinationStrategy, DispatchError, DispatchOutcome, DownloadError, DownloadRequest,
    HttpClient, MediaStore, PlanRules, ResolvedDownloadPlan, StorageLayout, resolve_plan,
};
pub use ui::{CompletedDownload, UiEvent, UiHandle, UiReceiver};
