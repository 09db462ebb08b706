//! Error types for the download module.
//!
//! This module defines structured errors for all download operations,
//! providing context-rich error messages for debugging and user feedback.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during HTTP transfers.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP response.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error during download (create file, write, etc.)
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}

/// Errors raised by a [`MediaStore`](super::MediaStore) implementation.
#[derive(Debug, Error)]
pub enum MediaStoreError {
    /// The store could not create, write or rename an entry.
    #[error("media store IO error at {path}: {source}")]
    Io {
        /// Path of the entry being written.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The store refused the entry (bad display name, unknown collection, ...).
    #[error("media store rejected {display_name}: {reason}")]
    Rejected {
        /// Display name of the rejected entry.
        display_name: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl MediaStoreError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a rejection error.
    pub fn rejected(display_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            display_name: display_name.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that abort a dispatch.
///
/// Every variant is also surfaced to the user as a toast before being returned.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Shared storage is not writable and scoped storage is unavailable.
    #[error("storage permission not granted for {dir}")]
    PermissionDenied {
        /// Directory that could not be written.
        dir: PathBuf,
    },

    /// The transfer itself failed.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Saving through the media store failed and no fallback was possible.
    #[error(transparent)]
    MediaStore(#[from] MediaStoreError),
}
