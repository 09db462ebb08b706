//! HTTP client wrapper for probing and streaming downloads.
//!
//! This module provides the `HttpClient` struct which handles HEAD probes
//! and streaming GET transfers with proper timeout configuration and error
//! handling. There is no retry or range resume: a failed transfer is
//! restarted from its trigger.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{
    ACCEPT, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HeaderName, USER_AGENT,
};
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{ACCEPT_ANY, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use super::filename::decode_header_bytes;

/// Progress callback: `(bytes_so_far, total_if_known)`.
pub type ProgressFn<'a> = dyn Fn(u64, Option<u64>) + Send + Sync + 'a;

/// Per-request headers mirroring what the browser would send.
#[derive(Clone, PartialEq, Eq)]
pub struct RequestHeaders {
    /// `User-Agent` of the page that triggered the download.
    pub user_agent: String,
    /// `Cookie` header for the target URL, if any.
    pub cookie: Option<String>,
    /// `Accept` header.
    pub accept: String,
}

impl RequestHeaders {
    /// Headers with the given User-Agent, no cookies and `Accept: */*`.
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            cookie: None,
            accept: ACCEPT_ANY.to_string(),
        }
    }

    /// Replaces the `Cookie` header.
    #[must_use]
    pub fn with_cookie(mut self, cookie: Option<String>) -> Self {
        self.cookie = cookie;
        self
    }

    /// Replaces the `Accept` header.
    #[must_use]
    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = accept.into();
        self
    }
}

// Cookie values never reach logs.
impl std::fmt::Debug for RequestHeaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHeaders")
            .field("user_agent", &self.user_agent)
            .field("cookie", &self.cookie.as_ref().map(|_| "[REDACTED]"))
            .field("accept", &self.accept)
            .finish()
    }
}

/// Response metadata gathered by a HEAD probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    pub content_disposition: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

/// HTTP client for downloading files with streaming support.
///
/// This client is designed to be created once and reused for multiple downloads,
/// taking advantage of connection pooling.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes (for large files)
    /// - Gzip decompression: enabled
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Sends a HEAD request and reports the download-relevant headers.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` for invalid URLs, network failures, timeouts
    /// and non-success statuses.
    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn probe(
        &self,
        url: &str,
        headers: &RequestHeaders,
    ) -> Result<ProbeResult, DownloadError> {
        let response = self.send("HEAD", url, headers).await?;
        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .map(|v| decode_header_bytes(v.as_bytes()))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let result = ProbeResult {
            content_disposition: header(CONTENT_DISPOSITION),
            content_type: header(CONTENT_TYPE),
            content_length: header(CONTENT_LENGTH).and_then(|v| v.parse::<u64>().ok()),
        };
        debug!(?result, "probe complete");
        Ok(result)
    }

    /// Streams the body of `url` into `writer`, returning bytes written.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the request fails, the server answers with
    /// a non-success status, or writing fails (`Io` carries `sink_path`).
    #[instrument(skip(self, headers, writer, progress), fields(url = %url))]
    pub async fn stream_to_writer<W>(
        &self,
        url: &str,
        headers: &RequestHeaders,
        writer: W,
        sink_path: &Path,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<u64, DownloadError>
    where
        W: AsyncWrite + Unpin,
    {
        let response = self.send("GET", url, headers).await?;
        let total = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let mut writer = BufWriter::new(writer);
        let mut stream = response.bytes_stream();
        let mut bytes_written: u64 = 0;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| {
                if e.is_timeout() {
                    DownloadError::timeout(url)
                } else {
                    DownloadError::network(url, e)
                }
            })?;

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(sink_path.to_path_buf(), e))?;

            bytes_written += chunk.len() as u64;
            if let Some(progress) = progress {
                progress(bytes_written, total);
            }
        }

        writer
            .flush()
            .await
            .map_err(|e| DownloadError::io(sink_path.to_path_buf(), e))?;

        Ok(bytes_written)
    }

    /// Streams `url` into a new file at `path`.
    ///
    /// The partial file is removed if the transfer fails.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`stream_to_writer`](Self::stream_to_writer),
    /// plus `Io` when the file cannot be created.
    #[instrument(skip(self, headers, progress), fields(url = %url, path = %path.display()))]
    pub async fn stream_to_file(
        &self,
        url: &str,
        headers: &RequestHeaders,
        path: &Path,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<u64, DownloadError> {
        let file = File::create(path)
            .await
            .map_err(|e| DownloadError::io(path.to_path_buf(), e))?;

        match self
            .stream_to_writer(url, headers, file, path, progress)
            .await
        {
            Ok(bytes) => {
                info!(bytes, "download complete");
                Ok(bytes)
            }
            Err(e) => {
                debug!(path = %path.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(path).await;
                Err(e)
            }
        }
    }

    async fn send(
        &self,
        method: &str,
        url: &str,
        headers: &RequestHeaders,
    ) -> Result<reqwest::Response, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let mut request = match method {
            "HEAD" => self.client.head(url),
            _ => self.client.get(url),
        };
        request = request
            .header(USER_AGENT, headers.user_agent.as_str())
            .header(ACCEPT, headers.accept.as_str());
        if let Some(cookie) = &headers.cookie {
            request = request.header(COOKIE, cookie.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        if !response.status().is_success() {
            return Err(DownloadError::http_status(url, response.status().as_u16()));
        }
        Ok(response)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_request_headers_debug_redacts_cookie() {
        let headers = RequestHeaders::new("ua").with_cookie(Some("session=secret".into()));
        let debug = format!("{headers:?}");
        assert!(!debug.contains("secret"), "cookie leaked: {debug}");
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_request_headers_default_accept() {
        assert_eq!(RequestHeaders::new("ua").accept, "*/*");
    }

    #[tokio::test]
    async fn test_invalid_url_rejected_before_sending() {
        let client = HttpClient::new();
        let err = client
            .probe("not a url", &RequestHeaders::new("ua"))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::InvalidUrl { .. }));
    }
}
