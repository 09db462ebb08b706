//! Constants for the download module (timeouts, dispatch thresholds, MIME labels).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Downloads larger than this go straight to the system download manager
/// without a confirmation prompt (10 MiB).
pub const LARGE_DOWNLOAD_THRESHOLD_BYTES: u64 = 10 * 1024 * 1024;

/// Fallback MIME type when nothing better is known.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// MIME type forced for direct report downloads.
pub const PDF_MIME: &str = "application/pdf";

/// MIME type implied by the legacy image endpoint.
pub const JPEG_MIME: &str = "image/jpeg";

/// URL marker of the legacy endpoint that always serves JPEG images.
pub const LEGACY_IMAGE_ENDPOINT: &str = "SoilContinuity";

/// Default URL marker for report endpoints that always serve PDFs.
pub const DEFAULT_DIRECT_REPORT_MARKER: &str = "DownloadReport";

/// `Accept` header for generic downloads.
pub const ACCEPT_ANY: &str = "*/*";

/// `Accept` header for image downloads.
pub const ACCEPT_IMAGE: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";

/// Relative path used for shared download collections.
pub const DOWNLOADS_RELATIVE_PATH: &str = "Download";

/// Relative path used for shared image collections.
pub const PICTURES_RELATIVE_PATH: &str = "Pictures";
