//! User-Agent used when no page supplied one.
//!
//! Downloads normally reuse the User-Agent of the page that triggered them,
//! so servers see the same client for the page and the file. This is only the
//! fallback for CLI-started downloads.

/// Browser-like User-Agent carrying the crate version.
#[must_use]
pub fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!(
        "Mozilla/5.0 (Linux; Android 14) AppleWebKit/537.36 (KHTML, like Gecko) \
         Mobile Safari/537.36 webdownload/{version}"
    )
}
