//! Download requests and the plans resolved from them.
//!
//! [`resolve_plan`] is deterministic: the same request and rules always give
//! the same plan. It never touches the network or the filesystem.

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::constants::{
    DEFAULT_DIRECT_REPORT_MARKER, JPEG_MIME, LARGE_DOWNLOAD_THRESHOLD_BYTES,
    LEGACY_IMAGE_ENDPOINT, PDF_MIME,
};
use super::extension::ensure_extension;
use super::filename::{extract_file_name, parse_content_disposition, sanitize_filename};
use super::mime::{is_image, resolve_mime_type};

/// One download trigger (a page link, a bridge call or a CLI argument).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    url: String,
    suggested_file_name: Option<String>,
    mime_type: Option<String>,
    user_agent: String,
    content_disposition: Option<String>,
    content_length: Option<u64>,
}

impl DownloadRequest {
    /// Creates a request with only the URL and User-Agent known.
    pub fn new(url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            suggested_file_name: None,
            mime_type: None,
            user_agent: user_agent.into(),
            content_disposition: None,
            content_length: None,
        }
    }

    /// Sets the filename hint.
    #[must_use]
    pub fn with_suggested_file_name(mut self, name: Option<String>) -> Self {
        self.suggested_file_name = name.filter(|n| !n.trim().is_empty());
        self
    }

    /// Sets the MIME type reported by the page or server.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: Option<String>) -> Self {
        self.mime_type = mime_type.filter(|m| !m.trim().is_empty());
        self
    }

    /// Sets the raw Content-Disposition header.
    #[must_use]
    pub fn with_content_disposition(mut self, header: Option<String>) -> Self {
        self.content_disposition = header.filter(|h| !h.trim().is_empty());
        self
    }

    /// Sets the announced body size.
    #[must_use]
    pub fn with_content_length(mut self, length: Option<u64>) -> Self {
        self.content_length = length;
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn suggested_file_name(&self) -> Option<&str> {
        self.suggested_file_name.as_deref()
    }

    #[must_use]
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    #[must_use]
    pub fn content_disposition(&self) -> Option<&str> {
        self.content_disposition.as_deref()
    }

    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }
}

/// How a plan's bytes reach storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationStrategy {
    /// Hand the transfer to the system download manager.
    SystemDownloadManager,
    /// Stream into a pending media store entry (scoped storage).
    MediaStoreInsert,
    /// Stream straight into a file in the public directory.
    ManualHttpStream,
}

/// Everything decided about a download before any byte is transferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDownloadPlan {
    pub final_file_name: String,
    pub final_mime_type: String,
    pub is_image: bool,
    pub destination: DestinationStrategy,
    /// Whether the user is asked before the transfer starts.
    pub requires_confirmation: bool,
}

/// Environment inputs to plan resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRules {
    /// Shared storage goes through the media store (API level 29+ behaviour).
    pub scoped_storage: bool,
    /// URL substrings identifying report endpoints that always serve PDFs.
    pub direct_report_markers: Vec<String>,
    /// Size above which downloads skip confirmation.
    pub large_download_threshold: u64,
}

impl Default for PlanRules {
    fn default() -> Self {
        Self {
            scoped_storage: true,
            direct_report_markers: vec![DEFAULT_DIRECT_REPORT_MARKER.to_string()],
            large_download_threshold: LARGE_DOWNLOAD_THRESHOLD_BYTES,
        }
    }
}

impl PlanRules {
    /// True when `url` contains one of the direct report markers.
    #[must_use]
    pub fn is_direct_report(&self, url: &str) -> bool {
        self.direct_report_markers
            .iter()
            .any(|marker| !marker.is_empty() && url.contains(marker.as_str()))
    }
}

/// Resolves name, MIME type and destination for a request.
#[must_use]
pub fn resolve_plan(request: &DownloadRequest, rules: &PlanRules) -> ResolvedDownloadPlan {
    let url = request.url();

    if rules.is_direct_report(url) {
        let name = ensure_extension(&candidate_file_name(request), PDF_MIME);
        debug!(url, file_name = %name, "direct report download");
        return ResolvedDownloadPlan {
            final_file_name: name,
            final_mime_type: PDF_MIME.to_string(),
            is_image: false,
            destination: DestinationStrategy::SystemDownloadManager,
            requires_confirmation: false,
        };
    }

    let (file_name, mime_type) = if let Some(name) = legacy_image_file_name(url) {
        (name, JPEG_MIME.to_string())
    } else {
        let name = candidate_file_name(request);
        let mime = resolve_mime_type(url, &name, request.mime_type());
        (ensure_extension(&name, &mime), mime)
    };
    let is_image = is_image(&mime_type);

    let large = request
        .content_length()
        .is_some_and(|len| len > rules.large_download_threshold);

    let (destination, requires_confirmation) = if large {
        (DestinationStrategy::SystemDownloadManager, false)
    } else if is_image && rules.scoped_storage {
        (DestinationStrategy::MediaStoreInsert, true)
    } else if is_image {
        (DestinationStrategy::ManualHttpStream, true)
    } else {
        (DestinationStrategy::SystemDownloadManager, true)
    };

    debug!(
        url,
        file_name = %file_name,
        mime_type = %mime_type,
        ?destination,
        requires_confirmation,
        "resolved download plan"
    );

    ResolvedDownloadPlan {
        final_file_name: file_name,
        final_mime_type: mime_type,
        is_image,
        destination,
        requires_confirmation,
    }
}

/// Content-Disposition name, then the caller's hint, then URL/generated name.
fn candidate_file_name(request: &DownloadRequest) -> String {
    if let Some(name) = request
        .content_disposition()
        .and_then(parse_content_disposition)
    {
        return sanitize_filename(&name);
    }
    if let Some(hint) = request.suggested_file_name() {
        return sanitize_filename(hint);
    }
    extract_file_name(request.url(), None)
}

/// `<id>_SoilContinuity.jpg` for the legacy image endpoint.
fn legacy_image_file_name(url: &str) -> Option<String> {
    if !url
        .to_ascii_lowercase()
        .contains(&LEGACY_IMAGE_ENDPOINT.to_ascii_lowercase())
    {
        return None;
    }
    let id = Url::parse(url).ok().and_then(|u| {
        u.query_pairs()
            .find(|(key, _)| key.eq_ignore_ascii_case("id"))
            .map(|(_, value)| sanitize_filename(&value))
            .filter(|value| !value.is_empty())
    });
    Some(match id {
        Some(id) => format!("{id}_{LEGACY_IMAGE_ENDPOINT}.jpg"),
        None => format!("{LEGACY_IMAGE_ENDPOINT}.jpg"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const UA: &str = "test-agent";

    fn request(url: &str) -> DownloadRequest {
        DownloadRequest::new(url, UA)
    }

    #[test]
    fn test_spaced_bin_disposition_leaves_no_trailing_space() {
        let req = request("https://example.com/x")
            .with_content_disposition(Some(r#"attachment; filename="report .bin""#.to_string()))
            .with_mime_type(Some("application/x-custom".to_string()));
        let plan = resolve_plan(&req, &PlanRules::default());
        assert_eq!(plan.final_file_name, "report");
    }

    #[test]
    fn test_legacy_endpoint_override() {
        let plan = resolve_plan(
            &request("https://example.com/SoilContinuity?id=55"),
            &PlanRules::default(),
        );
        assert_eq!(plan.final_mime_type, "image/jpeg");
        assert_eq!(plan.final_file_name, "55_SoilContinuity.jpg");
        assert!(plan.is_image);
    }

    #[test]
    fn test_legacy_endpoint_without_id() {
        let plan = resolve_plan(
            &request("https://example.com/api/SoilContinuity"),
            &PlanRules::default(),
        );
        assert_eq!(plan.final_file_name, "SoilContinuity.jpg");
    }

    #[test]
    fn test_content_disposition_name_kept() {
        let req = request("https://example.com/api/export?id=123")
            .with_content_disposition(Some(r#"attachment; filename="Rapor_123.pdf""#.into()))
            .with_mime_type(Some("application/octet-stream".into()));
        let plan = resolve_plan(&req, &PlanRules::default());
        assert_eq!(plan.final_file_name, "Rapor_123.pdf");
        assert_eq!(plan.final_mime_type, "application/pdf");
        assert_eq!(plan.destination, DestinationStrategy::SystemDownloadManager);
        assert!(plan.requires_confirmation);
    }

    #[test]
    fn test_suggested_name_used_when_no_disposition() {
        let req = request("https://example.com/get")
            .with_suggested_file_name(Some("photo.bin".into()))
            .with_mime_type(Some("image/jpeg".into()));
        let plan = resolve_plan(&req, &PlanRules::default());
        assert_eq!(plan.final_file_name, "photo.jpg");
    }

    #[test]
    fn test_direct_report_forces_pdf_without_confirmation() {
        let req = request("https://portal.example.com/DownloadReport?no=9")
            .with_mime_type(Some("text/html".into()));
        let plan = resolve_plan(&req, &PlanRules::default());
        assert_eq!(plan.final_mime_type, "application/pdf");
        assert_eq!(plan.final_file_name, "DownloadReport.pdf");
        assert_eq!(plan.destination, DestinationStrategy::SystemDownloadManager);
        assert!(!plan.requires_confirmation);
    }

    #[test]
    fn test_large_download_skips_confirmation_for_any_mime() {
        for mime in ["image/png", "application/pdf", "video/mp4", "application/octet-stream"] {
            let req = request("https://example.com/file")
                .with_mime_type(Some(mime.into()))
                .with_content_length(Some(LARGE_DOWNLOAD_THRESHOLD_BYTES + 1));
            let plan = resolve_plan(&req, &PlanRules::default());
            assert_eq!(plan.destination, DestinationStrategy::SystemDownloadManager);
            assert!(!plan.requires_confirmation, "mime {mime} asked for confirmation");
        }
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let req = request("https://example.com/doc.pdf")
            .with_content_length(Some(LARGE_DOWNLOAD_THRESHOLD_BYTES));
        assert!(resolve_plan(&req, &PlanRules::default()).requires_confirmation);
    }

    #[test]
    fn test_image_strategy_depends_on_scoped_storage() {
        let req = request("https://example.com/pics/cat.png");
        let scoped = resolve_plan(&req, &PlanRules::default());
        assert_eq!(scoped.destination, DestinationStrategy::MediaStoreInsert);

        let legacy_rules = PlanRules {
            scoped_storage: false,
            ..PlanRules::default()
        };
        let legacy = resolve_plan(&req, &legacy_rules);
        assert_eq!(legacy.destination, DestinationStrategy::ManualHttpStream);
        assert!(legacy.requires_confirmation);
    }

    #[test]
    fn test_plan_extension_matches_mime() {
        let req = request("https://example.com/download?format=pdf")
            .with_suggested_file_name(Some("statement".into()));
        let plan = resolve_plan(&req, &PlanRules::default());
        assert_eq!(plan.final_file_name, "statement.pdf");
    }

    #[test]
    fn test_blank_hints_are_ignored() {
        let req = request("https://example.com/files/a.txt")
            .with_suggested_file_name(Some("  ".into()))
            .with_content_disposition(Some(String::new()));
        assert_eq!(req.suggested_file_name(), None);
        assert_eq!(req.content_disposition(), None);
        assert_eq!(resolve_plan(&req, &PlanRules::default()).final_file_name, "a.txt");
    }
}
