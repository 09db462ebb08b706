//! Page-facing download entry points.
//!
//! Web content calls `NativeDownloader.downloadImage(url)` and
//! `NativeDownloader.handleDownloadUrl(url)` from injected click handlers
//! ([`click_handler_script`]). Here those calls arrive either directly or as
//! JSON messages (`{"method": "...", "url": "..."}`). Bridge calls never
//! fail towards the page: errors are logged and the user sees a toast.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::coordinator::DownloadCoordinator;
use crate::download::{DispatchOutcome, DownloadRequest, PlanRules, constants::JPEG_MIME};

const SCRIPT_TEMPLATE: &str = r#"(function () {
  if (window.__nativeDownloaderInstalled) { return; }
  window.__nativeDownloaderInstalled = true;
  var reportMarkers = __REPORT_MARKERS__;
  document.addEventListener('contextmenu', function (event) {
    var img = event.target.closest && event.target.closest('img');
    if (img && img.src) {
      event.preventDefault();
      NativeDownloader.downloadImage(img.currentSrc || img.src);
    }
  }, true);
  document.addEventListener('click', function (event) {
    var link = event.target.closest && event.target.closest('a[href]');
    if (!link) { return; }
    var isReport = reportMarkers.some(function (marker) {
      return link.href.indexOf(marker) !== -1;
    });
    if (link.hasAttribute('download') || isReport) {
      event.preventDefault();
      NativeDownloader.handleDownloadUrl(link.href);
    }
  }, true);
})();"#;

/// Script injected into pages to route image long-presses and download
/// links to the bridge.
///
/// Links whose URL contains one of `rules.direct_report_markers` go to the
/// bridge, matching [`PlanRules::is_direct_report`].
#[must_use]
pub fn click_handler_script(rules: &PlanRules) -> String {
    let markers: Vec<&str> = rules
        .direct_report_markers
        .iter()
        .map(String::as_str)
        .filter(|marker| !marker.is_empty())
        .collect();
    // A JSON array of strings is a valid JavaScript array literal.
    let literal = serde_json::to_string(&markers).unwrap_or_else(|_| "[]".to_string());
    SCRIPT_TEMPLATE.replace("__REPORT_MARKERS__", &literal)
}

/// A call posted by page script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum BridgeMessage {
    DownloadImage { url: String },
    HandleDownloadUrl { url: String },
}

/// The object exposed to page script.
#[derive(Debug, Clone)]
pub struct NativeDownloader {
    coordinator: Arc<DownloadCoordinator>,
}

impl NativeDownloader {
    #[must_use]
    pub fn new(coordinator: Arc<DownloadCoordinator>) -> Self {
        Self { coordinator }
    }

    /// The page script for this downloader's report markers.
    #[must_use]
    pub fn script(&self) -> String {
        click_handler_script(self.coordinator.rules())
    }

    /// Saves an image the user long-pressed.
    ///
    /// When neither the server nor the URL identifies an image type, the
    /// image is saved as JPEG.
    pub async fn download_image(&self, url: &str) -> Option<DispatchOutcome> {
        let mut request = self.coordinator.probe_request(url).await;
        if !self.coordinator.plan(&request).is_image {
            debug!(url, "image type not evident, assuming JPEG");
            request = request.with_mime_type(Some(JPEG_MIME.to_string()));
        }
        self.start(request).await
    }

    /// Downloads a link, probing its headers first.
    pub async fn handle_download_url(&self, url: &str) -> Option<DispatchOutcome> {
        let request = self.coordinator.probe_request(url).await;
        self.start(request).await
    }

    /// Parses and runs a JSON bridge message. Malformed messages are
    /// ignored.
    pub async fn handle_message(&self, json: &str) -> Option<DispatchOutcome> {
        match serde_json::from_str::<BridgeMessage>(json) {
            Ok(BridgeMessage::DownloadImage { url }) => self.download_image(&url).await,
            Ok(BridgeMessage::HandleDownloadUrl { url }) => self.handle_download_url(&url).await,
            Err(e) => {
                warn!(error = %e, "ignoring malformed bridge message");
                None
            }
        }
    }

    async fn start(&self, request: DownloadRequest) -> Option<DispatchOutcome> {
        let url = request.url().to_string();
        match self.coordinator.start(request).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(%url, error = %e, "bridge download not started");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_download_image_message() {
        let message: BridgeMessage =
            serde_json::from_str(r#"{"method":"downloadImage","url":"https://x/a.png"}"#).unwrap();
        assert_eq!(
            message,
            BridgeMessage::DownloadImage {
                url: "https://x/a.png".into()
            }
        );
    }

    #[test]
    fn test_parse_handle_download_url_message() {
        let message: BridgeMessage =
            serde_json::from_str(r#"{"method":"handleDownloadUrl","url":"https://x/r"}"#).unwrap();
        assert!(matches!(message, BridgeMessage::HandleDownloadUrl { .. }));
    }

    #[test]
    fn test_unknown_method_rejected() {
        assert!(serde_json::from_str::<BridgeMessage>(r#"{"method":"exec","url":"x"}"#).is_err());
        assert!(serde_json::from_str::<BridgeMessage>("not json").is_err());
    }

    #[test]
    fn test_script_calls_both_bridge_methods() {
        let script = click_handler_script(&PlanRules::default());
        assert!(script.contains("NativeDownloader.downloadImage"));
        assert!(script.contains("NativeDownloader.handleDownloadUrl"));
        assert!(script.contains(r#"var reportMarkers = ["DownloadReport"];"#));
    }

    #[test]
    fn test_script_uses_configured_report_markers() {
        let rules = PlanRules {
            direct_report_markers: vec!["ExportPdf".into(), String::new(), "a\"b".into()],
            ..PlanRules::default()
        };
        let script = click_handler_script(&rules);
        assert!(script.contains(r#"var reportMarkers = ["ExportPdf","a\"b"];"#));
        assert!(!script.contains("DownloadReport"));
        assert!(!script.contains("__REPORT_MARKERS__"));
    }
}
