//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Resolve, save and track browser downloads.
///
/// Each URL goes through the same pipeline a browser download would: file
/// name and MIME type resolution, extension repair, confirmation, and a
/// save through the download manager or the media store.
#[derive(Parser, Debug)]
#[command(name = "webdownload")]
#[command(author, version, about)]
pub struct Args {
    /// URLs to download (read from stdin when omitted)
    pub urls: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the resolved plan as JSON instead of downloading
    #[arg(long)]
    pub dry_run: bool,

    /// Read JSON bridge messages from stdin, one per line
    #[arg(long, conflicts_with_all = ["dry_run", "image"])]
    pub bridge: bool,

    /// Treat the URLs as long-pressed images
    #[arg(long)]
    pub image: bool,

    /// Content-Disposition header to resolve with (skips the HEAD probe)
    #[arg(long)]
    pub content_disposition: Option<String>,

    /// MIME type reported by the server
    #[arg(long)]
    pub mime_type: Option<String>,

    /// Suggested file name
    #[arg(long)]
    pub file_name: Option<String>,

    /// Announced content length in bytes
    #[arg(long)]
    pub content_length: Option<u64>,

    /// Do not send a HEAD request for missing headers
    #[arg(long)]
    pub no_probe: bool,

    /// Confirm every download without asking
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Write shared storage directly instead of through the media store
    #[arg(long)]
    pub legacy_storage: bool,

    /// Netscape-format cookie file
    #[arg(long, value_name = "FILE")]
    pub cookies: Option<PathBuf>,

    /// User-Agent for requests
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Shared-storage root (default: current directory)
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// App-private directory (default: <output-dir>/.webdownload)
    #[arg(long, value_name = "DIR")]
    pub app_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["webdownload"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(args.urls.is_empty());
        assert!(!args.dry_run);
        assert!(!args.legacy_storage);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["webdownload", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_request_overrides() {
        let args = Args::try_parse_from([
            "webdownload",
            "--dry-run",
            "--mime-type",
            "application/pdf",
            "--content-disposition",
            "attachment; filename=\"a.pdf\"",
            "--content-length",
            "42",
            "https://example.com/a",
        ])
        .unwrap();
        assert!(args.dry_run);
        assert_eq!(args.mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(args.content_length, Some(42));
        assert_eq!(args.urls, vec!["https://example.com/a".to_string()]);
    }

    #[test]
    fn test_cli_bridge_conflicts_with_dry_run() {
        let err = Args::try_parse_from(["webdownload", "--bridge", "--dry-run"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_rejects_negative_content_length() {
        assert!(Args::try_parse_from(["webdownload", "--content-length", "-1"]).is_err());
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["webdownload", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["webdownload", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
