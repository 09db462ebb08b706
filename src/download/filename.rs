//! Filename extraction, sanitization, and path resolution for downloads.
//!
//! Names come from, in order: the Content-Disposition header, the last URL
//! path segment, and finally a timestamp (`download_yyyyMMdd_HHmmss`).

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

/// `filename*=charset'lang'value` (RFC 5987 / RFC 6266).
#[allow(clippy::expect_used)]
static EXTENDED_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|[;\s])filename\*\s*=\s*"?([A-Za-z0-9_\-]*)'[^']*'([^;"]+)"#)
        .expect("extended filename regex is valid") // Static pattern, safe to panic
});

/// `filename="value"`.
#[allow(clippy::expect_used)]
static QUOTED_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|[;\s])filename\s*=\s*"([^"]*)""#)
        .expect("quoted filename regex is valid") // Static pattern, safe to panic
});

/// `filename=value` without quotes.
#[allow(clippy::expect_used)]
static PLAIN_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|[;\s])filename\s*=\s*([^;"\s][^;]*)"#)
        .expect("plain filename regex is valid") // Static pattern, safe to panic
});

/// ISO-8859-9 bytes that differ from what a Turkish user expects to see.
///
/// Servers that ignore RFC 5987 frequently percent-encode Turkish names in
/// Latin-5, which is not valid UTF-8 and fails regular decoding.
const TURKISH_LATIN5: &[(u8, char)] = &[
    (0xC7, 'Ç'),
    (0xD0, 'Ğ'),
    (0xD6, 'Ö'),
    (0xDC, 'Ü'),
    (0xDD, 'İ'),
    (0xDE, 'Ş'),
    (0xE7, 'ç'),
    (0xF0, 'ğ'),
    (0xF6, 'ö'),
    (0xFC, 'ü'),
    (0xFD, 'ı'),
    (0xFE, 'ş'),
];

/// Derives a file name for a download.
///
/// 1. Content-Disposition `filename*=` / `filename=` value, percent-decoded
/// 2. Last URL path segment (query string and fragment ignored)
/// 3. `download_<yyyyMMdd_HHmmss>`
///
/// The result is sanitized for filesystem use and never empty.
#[must_use]
pub fn extract_file_name(url: &str, content_disposition: Option<&str>) -> String {
    if let Some(name) = content_disposition.and_then(parse_content_disposition) {
        return sanitize_filename(&name);
    }

    if let Some(segment) = last_path_segment(url) {
        return sanitize_filename(&segment);
    }

    generated_file_name()
}

/// Parses a Content-Disposition header and returns the decoded filename.
///
/// Handles:
/// - `attachment; filename*=UTF-8''example%20file.pdf` (preferred when present)
/// - `attachment; filename="example.pdf"`
/// - `attachment; filename=example.pdf`
///
/// Returns `None` when no non-blank filename parameter is present.
#[must_use]
pub fn parse_content_disposition(header: &str) -> Option<String> {
    if let Some(caps) = EXTENDED_FILENAME.captures(header) {
        let charset = caps.get(1).map(|m| m.as_str());
        let value = caps.get(2).map_or("", |m| m.as_str().trim());
        let decoded = decode_percent_encoded(value, charset);
        if !decoded.trim().is_empty() {
            return Some(decoded.trim().to_string());
        }
    }

    let raw = QUOTED_FILENAME
        .captures(header)
        .or_else(|| PLAIN_FILENAME.captures(header))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())?;
    if raw.is_empty() {
        return None;
    }

    let decoded = decode_percent_encoded(raw, None);
    let decoded = decoded.trim();
    (!decoded.is_empty()).then(|| decoded.to_string())
}

/// Percent-decodes `value`, falling back to the Turkish Latin-5 table when
/// the bytes are not valid UTF-8 or the declared charset is not UTF-8.
pub(crate) fn decode_percent_encoded(value: &str, charset: Option<&str>) -> String {
    let declared_utf8 = charset.is_none_or(|c| c.is_empty() || c.eq_ignore_ascii_case("utf-8"));
    if declared_utf8 {
        match urlencoding::decode(value) {
            Ok(decoded) => return decoded.into_owned(),
            Err(e) => debug!(value, error = %e, "UTF-8 decoding failed, using Turkish table"),
        }
    }
    decode_with_turkish_table(value)
}

fn decode_with_turkish_table(value: &str) -> String {
    latin5_lossy(&urlencoding::decode_binary(value.as_bytes()))
}

/// Decodes a raw header value: UTF-8 where valid, Turkish Latin-5 for the
/// remaining bytes.
pub(crate) fn decode_header_bytes(bytes: &[u8]) -> String {
    latin5_lossy(bytes)
}

fn latin5_lossy(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
        for &byte in chunk.invalid() {
            let mapped = TURKISH_LATIN5
                .iter()
                .find(|(b, _)| *b == byte)
                .map_or_else(|| char::from(byte), |(_, c)| *c);
            out.push(mapped);
        }
    }
    out
}

/// Last non-empty URL path segment, percent-decoded.
fn last_path_segment(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = decode_percent_encoded(last, None);
    (!decoded.trim().is_empty()).then_some(decoded)
}

/// Timestamp-based fallback name, e.g. `download_20240131_142501`.
#[must_use]
pub fn generated_file_name() -> String {
    format!("download_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"))
}

/// Returns the lowercase extension of `name` (without the dot), if it has one.
///
/// Only short alphanumeric suffixes count, so `report.v2 final` has none.
pub(crate) fn file_extension(name: &str) -> Option<String> {
    let dot = name.rfind('.')?;
    let ext = &name[dot + 1..];
    if ext.is_empty() || ext.len() > 12 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

/// Resolves a unique file path, adding numeric suffix if file exists.
pub(crate) fn resolve_unique_path(dir: &Path, filename: &str) -> PathBuf {
    let filename = {
        let sanitized = sanitize_filename(filename);
        if sanitized.trim_matches('_').is_empty() {
            "download".to_string()
        } else {
            sanitized
        }
    };
    let base_path = dir.join(&filename);

    if !base_path.exists() {
        return base_path;
    }

    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename.as_str(), ""),
    };

    for i in 1..1000 {
        let new_path = dir.join(format!("{stem}_{i}{ext}"));
        if !new_path.exists() {
            return new_path;
        }
    }

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("{stem}_{timestamp}{ext}"))
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_decode_header_bytes_utf8_and_latin5() {
        assert_eq!(
            decode_header_bytes("filename=\"Şartname.pdf\"".as_bytes()),
            "filename=\"Şartname.pdf\""
        );
        assert_eq!(decode_header_bytes(b"\xDEartname.pdf"), "Şartname.pdf");
    }

    #[test]
    fn test_sanitize_filename_removes_invalid_chars() {
        assert_eq!(sanitize_filename("file/name.pdf"), "file_name.pdf");
        assert_eq!(sanitize_filename("file\\name.pdf"), "file_name.pdf");
        assert_eq!(sanitize_filename("file:name.pdf"), "file_name.pdf");
        assert_eq!(sanitize_filename("file*name.pdf"), "file_name.pdf");
        assert_eq!(sanitize_filename("file?name.pdf"), "file_name.pdf");
        assert_eq!(sanitize_filename("file\"name.pdf"), "file_name.pdf");
        assert_eq!(sanitize_filename("file<name>.pdf"), "file_name_.pdf");
        assert_eq!(sanitize_filename("file|name.pdf"), "file_name.pdf");
    }

    #[test]
    fn test_sanitize_filename_rewrites_dot_segments() {
        assert_eq!(sanitize_filename("."), "_");
        assert_eq!(sanitize_filename(".."), "__");
    }

    #[test]
    fn test_sanitize_filename_preserves_turkish_letters() {
        assert_eq!(sanitize_filename("Güncel Şartname.pdf"), "Güncel Şartname.pdf");
    }

    #[test]
    fn test_parse_content_disposition_quoted() {
        let header = r#"attachment; filename="Rapor_123.pdf""#;
        assert_eq!(
            parse_content_disposition(header),
            Some("Rapor_123.pdf".to_string())
        );
    }

    #[test]
    fn test_parse_content_disposition_unquoted_with_trailing_param() {
        let header = "attachment; filename=example.pdf; size=1234";
        assert_eq!(
            parse_content_disposition(header),
            Some("example.pdf".to_string())
        );
    }

    #[test]
    fn test_parse_content_disposition_rfc5987_preferred() {
        let header = r#"attachment; filename="fallback.pdf"; filename*=UTF-8''%C4%B0hale%20Belgesi.pdf"#;
        assert_eq!(
            parse_content_disposition(header),
            Some("İhale Belgesi.pdf".to_string())
        );
    }

    #[test]
    fn test_parse_content_disposition_latin5_falls_back_to_turkish_table() {
        let header = "attachment; filename=%DEartname_%E7izelge_%FDs%FDt.xlsx";
        assert_eq!(
            parse_content_disposition(header),
            Some("Şartname_çizelge_ısıt.xlsx".to_string())
        );
    }

    #[test]
    fn test_parse_content_disposition_declared_latin5_charset() {
        let header = "attachment; filename*=ISO-8859-9''%F0%FCm%FC%FE.txt";
        assert_eq!(
            parse_content_disposition(header),
            Some("ğümüş.txt".to_string())
        );
    }

    #[test]
    fn test_parse_content_disposition_missing_or_blank() {
        assert_eq!(parse_content_disposition("attachment"), None);
        assert_eq!(parse_content_disposition(r#"attachment; filename="""#), None);
        assert_eq!(parse_content_disposition("inline; name=\"x.pdf\""), None);
    }

    #[test]
    fn test_extract_file_name_sanitizes_content_disposition_value() {
        let name = extract_file_name(
            "https://example.com/x",
            Some(r#"attachment; filename="a:b*c.pdf""#),
        );
        assert_eq!(name, "a_b_c.pdf");
    }

    #[test]
    fn test_extract_file_name_uses_url_segment_without_query() {
        let name = extract_file_name("https://example.com/docs/report%202024.pdf?token=abc", None);
        assert_eq!(name, "report 2024.pdf");
    }

    #[test]
    fn test_extract_file_name_generates_timestamp_when_path_empty() {
        let name = extract_file_name("https://example.com/", None);
        assert!(name.starts_with("download_"), "got {name}");
        let stamp = name.trim_start_matches("download_");
        assert_eq!(stamp.len(), 15, "expected yyyyMMdd_HHmmss, got {stamp}");
        assert_eq!(stamp.as_bytes()[8], b'_');
        assert!(
            stamp
                .chars()
                .enumerate()
                .all(|(i, c)| i == 8 || c.is_ascii_digit())
        );
    }

    #[test]
    fn test_extract_file_name_unparseable_url_generates_name() {
        assert!(extract_file_name("not a url", None).starts_with("download_"));
    }

    #[test]
    fn test_file_extension_rules() {
        assert_eq!(file_extension("photo.JPG"), Some("jpg".to_string()));
        assert_eq!(file_extension("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(file_extension("no_extension"), None);
        assert_eq!(file_extension("trailing."), None);
        assert_eq!(file_extension("report.v2 final"), None);
    }

    #[test]
    fn test_resolve_unique_path_no_conflict() {
        let temp_dir = TempDir::new().unwrap();
        let path = resolve_unique_path(temp_dir.path(), "test.pdf");
        assert_eq!(path, temp_dir.path().join("test.pdf"));
    }

    #[test]
    fn test_resolve_unique_path_multiple_conflicts() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("test.pdf"), b"1").unwrap();
        std::fs::write(temp_dir.path().join("test_1.pdf"), b"2").unwrap();

        let path = resolve_unique_path(temp_dir.path(), "test.pdf");
        assert_eq!(path, temp_dir.path().join("test_2.pdf"));
    }

    #[test]
    fn test_resolve_unique_path_stays_under_dir() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        for malicious in ["../../etc/passwd", "..", "a/\\b\\c"] {
            let path = resolve_unique_path(base, malicious);
            assert!(path.starts_with(base), "escaped dir: {}", path.display());
            assert!(!path.components().any(|c| c == Component::ParentDir));
        }
    }
}
