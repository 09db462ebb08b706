//! Reconciles a file name's extension with its resolved MIME type.

use super::filename::file_extension;
use super::mime::{canonical_extension, mime_for_extension, normalize_mime};

const BIN_SUFFIX: &str = ".bin";

/// Returns `file_name` with an extension consistent with `mime_type`.
///
/// Rules, in order:
/// 1. trailing `.bin` suffixes are removed (servers use it as a placeholder)
/// 2. when `mime_type` has a canonical extension and the current extension
///    does not already map to `mime_type`, a known extension is replaced and
///    anything else gets the canonical extension appended
/// 3. otherwise the name is left alone
///
/// Applying the function twice gives the same result as applying it once.
#[must_use]
pub fn ensure_extension(file_name: &str, mime_type: &str) -> String {
    let name = strip_bin_suffix(file_name.trim());
    let name = if name.is_empty() { "download" } else { name };

    let mime = normalize_mime(mime_type);
    let Some(canonical) = canonical_extension(&mime) else {
        return name.to_string();
    };

    match file_extension(name) {
        Some(ext) if ext == canonical => name.to_string(),
        Some(ext) if mime_for_extension(&ext).is_some_and(|m| m == mime) => name.to_string(),
        Some(ext) if mime_for_extension(&ext).is_some() => {
            let stem = &name[..name.len() - ext.len() - 1];
            let stem = if stem.is_empty() { "download" } else { stem };
            format!("{stem}.{canonical}")
        }
        _ => format!("{name}.{canonical}"),
    }
}

/// Strips trailing `.bin` suffixes and any whitespace they leave behind.
fn strip_bin_suffix(mut name: &str) -> &str {
    while name.len() >= BIN_SUFFIX.len() {
        let split = name.len() - BIN_SUFFIX.len();
        match name.get(split..) {
            Some(tail) if tail.eq_ignore_ascii_case(BIN_SUFFIX) => name = name[..split].trim_end(),
            _ => break,
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_replaced_by_jpg() {
        assert_eq!(ensure_extension("photo.bin", "image/jpeg"), "photo.jpg");
    }

    #[test]
    fn test_bin_stripped_even_for_unknown_mime() {
        assert_eq!(ensure_extension("payload.BIN", "application/x-custom"), "payload");
        assert_eq!(ensure_extension("a.bin.bin", "application/octet-stream"), "a");
    }

    #[test]
    fn test_missing_extension_appended() {
        assert_eq!(ensure_extension("Rapor_123", "application/pdf"), "Rapor_123.pdf");
    }

    #[test]
    fn test_mismatched_known_extension_replaced() {
        assert_eq!(ensure_extension("scan.png", "image/jpeg"), "scan.jpg");
        assert_eq!(ensure_extension("report.html", "application/pdf"), "report.pdf");
    }

    #[test]
    fn test_unknown_extension_kept_and_canonical_appended() {
        assert_eq!(ensure_extension("export.v2", "application/pdf"), "export.v2.pdf");
    }

    #[test]
    fn test_alias_extension_left_alone() {
        assert_eq!(ensure_extension("photo.jpeg", "image/jpeg"), "photo.jpeg");
        assert_eq!(ensure_extension("photo.JPG", "image/jpeg"), "photo.JPG");
    }

    #[test]
    fn test_unknown_mime_leaves_name_untouched() {
        assert_eq!(ensure_extension("archive.zip", "application/zip"), "archive.zip");
        assert_eq!(ensure_extension("movie", "video/mp4"), "movie");
    }

    #[test]
    fn test_whitespace_before_bin_is_trimmed() {
        assert_eq!(ensure_extension("report .bin", "application/x-custom"), "report");
        assert_eq!(ensure_extension("a \t.BIN", "application/pdf"), "a.pdf");
    }

    #[test]
    fn test_empty_after_strip_uses_placeholder() {
        assert_eq!(ensure_extension(".bin", "image/png"), "download.png");
    }

    #[test]
    fn test_idempotent_over_sample_inputs() {
        let names = [
            "photo.bin",
            "a.bin.bin",
            "Rapor_123",
            "scan.png",
            "export.v2",
            ".bin",
            "x.jpeg",
            "",
            "ödev.docx",
            ".jpg",
            "report .bin",
            "a \t.BIN",
            " .bin.bin ",
            "a.bin .bin",
        ];
        let mimes = [
            "image/jpeg",
            "application/pdf",
            "application/zip",
            "application/octet-stream",
            "text/plain",
            "image/png; charset=binary",
        ];
        for name in names {
            for mime in mimes {
                let once = ensure_extension(name, mime);
                let twice = ensure_extension(&once, mime);
                assert_eq!(once, twice, "not idempotent for ({name:?}, {mime:?})");
            }
        }
    }
}
