//! MIME type resolution from headers, file names and URL evidence.
//!
//! Servers regularly label real documents as `application/octet-stream`,
//! so a provided type only wins when it is specific. Otherwise the file
//! extension, then URL heuristics, decide.

use url::Url;

use super::constants::{JPEG_MIME, LEGACY_IMAGE_ENDPOINT, OCTET_STREAM, PDF_MIME};
use super::filename::file_extension;

/// Provided MIME types that carry no information about the payload.
const NON_SPECIFIC_MIME_TYPES: &[&str] = &[OCTET_STREAM, "application/force-download"];

/// Extension to MIME type lookup.
const EXTENSION_MIME_TYPES: &[(&str, &str)] = &[
    // Documents
    ("pdf", PDF_MIME),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("ppt", "application/vnd.ms-powerpoint"),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("odt", "application/vnd.oasis.opendocument.text"),
    ("ods", "application/vnd.oasis.opendocument.spreadsheet"),
    ("rtf", "application/rtf"),
    ("txt", "text/plain"),
    ("csv", "text/csv"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    // Archives
    ("zip", "application/zip"),
    ("rar", "application/vnd.rar"),
    ("7z", "application/x-7z-compressed"),
    ("gz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("apk", "application/vnd.android.package-archive"),
    // Images
    ("jpg", JPEG_MIME),
    ("jpeg", JPEG_MIME),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("heic", "image/heic"),
    // Audio
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("m4a", "audio/mp4"),
    ("aac", "audio/aac"),
    ("flac", "audio/flac"),
    // Video
    ("mp4", "video/mp4"),
    ("mkv", "video/x-matroska"),
    ("webm", "video/webm"),
    ("avi", "video/x-msvideo"),
    ("mov", "video/quicktime"),
    ("3gp", "video/3gpp"),
];

/// Canonical extension per MIME type, limited to image and document types.
///
/// Types not listed here never have their file extension rewritten.
const CANONICAL_EXTENSIONS: &[(&str, &str)] = &[
    (JPEG_MIME, "jpg"),
    ("image/jpg", "jpg"),
    ("image/pjpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/bmp", "bmp"),
    ("image/webp", "webp"),
    ("image/heic", "heic"),
    (PDF_MIME, "pdf"),
    ("application/msword", "doc"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
    ),
    ("application/vnd.ms-excel", "xls"),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xlsx",
    ),
    ("application/vnd.ms-powerpoint", "ppt"),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "pptx",
    ),
    ("text/plain", "txt"),
    ("text/csv", "csv"),
];

/// Resolves the MIME type of a download.
///
/// Precedence, highest first:
/// 1. `provided`, unless it is missing or non-specific
/// 2. extension of `file_name`
/// 3. URL heuristics (`format=pdf`, `pdf=true`, the legacy JPEG endpoint,
///    the URL path's own extension, image extensions inside the path)
/// 4. `application/octet-stream`
#[must_use]
pub fn resolve_mime_type(url: &str, file_name: &str, provided: Option<&str>) -> String {
    if let Some(provided) = provided.map(normalize_mime)
        && !is_non_specific(&provided)
    {
        return provided;
    }

    if let Some(mime) = file_extension(file_name).and_then(|ext| mime_for_extension(&ext)) {
        return mime.to_string();
    }

    if let Some(mime) = mime_from_url(url) {
        return mime.to_string();
    }

    OCTET_STREAM.to_string()
}

fn mime_from_url(url: &str) -> Option<&'static str> {
    let lowered = url.to_ascii_lowercase();
    if lowered.contains("format=pdf") || lowered.contains("pdf=true") {
        return Some(PDF_MIME);
    }
    if lowered.contains(&LEGACY_IMAGE_ENDPOINT.to_ascii_lowercase()) {
        return Some(JPEG_MIME);
    }

    let path = Url::parse(url).map_or_else(
        |_| {
            lowered
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string()
        },
        |u| u.path().to_ascii_lowercase(),
    );

    if let Some(mime) = path
        .rsplit('/')
        .next()
        .and_then(file_extension)
        .and_then(|ext| mime_for_extension(&ext))
    {
        return Some(mime);
    }

    if path.contains(".jpg") || path.contains(".jpeg") {
        return Some(JPEG_MIME);
    }
    if path.contains(".png") {
        return Some("image/png");
    }
    None
}

/// Strips parameters and lowercases a MIME type (`Text/HTML; charset=x` -> `text/html`).
#[must_use]
pub fn normalize_mime(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// True for empty and generic binary MIME types.
#[must_use]
pub fn is_non_specific(mime: &str) -> bool {
    let mime = normalize_mime(mime);
    mime.is_empty() || NON_SPECIFIC_MIME_TYPES.contains(&mime.as_str())
}

/// True for `image/*` types.
#[must_use]
pub fn is_image(mime: &str) -> bool {
    normalize_mime(mime).starts_with("image/")
}

/// Looks up the MIME type for an extension (without the dot, any case).
#[must_use]
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    EXTENSION_MIME_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

/// Canonical extension for image and document MIME types.
#[must_use]
pub fn canonical_extension(mime: &str) -> Option<&'static str> {
    let mime = normalize_mime(mime);
    CANONICAL_EXTENSIONS
        .iter()
        .find(|(m, _)| *m == mime)
        .map(|(_, ext)| *ext)
}
