//! Browser cookies attached to download requests.
//!
//! The browser's cookie store is modelled as a `reqwest::cookie::Jar`,
//! seeded from a Netscape-format cookie file (7 TAB-separated fields per
//! line). Downloads ask [`BrowserCookies::header_for`] for the `Cookie`
//! header of their URL, the same way the page's own requests would.

use std::fmt;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use reqwest::cookie::{CookieStore, Jar};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// One cookie line. The value never appears in `Debug` output.
#[derive(Clone)]
pub struct CookieEntry {
    pub domain: String,
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    /// Unix timestamp, 0 for session cookies.
    pub expires: u64,
    pub name: String,
    value: String,
}

impl CookieEntry {
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    fn set_cookie_header(&self) -> String {
        let mut header = format!(
            "{}={}; Domain={}; Path={}",
            self.name, self.value, self.domain, self.path
        );
        if self.secure {
            header.push_str("; Secure");
        }
        if self.expires > 0 {
            match UNIX_EPOCH.checked_add(Duration::from_secs(self.expires)) {
                Some(at) => {
                    header.push_str("; Expires=");
                    header.push_str(&httpdate::fmt_http_date(at));
                }
                None => warn!(name = %self.name, "expiry out of range, keeping as session cookie"),
            }
        }
        header
    }

    fn origin(&self) -> Option<Url> {
        let scheme = if self.secure { "https" } else { "http" };
        let host = self.domain.trim_start_matches('.');
        Url::parse(&format!("{scheme}://{host}{}", self.path)).ok()
    }
}

impl fmt::Debug for CookieEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieEntry")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("expires", &self.expires)
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CookieFileError {
    #[error("failed to read cookie file: {0}")]
    Io(#[from] std::io::Error),

    #[error("no valid cookies found ({malformed} malformed lines)")]
    Empty { malformed: usize },
}

/// Parses Netscape cookie lines, skipping comments, blanks and malformed
/// lines (logged at warn).
///
/// # Errors
///
/// `Io` on read failure, `Empty` when data lines exist but none parse.
#[instrument(level = "debug", skip(reader))]
pub fn parse_cookie_file(reader: impl BufRead) -> Result<Vec<CookieEntry>, CookieFileError> {
    let mut entries = Vec::new();
    let mut malformed = 0;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_line(line) {
            Ok(entry) => entries.push(entry),
            Err(reason) => {
                malformed += 1;
                warn!(line = idx + 1, %reason, "skipping malformed cookie line");
            }
        }
    }

    if entries.is_empty() && malformed > 0 {
        return Err(CookieFileError::Empty { malformed });
    }
    Ok(entries)
}

fn parse_line(line: &str) -> Result<CookieEntry, String> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [domain, subdomains, path, secure, expires, name, value] = fields[..] else {
        return Err(format!("expected 7 TAB-separated fields, found {}", fields.len()));
    };
    if domain.is_empty() {
        return Err("empty domain".to_string());
    }
    if name.is_empty() {
        return Err("empty cookie name".to_string());
    }
    Ok(CookieEntry {
        domain: domain.to_string(),
        include_subdomains: parse_flag(subdomains)?,
        path: path.to_string(),
        secure: parse_flag(secure)?,
        expires: expires
            .parse()
            .map_err(|_| format!("expires must be a non-negative integer, got '{expires}'"))?,
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(value: &str) -> Result<bool, String> {
    match value {
        "TRUE" => Ok(true),
        "FALSE" => Ok(false),
        other => Err(format!("expected TRUE or FALSE, got '{other}'")),
    }
}

/// Shared cookie store. Cloning shares the jar.
#[derive(Clone, Default)]
pub struct BrowserCookies {
    jar: Arc<Jar>,
}

impl fmt::Debug for BrowserCookies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserCookies").finish_non_exhaustive()
    }
}

impl BrowserCookies {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with `entries`. Entries whose domain does not form a
    /// valid URL are skipped.
    #[must_use]
    pub fn from_entries(entries: &[CookieEntry]) -> Self {
        let store = Self::new();
        for entry in entries {
            store.add(entry);
        }
        store
    }

    /// Reads a Netscape cookie file.
    ///
    /// # Errors
    ///
    /// Returns `CookieFileError` if the file cannot be read or holds no
    /// valid cookie.
    pub fn load(path: &Path) -> Result<Self, CookieFileError> {
        let file = std::fs::File::open(path)?;
        let entries = parse_cookie_file(std::io::BufReader::new(file))?;
        info!(path = %path.display(), count = entries.len(), "loaded cookies");
        Ok(Self::from_entries(&entries))
    }

    pub fn add(&self, entry: &CookieEntry) {
        match entry.origin() {
            Some(origin) => {
                self.jar.add_cookie_str(&entry.set_cookie_header(), &origin);
                debug!(domain = %entry.domain, name = %entry.name, "cookie added");
            }
            None => warn!(domain = %entry.domain, "skipping cookie with unusable domain"),
        }
    }

    /// `Cookie` header value for `url`, if any cookie applies.
    #[must_use]
    pub fn header_for(&self, url: &str) -> Option<String> {
        let url = Url::parse(url).ok()?;
        let value = self.jar.cookies(&url)?;
        value.to_str().ok().map(ToString::to_string)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const FILE: &str = "\
# Netscape HTTP Cookie File
.example.com\tTRUE\t/\tFALSE\t0\tsession\tabc123
secure.example.org\tFALSE\t/docs\tTRUE\t4102444800\ttoken\txyz
broken line
";

    #[test]
    fn test_parse_skips_comments_and_malformed_lines() {
        let entries = parse_cookie_file(Cursor::new(FILE)).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "session");
        assert_eq!(entries[0].value(), "abc123");
        assert!(entries[1].secure);
        assert_eq!(entries[1].expires, 4_102_444_800);
    }

    #[test]
    fn test_parse_rejects_file_without_valid_lines() {
        let err = parse_cookie_file(Cursor::new("nope\nalso nope\n")).unwrap_err();
        assert!(matches!(err, CookieFileError::Empty { malformed: 2 }));
    }

    #[test]
    fn test_parse_bad_flag() {
        let err = parse_line(".a.com\tYES\t/\tFALSE\t0\tn\tv").unwrap_err();
        assert!(err.contains("TRUE or FALSE"));
    }

    #[test]
    fn test_debug_redacts_value() {
        let entries = parse_cookie_file(Cursor::new(FILE)).unwrap();
        let debug = format!("{:?}", entries[0]);
        assert!(!debug.contains("abc123"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_header_for_matching_url() {
        let entries = parse_cookie_file(Cursor::new(FILE)).unwrap();
        let cookies = BrowserCookies::from_entries(&entries);

        let header = cookies.header_for("http://www.example.com/file.pdf").unwrap();
        assert_eq!(header, "session=abc123");
        assert_eq!(
            cookies.header_for("https://secure.example.org/docs/a.pdf").as_deref(),
            Some("token=xyz")
        );
        assert_eq!(cookies.header_for("https://other.net/"), None);
        assert_eq!(cookies.header_for("not a url"), None);
    }

    #[test]
    fn test_load_missing_file() {
        let err = BrowserCookies::load(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, CookieFileError::Io(_)));
    }
}
