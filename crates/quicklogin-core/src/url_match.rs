//! URL matching between stored accounts and the page being filled
//!
//! Two policies are supported:
//! - `domain`: the page shares the account's origin, or at least its hostname
//! - `path`: same origin, and one normalised path is a string prefix of the
//!   other (`/` on either side covers the whole origin)
//!
//! Path prefixes are compared as raw strings, so `/admin` also matches
//! `/administrator`. Stored accounts rely on this, keep it.

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::credential::{CredentialRecord, MatchMode};

/// Check whether the URL uses a scheme the extension fills (`http`/`https`)
pub fn is_supported_scheme(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn parse_supported(url: &str) -> Option<Url> {
    if !is_supported_scheme(url) {
        return None;
    }

    match Url::parse(url) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!("Could not parse URL {}: {}", url, e);
            None
        }
    }
}

/// Origin (`scheme://host[:port]`) of a supported URL
pub fn origin(url: &str) -> Option<String> {
    parse_supported(url).map(|u| u.origin().ascii_serialization())
}

/// Hostname of a supported URL
pub fn hostname(url: &str) -> Option<String> {
    parse_supported(url).and_then(|u| u.host_str().map(str::to_string))
}

/// Decide whether `account_url` applies to `page_url` under `mode`.
///
/// Identical non-empty strings always match.
pub fn urls_match(account_url: &str, page_url: &str, mode: MatchMode) -> bool {
    if account_url.is_empty() || page_url.is_empty() {
        return false;
    }

    if account_url == page_url {
        return true;
    }

    match mode {
        MatchMode::Domain => domains_match(account_url, page_url),
        MatchMode::Path => paths_match(account_url, page_url),
    }
}

/// Same origin, falling back to the same hostname
pub fn domains_match(url1: &str, url2: &str) -> bool {
    if url1.is_empty() || url2.is_empty() {
        return false;
    }

    if let (Some(o1), Some(o2)) = (origin(url1), origin(url2)) {
        if o1 == o2 {
            return true;
        }
    }

    matches!((hostname(url1), hostname(url2)), (Some(h1), Some(h2)) if h1 == h2)
}

/// Same origin and overlapping path prefixes.
///
/// If either URL cannot be parsed the result of [`domains_match`] is used.
pub fn paths_match(url1: &str, url2: &str) -> bool {
    if url1.is_empty() || url2.is_empty() {
        return false;
    }

    let (u1, u2) = match (Url::parse(url1), Url::parse(url2)) {
        (Ok(u1), Ok(u2)) => (u1, u2),
        _ => {
            debug!("Path match fell back to domain match: {} / {}", url1, url2);
            return domains_match(url1, url2);
        }
    };

    if u1.origin() != u2.origin() {
        return false;
    }

    let path1 = normalize_path(u1.path());
    let path2 = normalize_path(u2.path());

    if path1 == "/" || path2 == "/" {
        return true;
    }

    path2.starts_with(path1) || path1.starts_with(path2)
}

fn normalize_path(path: &str) -> &str {
    let stripped = path.strip_suffix('/').unwrap_or(path);
    if stripped.is_empty() {
        "/"
    } else {
        stripped
    }
}

/// Keep the records that apply to `target_url`, in input order.
///
/// With `exclude_failed`, records whose decryption failed are dropped too.
pub fn filter_by_url(
    records: Vec<CredentialRecord>,
    target_url: &str,
    exclude_failed: bool,
) -> Vec<CredentialRecord> {
    if target_url.is_empty() {
        return Vec::new();
    }

    records
        .into_iter()
        .filter(|record| !(exclude_failed && record.is_decryption_failed()))
        .filter(|record| urls_match(&record.url, target_url, record.match_mode))
        .collect()
}

/// Number of records that apply to `target_url` (decryption state ignored)
pub fn count_matches(records: &[CredentialRecord], target_url: &str) -> usize {
    if target_url.is_empty() {
        return 0;
    }

    records
        .iter()
        .filter(|record| urls_match(&record.url, target_url, record.match_mode))
        .count()
}

/// Whether the string parses as an absolute URL of any scheme
pub fn is_valid_url(url: &str) -> bool {
    !url.is_empty() && Url::parse(url).is_ok()
}

/// Strip a trailing slash from the path (root excepted).
///
/// Input that does not parse is returned unchanged.
pub fn normalize_url(url: &str) -> String {
    let mut parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return url.to_string(),
    };

    let path = parsed.path().to_string();
    if path != "/" && path.ends_with('/') {
        parsed.set_path(&path[..path.len() - 1]);
    }

    parsed.to_string()
}

/// Display information about the active tab's URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabUrlInfo {
    pub is_supported: bool,
    pub url: String,
    pub origin: Option<String>,
    pub display_text: String,
}

impl TabUrlInfo {
    /// Describe a tab URL for the popup header
    pub fn from_url(url: Option<&str>) -> Self {
        let url = match url {
            Some(url) if !url.is_empty() => url,
            _ => {
                return Self {
                    is_supported: false,
                    url: String::new(),
                    origin: None,
                    display_text: "No URL".to_string(),
                }
            }
        };

        if !is_supported_scheme(url) {
            return Self {
                is_supported: false,
                url: url.to_string(),
                origin: None,
                display_text: "Unsupported page".to_string(),
            };
        }

        let display_text = origin(url).unwrap_or_else(|| url.to_string());

        Self {
            is_supported: true,
            url: url.to_string(),
            origin: Some(display_text.clone()),
            display_text,
        }
    }
}
