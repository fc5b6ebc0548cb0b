//! Output path planning: site folder, category directory and file name.
//!
//! Layout: `{output_root}/{site-folder}/{category}/{filename}.md`, with images
//! in `{category}/images/`.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;
use url::Url;

/// Site title used when the root page yields none.
pub const DEFAULT_SITE_TITLE: &str = "GitBook-Documentation";

/// Category for URLs too short to carry one.
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// File stem for URLs without a path segment.
const INDEX_FILENAME: &str = "index";

/// Position of the category among the `/`-separated parts of the full URL
/// (`https:`, ``, host, first path segment, category, ...).
const CATEGORY_PART: usize = 4;

/// Turn a site title into a folder name.
///
/// Drops everything but ASCII letters, digits, whitespace and hyphens, turns
/// whitespace runs into single hyphens, collapses repeated hyphens and
/// lowercases. An empty result falls back to the sanitized default title.
pub fn sanitize_folder_name(title: &str) -> String {
    let name = sanitize(title);
    if name.is_empty() {
        sanitize(DEFAULT_SITE_TITLE)
    } else {
        name
    }
}

fn sanitize(title: &str) -> String {
    static DISALLOWED_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)[^a-z0-9\s-]").expect("valid regex"));
    static WHITESPACE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
    static HYPHENS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"-+").expect("valid regex"));

    let kept = DISALLOWED_RE.replace_all(title, "");
    let hyphenated = WHITESPACE_RE.replace_all(&kept, "-");
    let collapsed = HYPHENS_RE.replace_all(&hyphenated, "-");
    collapsed.to_lowercase().trim().to_string()
}

/// Category directory for a page URL: the fifth `/`-separated part of the
/// URL string, e.g. `learn` in `https://docs.example.com/main/learn/intro`.
///
/// Shorter URLs (or an empty part) are logged and filed under `unknown`.
pub fn category_for(page_url: &str) -> String {
    match page_url.split('/').nth(CATEGORY_PART) {
        Some(part) if !part.is_empty() => part.to_string(),
        _ => {
            warn!(url = %page_url, "URL structure has no category segment, using 'unknown'");
            UNKNOWN_CATEGORY.to_string()
        }
    }
}

/// Markdown file stem for a page URL: its last non-empty path segment with
/// every character outside `[a-z0-9]` replaced by `_`, lowercased.
pub fn filename_for(page_url: &str) -> String {
    let Ok(url) = Url::parse(page_url) else {
        return INDEX_FILENAME.to_string();
    };

    url.path()
        .split('/')
        .filter(|s| !s.is_empty())
        .next_back()
        .map(|segment| {
            segment
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
                .collect()
        })
        .unwrap_or_else(|| INDEX_FILENAME.to_string())
}
