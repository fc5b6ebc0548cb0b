//! Sitemap XML parser.
//!
//! Accepts the standard sitemap schema:
//! `<urlset><url><loc>...</loc></url>...</urlset>`. The page list is the
//! sequence of `<loc>` text values in document order.

use mdharvest_shared::{HarvestError, Result};
use regex::Regex;
use std::sync::LazyLock;

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// Matches the opening `<urlset ...>` tag.
static URLSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:[A-Za-z0-9_-]+:)?urlset[\s>]").expect("urlset regex")
});

/// Matches the opening `<sitemapindex ...>` tag.
static SITEMAP_INDEX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:[A-Za-z0-9_-]+:)?sitemapindex[\s>]").expect("sitemapindex regex")
});

/// Matches `<loc>value</loc>` across line breaks, with optional namespace prefix.
static LOC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:[A-Za-z0-9_-]+:)?loc>(.*?)</(?:[A-Za-z0-9_-]+:)?loc>").expect("loc regex")
});

/// Matches a CDATA wrapper around a `<loc>` value.
static CDATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^<!\[CDATA\[(.*)\]\]>$").expect("cdata regex")
});

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse a sitemap document into its ordered list of page URLs.
///
/// A sitemap index (a sitemap of sitemaps) is rejected: only page sitemaps
/// are supported. Duplicated `<loc>` values are kept, in order.
pub(crate) fn parse_sitemap(xml: &str) -> Result<Vec<String>> {
    if xml.trim().is_empty() {
        return Err(HarvestError::parse("sitemap is empty"));
    }

    if SITEMAP_INDEX_RE.is_match(xml) {
        return Err(HarvestError::parse(
            "sitemap is a <sitemapindex>; expected a <urlset> of pages",
        ));
    }

    if !URLSET_RE.is_match(xml) {
        return Err(HarvestError::parse("sitemap has no <urlset> element"));
    }

    let locs = LOC_RE
        .captures_iter(xml)
        .filter_map(|caps| {
            let raw = caps[1].trim();
            let value = match CDATA_RE.captures(raw) {
                Some(inner) => inner[1].trim().to_string(),
                None => unescape_xml(raw),
            };
            (!value.is_empty()).then_some(value)
        })
        .collect();

    Ok(locs)
}

/// Decode the five predefined XML entities.
fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
