//! Sitemap discovery: turns a documentation root into an ordered page list.
//!
//! An unreachable, malformed or empty sitemap is fatal for the run, so every
//! failure here is returned as an error rather than swallowed.

mod parser;

use std::time::Duration;

use mdharvest_shared::{HarvestError, Result};
use reqwest::Client;
use tracing::{debug, info, instrument};

const MAX_REDIRECTS: usize = 5;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Sitemap protocol size limit (50 MB).
pub const MAX_SITEMAP_BYTES: u64 = 50 * 1024 * 1024;

const USER_AGENT: &str = concat!("mdharvest/", env!("CARGO_PKG_VERSION"));

/// Knobs for the sitemap request.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Whole-request deadline in seconds.
    pub timeout_secs: u64,
    /// Largest body accepted, counted as it streams in.
    pub max_bytes: u64,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_bytes: MAX_SITEMAP_BYTES,
        }
    }
}

/// Fetch the sitemap at `sitemap_url` and return its `<loc>` values in order.
///
/// Fails when the sitemap cannot be fetched, is not a `<urlset>`, or lists no
/// pages at all.
#[instrument(skip(opts))]
pub async fn fetch_sitemap(sitemap_url: &str, opts: &DiscoveryOptions) -> Result<Vec<String>> {
    info!("fetching sitemap");

    let network = |what: &str, e: reqwest::Error| {
        HarvestError::Network(format!("{sitemap_url}: {what}: {e}"))
    };

    let client = Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(opts.timeout_secs))
        .build()
        .map_err(|e| network("failed to build HTTP client", e))?;

    let mut response = client
        .get(sitemap_url)
        .send()
        .await
        .map_err(|e| network("request failed", e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(HarvestError::Network(format!("{sitemap_url}: HTTP {status}")));
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| network("failed to read body", e))?
    {
        if (bytes.len() + chunk.len()) as u64 > opts.max_bytes {
            return Err(HarvestError::validation(format!(
                "{sitemap_url}: sitemap larger than {} bytes",
                opts.max_bytes
            )));
        }
        bytes.extend_from_slice(&chunk);
    }
    let body = String::from_utf8_lossy(&bytes);
    debug!(bytes = bytes.len(), "sitemap downloaded");

    let urls = parser::parse_sitemap(&body)?;
    if urls.is_empty() {
        return Err(HarvestError::validation(format!(
            "no URLs found in sitemap {sitemap_url}; check that the root URL is correct"
        )));
    }

    info!(pages = urls.len(), "sitemap parsed");
    Ok(urls)
}
