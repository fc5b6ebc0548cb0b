//! Runtime configuration for a harvest run.
//!
//! There is no config file: the CLI's `--url` flag is the only input and
//! everything else is a compiled-in default.

use std::path::PathBuf;

use url::Url;

use crate::error::{HarvestError, Result};

/// Documentation root used when `--url` is not given.
pub const DEFAULT_ROOT_URL: &str = "https://docs.othentic.xyz/main";

/// Directory (relative to the working directory) that receives all output.
pub const DEFAULT_OUTPUT_ROOT: &str = "markdown";

/// Sitemap file name appended to the root URL.
pub const DEFAULT_SITEMAP_FILE: &str = "sitemap-pages.xml";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Viewport
// ---------------------------------------------------------------------------

/// Viewport handed to the renderer before the first navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

// ---------------------------------------------------------------------------
// HarvestConfig
// ---------------------------------------------------------------------------

/// Runtime harvest configuration: the CLI flag merged over defaults.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Documentation root; the sitemap lives directly beneath it.
    pub root_url: Url,
    /// Output root; the site folder is created inside it.
    pub output_root: PathBuf,
    /// Sitemap file name relative to `root_url`.
    pub sitemap_file: String,
    /// Renderer viewport.
    pub viewport: Viewport,
    /// Deadline for each navigation, sitemap fetch and asset download.
    pub request_timeout_secs: u64,
}

impl HarvestConfig {
    /// Build a config for the given root URL string, validating it.
    pub fn from_root(root: &str) -> Result<Self> {
        let root_url = Url::parse(root.trim())
            .map_err(|e| HarvestError::config(format!("invalid root URL '{root}': {e}")))?;

        match root_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(HarvestError::config(format!(
                    "root URL must use http or https, got '{other}'"
                )));
            }
        }

        if root_url.host_str().is_none() {
            return Err(HarvestError::config(format!("root URL has no host: {root}")));
        }

        Ok(Self {
            root_url,
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            sitemap_file: DEFAULT_SITEMAP_FILE.to_string(),
            viewport: Viewport::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        })
    }

    /// Build a config from an optional `--url` value.
    pub fn from_cli(url: Option<&str>) -> Result<Self> {
        let root = url.unwrap_or(DEFAULT_ROOT_URL);
        tracing::debug!(root, "resolving harvest configuration");
        Self::from_root(root)
    }

    /// `{root}/{sitemap_file}`, tolerating a trailing slash on the root.
    pub fn sitemap_url(&self) -> String {
        format!(
            "{}/{}",
            self.root_url.as_str().trim_end_matches('/'),
            self.sitemap_file
        )
    }

    /// Replace the output root (tests and embedding callers).
    pub fn with_output_root(mut self, output_root: impl Into<PathBuf>) -> Self {
        self.output_root = output_root.into();
        self
    }
}
