//! Error types for mdharvest.
//!
//! Library crates use [`HarvestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all mdharvest operations.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Invalid runtime configuration (bad root URL, etc.).
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching the sitemap or an asset.
    #[error("network error: {0}")]
    Network(String),

    /// The renderer could not load or snapshot a page.
    #[error("render error: {0}")]
    Render(String),

    /// Sitemap or HTML parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (empty sitemap, unsupported document, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// HTML-to-Markdown conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = HarvestError::config("root URL must use http or https");
        assert_eq!(
            err.to_string(),
            "config error: root URL must use http or https"
        );

        let err = HarvestError::validation("sitemap contains no <loc> entries");
        assert!(err.to_string().contains("no <loc> entries"));
    }

    #[test]
    fn io_error_mentions_path() {
        let err = HarvestError::io(
            "/tmp/out/images",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/out/images"));
        assert!(msg.contains("denied"));
    }
}
