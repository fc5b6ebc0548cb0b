//! Shared types, error model, and runtime configuration for mdharvest.
//!
//! This crate is the foundation depended on by all other mdharvest crates.
//! It provides:
//! - [`HarvestError`]: the unified error type
//! - Page-level data model ([`PageJob`], [`ImageCandidate`], [`MarkdownDocument`])
//! - Runtime configuration ([`HarvestConfig`], [`Viewport`])

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    DEFAULT_OUTPUT_ROOT, DEFAULT_ROOT_URL, DEFAULT_SITEMAP_FILE, HarvestConfig, Viewport,
};
pub use error::{HarvestError, Result};
pub use types::{
    ERROR_TITLE, IMAGES_DIR_NAME, ImageCandidate, MarkdownDocument, PageJob, UNTITLED_PAGE,
    strip_query,
};
