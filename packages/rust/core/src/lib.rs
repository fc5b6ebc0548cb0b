//! Crawl orchestration for mdharvest.
//!
//! This crate ties together sitemap discovery, page rendering, image
//! download and Markdown conversion into the end-to-end [`harvest`] run.

pub mod page;
pub mod paths;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod testing;

pub use page::{PageConverter, PageOutcome};
pub use paths::{
    DEFAULT_SITE_TITLE, UNKNOWN_CATEGORY, category_for, filename_for, sanitize_folder_name,
};
pub use pipeline::{CrawlSummary, ProgressReporter, SilentProgress, harvest};
