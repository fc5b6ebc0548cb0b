//! Page loading, DOM clean-up and image handling.
//!
//! This crate provides:
//! - [`Renderer`]: the page-loading capability, implemented by [`HttpRenderer`] and,
//!   with the `browser` feature, by a headless Chromium `BrowserRenderer`
//! - [`RenderedPage`]: a DOM snapshot and the queries run against it
//! - [`DomSanitizer`]: hides documentation-site chrome before extraction
//! - [`resolve_images`]: one [`mdharvest_shared::ImageCandidate`] per `<img>`
//! - [`AssetFetcher`] and the local naming helpers for downloaded images

pub mod assets;
#[cfg(feature = "browser")]
pub mod browser;
pub mod images;
pub mod page;
pub mod render;
pub mod sanitize;

pub use assets::{
    ALLOWED_EXTENSIONS, AssetFetcher, DEFAULT_EXTENSION, extension_for, local_filename_for,
};
#[cfg(feature = "browser")]
pub use browser::BrowserRenderer;
pub use images::{best_source, first_srcset_url, resolve_images};
pub use page::RenderedPage;
pub use render::{HttpRenderer, Renderer};
pub use sanitize::{CHROME_SELECTORS, DomSanitizer};
