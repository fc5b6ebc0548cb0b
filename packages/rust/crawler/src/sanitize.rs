//! Best-effort hiding of documentation-site chrome before extraction.

use scraper::Selector;
use tracing::{debug, warn};

use crate::page::RenderedPage;

/// Chrome of the GitBook theme: `(description, selector)`.
pub const CHROME_SELECTORS: &[(&str, &str)] = &[
    ("navigation bar", "div.appBarClassName"),
    ("scroll helper", ".scroll-nojump"),
    (
        "side navigation",
        "aside.relative.group.flex.flex-col.basis-full.bg-light",
    ),
    (
        "search trigger",
        r"div.flex.md\:w-56.grow-0.shrink-0.justify-self-end",
    ),
    (
        "next page block",
        r"div.flex.flex-col.md\:flex-row.mt-6.gap-2.max-w-3xl.mx-auto.page-api-block\:ml-0",
    ),
    (
        "last updated footer",
        r"div.flex.flex-row.items-center.mt-6.max-w-3xl.mx-auto.page-api-block\:ml-0",
    ),
];

/// Hides a fixed list of chrome elements on a rendered page.
///
/// Only the first match of each selector is hidden. Missing elements and
/// selectors that fail to parse are skipped: a theme change degrades to
/// extracting more of the page, never to an error.
#[derive(Debug, Clone)]
pub struct DomSanitizer {
    selectors: Vec<(String, String)>,
}

impl DomSanitizer {
    /// A sanitizer for an arbitrary selector list.
    pub fn new<I, D, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = (D, S)>,
        D: Into<String>,
        S: Into<String>,
    {
        Self {
            selectors: selectors
                .into_iter()
                .map(|(d, s)| (d.into(), s.into()))
                .collect(),
        }
    }

    /// Hide chrome on `page`; returns how many elements were hidden.
    pub fn sanitize(&self, page: &mut RenderedPage) -> usize {
        let mut hidden = 0;

        for (what, selector) in &self.selectors {
            let parsed = match Selector::parse(selector) {
                Ok(sel) => sel,
                Err(e) => {
                    warn!(what = %what, selector = %selector, error = ?e, "invalid chrome selector, skipping");
                    continue;
                }
            };

            if page.hide(parsed) {
                debug!(what = %what, "hid page chrome");
                hidden += 1;
            }
        }

        debug!(url = %page.url(), hidden, "sanitized page");
        hidden
    }
}

impl Default for DomSanitizer {
    fn default() -> Self {
        Self::new(CHROME_SELECTORS.iter().copied())
    }
}
