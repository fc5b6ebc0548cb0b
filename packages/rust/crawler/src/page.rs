//! Rendered page snapshot and the DOM queries the pipeline runs against it.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Content containers tried in priority order before falling back to `<body>`.
static CONTENT_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    ["main", ".main-content"]
        .iter()
        .map(|s| Selector::parse(s).expect("valid content selector"))
        .collect()
});

static BODY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));
static H1_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1").expect("valid selector"));
static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static IMG_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("valid selector"));
static SITE_TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("header h1, header .logo-text, .site-title").expect("valid selector")
});

/// A loaded page: its final URL and a parsed DOM snapshot.
///
/// Elements can be hidden (see [`crate::DomSanitizer`]). Hiding never alters
/// the tree: title and image queries still see hidden elements, only
/// [`RenderedPage::content_html`] leaves them out.
pub struct RenderedPage {
    url: Url,
    doc: Html,
    hidden: Vec<Selector>,
}

impl RenderedPage {
    /// Parse `html` as the document loaded from `url`.
    pub fn new(url: Url, html: &str) -> Self {
        Self {
            url,
            doc: Html::parse_document(html),
            hidden: Vec::new(),
        }
    }

    /// The page URL (after redirects), used to resolve relative references.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Hide the first element matching `selector`. Returns `false` when
    /// nothing matched.
    pub fn hide(&mut self, selector: Selector) -> bool {
        if self.doc.select(&selector).next().is_none() {
            return false;
        }
        self.hidden.push(selector);
        true
    }

    /// Trimmed text of the first `<h1>`, if it has any.
    pub fn first_h1(&self) -> Option<String> {
        self.doc
            .select(&H1_SEL)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// The document `<title>` with whitespace collapsed.
    pub fn document_title(&self) -> Option<String> {
        self.doc
            .select(&TITLE_SEL)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    }

    /// Best guess at the documentation site's name.
    ///
    /// `<title>` is usually `Page | Site`, so its first `|` part wins unless the
    /// title is missing or contains `undefined`; then header branding, then
    /// the raw title.
    pub fn site_title(&self) -> Option<String> {
        let title = self.document_title();

        if let Some(t) = title.as_deref().filter(|t| !t.contains("undefined")) {
            let first = t.split('|').next().unwrap_or_default().trim();
            return (!first.is_empty()).then(|| first.to_string());
        }

        if let Some(el) = self.doc.select(&SITE_TITLE_SEL).next() {
            let text = el.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }

        title
    }

    /// All `<img>` elements in document order.
    pub fn images(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.doc.select(&IMG_SEL)
    }

    /// Inner markup of the content container with hidden elements left out.
    ///
    /// The container is the first `<main>`, else the first `.main-content`,
    /// else `<body>`.
    pub fn content_html(&self) -> String {
        let container = CONTENT_SELECTORS
            .iter()
            .find_map(|sel| self.doc.select(sel).next())
            .or_else(|| self.doc.select(&BODY_SEL).next());

        let Some(container) = container else {
            return self.doc.root_element().inner_html();
        };

        let hidden: Vec<ElementRef<'_>> = self
            .hidden
            .iter()
            .filter_map(|sel| self.doc.select(sel).next())
            .collect();

        let mut html = container.inner_html();
        for el in &hidden {
            let inside = el.ancestors().any(|a| a.id() == container.id());
            // A hidden ancestor already took this element with it.
            let covered = el
                .ancestors()
                .any(|a| hidden.iter().any(|h| h.id() == a.id()));
            if inside && !covered {
                html = html.replacen(&el.html(), "", 1);
            }
        }
        html
    }
}

impl std::fmt::Debug for RenderedPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedPage")
            .field("url", &self.url.as_str())
            .field("hidden", &self.hidden.len())
            .finish()
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
