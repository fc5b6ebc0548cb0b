//! Image candidate extraction.
//!
//! Every `<img>` on the page becomes an [`ImageCandidate`] carrying its
//! position, raw source attributes and the single URL worth fetching. The
//! position ends up in the local filename, so extraction is one pass in
//! document order.

use mdharvest_shared::ImageCandidate;
use scraper::ElementRef;
use tracing::debug;
use url::Url;

use crate::page::RenderedPage;

/// Extract one candidate per `<img>` element, in document order.
///
/// Candidates without any usable source keep `resolved_url: None`; they are
/// neither downloaded nor rewritten.
pub fn resolve_images(page: &RenderedPage) -> Vec<ImageCandidate> {
    let candidates: Vec<ImageCandidate> = page
        .images()
        .enumerate()
        .map(|(index, img)| candidate_for(page.url(), index, img))
        .collect();

    debug!(
        url = %page.url(),
        images = candidates.len(),
        resolvable = candidates.iter().filter(|c| c.resolved_url.is_some()).count(),
        "resolved image candidates"
    );

    candidates
}

fn candidate_for(page_url: &Url, index: usize, img: ElementRef<'_>) -> ImageCandidate {
    let original_src = non_blank(img.value().attr("src")).map(|src| absolutize(page_url, src));
    let data_src = non_blank(img.value().attr("data-src")).map(str::to_string);
    let srcset = non_blank(img.value().attr("srcset")).map(str::to_string);

    let alt_text = non_blank(img.value().attr("alt"))
        .map(str::to_string)
        .unwrap_or_else(|| format!("image-{}", index + 1));

    let resolved_url = best_source(original_src.as_deref(), data_src.as_deref(), srcset.as_deref())
        .map(|url| absolutize(page_url, &url));

    ImageCandidate {
        index,
        original_src,
        data_src,
        srcset,
        alt_text,
        resolved_url,
        ..Default::default()
    }
}

/// Pick the URL to fetch: `src`, then `data-src`, then the first `srcset` entry.
pub fn best_source(src: Option<&str>, data_src: Option<&str>, srcset: Option<&str>) -> Option<String> {
    non_blank(src)
        .or_else(|| non_blank(data_src))
        .or_else(|| srcset.and_then(first_srcset_url))
        .map(str::to_string)
}

/// The URL token of the first `srcset` entry (`"a.png 1x, b.png 2x"` → `a.png`).
pub fn first_srcset_url(srcset: &str) -> Option<&str> {
    srcset
        .split(',')
        .next()
        .and_then(|entry| entry.split_whitespace().next())
}

/// Resolve `raw` against the page URL, keeping it verbatim when it cannot be
/// joined. Inline `data:` sources are kept verbatim too.
fn absolutize(page_url: &Url, raw: &str) -> String {
    if raw
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
    {
        return raw.to_string();
    }

    page_url
        .join(raw)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
