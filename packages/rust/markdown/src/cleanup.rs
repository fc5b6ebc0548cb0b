//! Tidy-up passes run over htmd output.
//!
//! Code blocks are still markers at this point, so the passes can treat the
//! whole text as prose.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Layout tags htmd passes through untouched; their text is kept.
static LAYOUT_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)</?(?:div|span|section|article|aside|header|footer|figure|figcaption|details|summary|main)\b[^>]*>",
    )
    .expect("valid regex")
});

/// `[text](target)`, with a leading `!` captured so images can be told apart.
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(!?)\[([^\[\]]*)\]\(([^)\s]+)\)").expect("valid regex"));

/// Cleanup over one page's Markdown, resolving links against `base` if given.
pub(crate) struct Cleanup<'a> {
    base: Option<&'a Url>,
}

impl<'a> Cleanup<'a> {
    pub(crate) fn new(base: Option<&'a Url>) -> Self {
        Self { base }
    }

    /// Apply every pass in order.
    pub(crate) fn apply(&self, md: &str) -> String {
        let text = LAYOUT_TAG_RE.replace_all(md, "");
        let text = self.resolve_links(&text);
        let text = trim_line_ends(&text);
        let text = BLANK_RUN_RE.replace_all(&text, "\n\n");

        let body = text.trim_matches('\n');
        if body.is_empty() {
            String::new()
        } else {
            format!("{body}\n")
        }
    }

    /// Make relative link targets absolute. Image targets are left for the
    /// reference rewriter, and targets that already parse as URLs or are
    /// fragment links stay as they are.
    fn resolve_links(&self, md: &str) -> String {
        let Some(base) = self.base else {
            return md.to_string();
        };

        LINK_RE
            .replace_all(md, |caps: &Captures| {
                let target = &caps[3];
                let is_image = !caps[1].is_empty();
                let keep = is_image || target.starts_with('#') || Url::parse(target).is_ok();
                if keep {
                    return caps[0].to_string();
                }

                match base.join(target) {
                    Ok(resolved) => format!("[{}]({resolved})", &caps[2]),
                    Err(_) => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

fn trim_line_ends(md: &str) -> String {
    md.lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
}
