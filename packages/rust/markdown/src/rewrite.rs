//! Rewriting of remote image references to their downloaded copies.
//!
//! Each downloaded candidate gets up to four substitution passes, from the
//! most to the least precise:
//!
//! 1. exact original URL
//! 2. URL without its query string, followed by anything
//! 3. raw `data-src` value, followed by anything
//! 4. any reference whose URL contains the remote file name (longer than 3 chars)
//!
//! Every pass runs on the output of the previous one and replaces the alt
//! text with the candidate's own. Patterns are built from escaped literals.
//! Rewriting does no I/O.

use mdharvest_shared::{ImageCandidate, strip_query};
use regex::{NoExpand, Regex};
use tracing::{debug, warn};

/// File names this short match too much of the body to be trusted.
const MIN_FILENAME_CHARS: usize = 3;

/// `![alt](` where the alt text cannot run past its own closing bracket.
const IMAGE_OPEN: &str = r"!\[((?:\\.|[^\]\\\n])*)\]\(";

/// Point every reference to a downloaded image at its local path.
///
/// Candidates without a local path are ignored, leaving their remote
/// references untouched.
pub fn rewrite(body: &str, candidates: &[ImageCandidate]) -> String {
    let mut body = body.to_string();

    for candidate in candidates {
        let Some(local_path) = candidate.local_path.as_deref() else {
            continue;
        };
        let replacement = format!("![{}]({local_path})", candidate.alt_text);

        for (pass, pattern) in patterns_for(candidate).into_iter().enumerate() {
            let re = match Regex::new(&pattern) {
                Ok(re) => re,
                Err(e) => {
                    warn!(pass = pass + 1, index = candidate.index, error = %e, "skipping rewrite pass");
                    continue;
                }
            };

            if re.is_match(&body) {
                debug!(pass = pass + 1, index = candidate.index, local = %local_path, "image reference rewritten");
                body = re.replace_all(&body, NoExpand(&replacement)).into_owned();
            }
        }
    }

    body
}

/// The applicable passes for `candidate`, in order.
fn patterns_for(candidate: &ImageCandidate) -> Vec<String> {
    let mut patterns = Vec::with_capacity(4);

    if let Some(original) = candidate.original_src.as_deref() {
        patterns.push(format!(r"{IMAGE_OPEN}{}\)", regex::escape(original)));
    }

    if let Some(base) = candidate.base_url.as_deref() {
        patterns.push(format!(r"{IMAGE_OPEN}{}[^)]*\)", regex::escape(base)));
    }

    if let Some(data_src) = candidate.data_src.as_deref() {
        patterns.push(format!(r"{IMAGE_OPEN}{}[^)]*\)", regex::escape(data_src)));
    }

    if let Some(filename) = candidate.base_url.as_deref().and_then(remote_filename) {
        patterns.push(format!(r"{IMAGE_OPEN}[^)]*{}[^)]*\)", regex::escape(filename)));
    }

    patterns
}

/// Final path segment of `url`, if long enough to identify the image.
fn remote_filename(url: &str) -> Option<&str> {
    strip_query(url)
        .rsplit('/')
        .next()
        .filter(|name| name.chars().count() > MIN_FILENAME_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn downloaded(index: usize, src: &str, alt: &str, filename: &str) -> ImageCandidate {
        let mut c = ImageCandidate {
            index,
            original_src: Some(src.to_string()),
            alt_text: alt.to_string(),
            resolved_url: Some(src.to_string()),
            ..Default::default()
        };
        c.mark_downloaded(filename);
        c
    }

    #[test]
    fn exact_url_is_rewritten_with_candidate_alt() {
        let body = "Intro\n\n![old alt](https://cdn.example.com/a/img.png?v=2)\n";
        let c = downloaded(0, "https://cdn.example.com/a/img.png?v=2", "Architecture", "image_1_1.png");

        let out = rewrite(body, &[c]);
        assert_eq!(out, "Intro\n\n![Architecture](./images/image_1_1.png)\n");
    }

    #[test]
    fn query_variants_match_by_base_url() {
        let body = "![a](https://cdn.example.com/pic.jpg?w=100) ![b](https://cdn.example.com/pic.jpg?w=800&dpr=2)";
        let c = downloaded(0, "https://cdn.example.com/pic.jpg?w=100", "pic", "image_2_1.jpg");

        let out = rewrite(body, &[c]);
        assert_eq!(out, "![pic](./images/image_2_1.jpg) ![pic](./images/image_2_1.jpg)");
    }

    #[test]
    fn data_src_prefix_matches_lazy_reference() {
        let body = "![x](/lazy/chart.webp?token=abc)";
        let mut c = ImageCandidate {
            index: 0,
            data_src: Some("/lazy/chart.webp".into()),
            alt_text: "chart".into(),
            resolved_url: Some("https://docs.example.com/lazy/chart.webp".into()),
            ..Default::default()
        };
        c.mark_downloaded("image_1_1.webp");

        assert_eq!(rewrite(body, &[c]), "![chart](./images/image_1_1.webp)");
    }

    #[test]
    fn filename_containment_catches_cdn_rewrites() {
        let body = "![](https://images.cdn.example.net/resize/800/diagram.svg?fit=max)";
        let c = downloaded(0, "https://origin.example.com/assets/diagram.svg", "diagram", "image_3_1.svg");

        assert_eq!(rewrite(body, &[c]), "![diagram](./images/image_3_1.svg)");
    }

    #[test]
    fn short_filenames_skip_containment_pass() {
        let body = "![x](https://other.example.com/elsewhere/a.p)";
        let c = downloaded(0, "https://cdn.example.com/a.p", "a", "image_1_1.png");

        assert_eq!(rewrite(body, &[c]), body);
    }

    #[test]
    fn exact_pass_wins_before_containment() {
        let url = "https://cdn.example.com/a/img.png?v=2";
        let body = format!("![x]({url})");
        let c = downloaded(0, url, "precise", "image_1_1.png");

        let patterns = patterns_for(&c);
        let first = Regex::new(&patterns[0]).unwrap();
        assert!(first.is_match(&body));

        let out = rewrite(&body, &[c]);
        assert_eq!(out, "![precise](./images/image_1_1.png)");
        assert!(!out.contains(url));
    }

    #[test]
    fn rewriting_is_idempotent() {
        let body = "![a](https://cdn.example.com/x/one.png?v=1)\n\n![b](https://cdn.example.com/x/two.jpg)\n";
        let candidates = vec![
            downloaded(0, "https://cdn.example.com/x/one.png?v=1", "one", "image_5_1.png"),
            downloaded(1, "https://cdn.example.com/x/two.jpg", "two", "image_5_2.jpg"),
        ];

        let once = rewrite(body, &candidates);
        let twice = rewrite(&once, &candidates);
        assert_eq!(once, twice);
        assert!(once.contains("![one](./images/image_5_1.png)"));
        assert!(once.contains("![two](./images/image_5_2.jpg)"));
    }

    #[test]
    fn candidates_without_local_copy_are_ignored() {
        let body = "![remote](https://cdn.example.com/unreachable.png)";
        let c = ImageCandidate {
            index: 0,
            original_src: Some("https://cdn.example.com/unreachable.png".into()),
            alt_text: "remote".into(),
            resolved_url: Some("https://cdn.example.com/unreachable.png".into()),
            ..Default::default()
        };

        assert_eq!(rewrite(body, &[c]), body);
    }

    #[test]
    fn metacharacters_in_urls_are_literal() {
        let body = "![a](https://cdn.example.com/img(1).png) ![b](https://cdn.example.com/imgX1Y.png)";
        let c = downloaded(0, "https://cdn.example.com/img(1).png", "paren", "image_1_1.png");

        let out = rewrite(body, &[c]);
        assert!(out.contains("![b](https://cdn.example.com/imgX1Y.png)"));
    }

    #[test]
    fn alt_text_never_spans_neighbouring_references() {
        let body = "![first](./images/image_1_1.png) ![second](https://cdn.example.com/pic.jpg?w=800)";
        let c = downloaded(1, "https://cdn.example.com/pic.jpg?w=100", "second", "image_1_2.jpg");

        assert_eq!(
            rewrite(body, &[c]),
            "![first](./images/image_1_1.png) ![second](./images/image_1_2.jpg)"
        );
    }

    #[test]
    fn escaped_brackets_in_alt_are_matched() {
        let body = r"![see \[1\]](https://cdn.example.com/ref.png)";
        let c = downloaded(0, "https://cdn.example.com/ref.png", "ref", "image_1_1.png");

        assert_eq!(rewrite(body, &[c]), "![ref](./images/image_1_1.png)");
    }

    #[test]
    fn dollar_signs_in_alt_are_not_expanded() {
        let body = "![x](https://cdn.example.com/price.png)";
        let c = downloaded(0, "https://cdn.example.com/price.png", "costs $1 and $2", "image_1_1.png");

        assert_eq!(rewrite(body, &[c]), "![costs $1 and $2](./images/image_1_1.png)");
    }

    #[test]
    fn non_image_links_are_left_alone() {
        let body = "[download](https://cdn.example.com/pic.jpg) ![pic](https://cdn.example.com/pic.jpg)";
        let c = downloaded(0, "https://cdn.example.com/pic.jpg", "pic", "image_1_1.jpg");

        assert_eq!(
            rewrite(body, &[c]),
            "[download](https://cdn.example.com/pic.jpg) ![pic](./images/image_1_1.jpg)"
        );
    }
}
