//! Page-level data model shared by the crawler, markdown and core crates.

use std::path::{Path, PathBuf};

/// Sub-directory of a page's output directory that receives its images.
pub const IMAGES_DIR_NAME: &str = "images";

// ---------------------------------------------------------------------------
// PageJob
// ---------------------------------------------------------------------------

/// One sitemap entry scheduled for conversion.
///
/// The sequence number is 1-based and strictly increasing across a run; it is
/// embedded in every image filename the page produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageJob {
    /// Page URL exactly as listed in the sitemap.
    pub url: String,
    /// Position of the page in the crawl (1-based).
    pub sequence_number: usize,
    /// Category directory the page's Markdown file is written into.
    pub output_dir: PathBuf,
}

impl PageJob {
    pub fn new(url: impl Into<String>, sequence_number: usize, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            sequence_number,
            output_dir: output_dir.into(),
        }
    }

    /// `{output_dir}/images`.
    pub fn images_dir(&self) -> PathBuf {
        self.output_dir.join(IMAGES_DIR_NAME)
    }
}

// ---------------------------------------------------------------------------
// ImageCandidate
// ---------------------------------------------------------------------------

/// Raw attributes of one `<img>` element plus what the pipeline learned about it.
///
/// `resolved_url` is filled by the resolver; `base_url`, `local_path` and
/// `local_filename` only once the asset has been downloaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageCandidate {
    /// Position of the element among all `<img>` elements of the page (0-based).
    pub index: usize,
    /// The element's `src`, resolved against the page URL.
    pub original_src: Option<String>,
    /// Raw `data-src` attribute (lazy-loaded images).
    pub data_src: Option<String>,
    /// Raw `srcset` attribute.
    pub srcset: Option<String>,
    /// The element's `alt`, or `image-{index+1}` when it has none.
    pub alt_text: String,
    /// Best remote URL to fetch, if any source attribute was usable.
    pub resolved_url: Option<String>,
    /// `resolved_url` without its query string.
    pub base_url: Option<String>,
    /// Markdown-relative path of the downloaded copy (`./images/...`).
    pub local_path: Option<String>,
    /// File name of the downloaded copy.
    pub local_filename: Option<String>,
}

impl ImageCandidate {
    /// Record a successful download into `images/{filename}`.
    pub fn mark_downloaded(&mut self, filename: impl Into<String>) {
        let filename = filename.into();
        self.base_url = self.resolved_url.as_deref().map(|u| strip_query(u).to_string());
        self.local_path = Some(format!("./{IMAGES_DIR_NAME}/{filename}"));
        self.local_filename = Some(filename);
    }
}

/// Everything before the first `?`.
pub fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

// ---------------------------------------------------------------------------
// MarkdownDocument
// ---------------------------------------------------------------------------

/// Title used when a page has no `<h1>`.
pub const UNTITLED_PAGE: &str = "Untitled Page";

/// Title of the placeholder document written for a failed page.
pub const ERROR_TITLE: &str = "Error Extracting Content";

/// A converted page: a title and a Markdown body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownDocument {
    pub title: String,
    pub body: String,
}

impl MarkdownDocument {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Placeholder written when a page cannot be converted.
    pub fn error(url: &str, message: &str) -> Self {
        Self {
            title: ERROR_TITLE.to_string(),
            body: format!("Failed to extract content from {url}. Error: {message}"),
        }
    }

    /// Final file contents: `# {title}\n\n{body}`.
    pub fn render(&self) -> String {
        format!("# {}\n\n{}", self.title, self.body)
    }

    /// Write the rendered document to `path`.
    pub fn write_to(&self, path: &Path) -> crate::Result<()> {
        std::fs::write(path, self.render()).map_err(|e| crate::HarvestError::io(path, e))
    }
}
