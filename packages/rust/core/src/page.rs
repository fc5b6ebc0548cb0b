//! Conversion of a single page into a Markdown document.

use std::time::Duration;

use tracing::{debug, instrument, warn};
use url::Url;

use mdharvest_crawler::{
    AssetFetcher, DomSanitizer, Renderer, extension_for, local_filename_for, resolve_images,
};
use mdharvest_shared::{
    HarvestError, ImageCandidate, MarkdownDocument, PageJob, Result, UNTITLED_PAGE,
};

/// What converting one page produced.
#[derive(Debug, Clone)]
pub struct PageOutcome {
    /// The document to write; a placeholder when `failed` is set.
    pub document: MarkdownDocument,
    pub images_downloaded: usize,
    pub images_failed: usize,
    /// Whether conversion failed and `document` is the error placeholder.
    pub failed: bool,
}

#[derive(Debug, Default)]
struct ImageStats {
    downloaded: usize,
    failed: usize,
}

/// Runs sanitize → title → images → convert → rewrite for one [`PageJob`].
pub struct PageConverter {
    sanitizer: DomSanitizer,
    fetcher: AssetFetcher,
    navigation_timeout: Duration,
}

impl PageConverter {
    /// A converter using the default chrome selectors.
    pub fn new(fetcher: AssetFetcher, navigation_timeout: Duration) -> Self {
        Self {
            sanitizer: DomSanitizer::default(),
            fetcher,
            navigation_timeout,
        }
    }

    /// Replace the chrome selectors.
    pub fn with_sanitizer(mut self, sanitizer: DomSanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Convert `job`, never failing: any error becomes a placeholder document.
    #[instrument(skip_all, fields(url = %job.url, seq = job.sequence_number))]
    pub async fn convert<R: Renderer>(&self, renderer: &mut R, job: &PageJob) -> PageOutcome {
        let mut stats = ImageStats::default();

        match self.try_convert(renderer, job, &mut stats).await {
            Ok(document) => PageOutcome {
                document,
                images_downloaded: stats.downloaded,
                images_failed: stats.failed,
                failed: false,
            },
            Err(e) => {
                warn!(error = %e, "failed to extract markdown");
                PageOutcome {
                    document: MarkdownDocument::error(&job.url, &e.to_string()),
                    images_downloaded: stats.downloaded,
                    images_failed: stats.failed,
                    failed: true,
                }
            }
        }
    }

    async fn try_convert<R: Renderer>(
        &self,
        renderer: &mut R,
        job: &PageJob,
        stats: &mut ImageStats,
    ) -> Result<MarkdownDocument> {
        let url = Url::parse(&job.url)
            .map_err(|e| HarvestError::Render(format!("{}: invalid URL: {e}", job.url)))?;

        let mut page = tokio::time::timeout(self.navigation_timeout, renderer.navigate(&url))
            .await
            .map_err(|_| {
                HarvestError::Render(format!(
                    "{url}: navigation timed out after {:?}",
                    self.navigation_timeout
                ))
            })??;

        self.sanitizer.sanitize(&mut page);

        // Everything the DOM can tell us is read before the first download.
        let title = page.first_h1().unwrap_or_else(|| UNTITLED_PAGE.to_string());
        let mut candidates = resolve_images(&page);
        let content_html = page.content_html();
        let page_url = page.url().clone();
        drop(page);

        self.download_images(job, &mut candidates, stats).await?;

        let body = mdharvest_markdown::convert(&content_html, Some(&page_url))?;
        let body = mdharvest_markdown::rewrite(&body, &candidates);

        debug!(title = %title, body_len = body.len(), "page converted");
        Ok(MarkdownDocument::new(title, body))
    }

    /// Download every resolvable candidate into the job's `images/` directory.
    ///
    /// Per-image failures are counted and logged; only failing to create the
    /// directory is an error.
    async fn download_images(
        &self,
        job: &PageJob,
        candidates: &mut [ImageCandidate],
        stats: &mut ImageStats,
    ) -> Result<()> {
        if candidates.iter().all(|c| c.resolved_url.is_none()) {
            return Ok(());
        }

        let images_dir = job.images_dir();
        tokio::fs::create_dir_all(&images_dir)
            .await
            .map_err(|e| HarvestError::io(&images_dir, e))?;

        for candidate in candidates.iter_mut() {
            let Some(remote) = candidate.resolved_url.clone() else {
                continue;
            };

            let filename =
                local_filename_for(job.sequence_number, candidate.index, extension_for(&remote));

            match self.fetcher.fetch(&remote, &images_dir.join(&filename)).await {
                Ok(_) => {
                    debug!(remote = %remote, local = %filename, "image saved");
                    candidate.mark_downloaded(filename);
                    stats.downloaded += 1;
                }
                Err(e) => {
                    warn!(remote = %remote, error = %e, "failed to download image");
                    stats.failed += 1;
                }
            }
        }

        Ok(())
    }
}
