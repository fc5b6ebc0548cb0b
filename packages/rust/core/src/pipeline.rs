//! End-to-end crawl: root URL → site title → sitemap → one Markdown file per page.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{error, info, instrument, warn};
use url::Url;

use mdharvest_crawler::{AssetFetcher, Renderer};
use mdharvest_discovery::DiscoveryOptions;
use mdharvest_shared::{HarvestConfig, HarvestError, PageJob, Result};

use crate::page::PageConverter;
use crate::paths::{DEFAULT_SITE_TITLE, category_for, filename_for, sanitize_folder_name};

/// Result of a completed crawl.
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    /// Pages listed in the sitemap.
    pub pages_total: usize,
    /// Markdown files written, placeholders included.
    pub pages_written: usize,
    /// Pages that failed to convert or could not be written.
    pub pages_failed: usize,
    pub images_downloaded: usize,
    pub images_failed: usize,
    /// `{output_root}/{site-folder}`.
    pub output_dir: PathBuf,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Progress callback for reporting crawl status.
pub trait ProgressReporter {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a page is loaded.
    fn page_started(&self, url: &str, current: usize, total: usize);
    /// Called once a page's file has been written (or writing failed).
    fn page_finished(&self, path: &Path, current: usize, total: usize, failed: bool);
    /// Called when the crawl completes.
    fn done(&self, summary: &CrawlSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_started(&self, _url: &str, _current: usize, _total: usize) {}
    fn page_finished(&self, _path: &Path, _current: usize, _total: usize, _failed: bool) {}
    fn done(&self, _summary: &CrawlSummary) {}
}

/// Run the full crawl with `renderer`.
///
/// 1. Detect the site title on the root page (output folder name)
/// 2. Fetch the sitemap
/// 3. Convert each listed page in order, writing `{category}/{filename}.md`
///
/// The renderer is closed exactly once, whether the crawl succeeds or not.
/// Only an unusable sitemap (or output root) is an error; page and image
/// failures are counted in the summary.
#[instrument(skip_all, fields(root = %config.root_url))]
pub async fn harvest<R: Renderer>(
    config: &HarvestConfig,
    mut renderer: R,
    progress: &dyn ProgressReporter,
) -> Result<CrawlSummary> {
    renderer.set_viewport(config.viewport);

    let result = crawl(config, &mut renderer, progress).await;

    if let Err(e) = renderer.close().await {
        warn!(error = %e, "failed to close renderer");
    }

    result
}

async fn crawl<R: Renderer>(
    config: &HarvestConfig,
    renderer: &mut R,
    progress: &dyn ProgressReporter,
) -> Result<CrawlSummary> {
    let start = Instant::now();
    let timeout = Duration::from_secs(config.request_timeout_secs);

    info!(url = %config.root_url, "starting crawl");

    // --- Phase 1: Site title ---
    progress.phase("Detecting site title");
    let site_title = detect_site_title(renderer, &config.root_url, timeout).await;
    let folder = sanitize_folder_name(&site_title);
    let output_dir = config.output_root.join(&folder);

    info!(site_title = %site_title, folder = %folder, "site title detected");

    std::fs::create_dir_all(&output_dir).map_err(|e| HarvestError::io(&output_dir, e))?;

    // --- Phase 2: Sitemap ---
    progress.phase("Fetching sitemap");
    let opts = DiscoveryOptions {
        timeout_secs: config.request_timeout_secs,
        ..Default::default()
    };
    let urls = mdharvest_discovery::fetch_sitemap(&config.sitemap_url(), &opts).await?;
    let total = urls.len();

    info!(pages = total, "found pages to process");

    // --- Phase 3: Pages ---
    progress.phase("Converting pages");
    let converter = PageConverter::new(AssetFetcher::new(config.request_timeout_secs)?, timeout);

    let mut summary = CrawlSummary {
        pages_total: total,
        pages_written: 0,
        pages_failed: 0,
        images_downloaded: 0,
        images_failed: 0,
        output_dir: output_dir.clone(),
        elapsed: Duration::ZERO,
    };

    for (i, url) in urls.iter().enumerate() {
        let sequence_number = i + 1;
        progress.page_started(url, sequence_number, total);
        info!(current = sequence_number, total, %url, "processing page");

        let category_dir = output_dir.join(category_for(url));
        let md_path = category_dir.join(format!("{}.md", filename_for(url)));

        if let Err(e) = std::fs::create_dir_all(&category_dir) {
            error!(path = %category_dir.display(), error = %e, "failed to create category directory");
            summary.pages_failed += 1;
            progress.page_finished(&md_path, sequence_number, total, true);
            continue;
        }

        let job = PageJob::new(url.as_str(), sequence_number, &category_dir);
        let outcome = converter.convert(renderer, &job).await;

        summary.images_downloaded += outcome.images_downloaded;
        summary.images_failed += outcome.images_failed;

        let mut failed = outcome.failed;
        match outcome.document.write_to(&md_path) {
            Ok(()) => {
                summary.pages_written += 1;
                info!(%url, path = %md_path.display(), "saved markdown");
            }
            Err(e) => {
                error!(%url, error = %e, "failed to write markdown");
                failed = true;
            }
        }

        if failed {
            summary.pages_failed += 1;
        }
        progress.page_finished(&md_path, sequence_number, total, failed);
    }

    summary.elapsed = start.elapsed();

    let absolute =
        std::path::absolute(&summary.output_dir).unwrap_or_else(|_| summary.output_dir.clone());
    info!(
        pages_written = summary.pages_written,
        pages_failed = summary.pages_failed,
        images_downloaded = summary.images_downloaded,
        images_failed = summary.images_failed,
        elapsed_ms = summary.elapsed.as_millis(),
        output = %absolute.display(),
        "conversion complete"
    );

    progress.done(&summary);
    Ok(summary)
}

/// Site name from the root page, or [`DEFAULT_SITE_TITLE`] when navigation
/// fails or the page offers none.
async fn detect_site_title<R: Renderer>(renderer: &mut R, root: &Url, timeout: Duration) -> String {
    let title = match tokio::time::timeout(timeout, renderer.navigate(root)).await {
        Ok(Ok(page)) => page.site_title(),
        Ok(Err(e)) => {
            warn!(error = %e, "failed to load root page for site title");
            None
        }
        Err(_) => {
            warn!(timeout = ?timeout, "root page timed out while detecting site title");
            None
        }
    };

    title.unwrap_or_else(|| DEFAULT_SITE_TITLE.to_string())
}
