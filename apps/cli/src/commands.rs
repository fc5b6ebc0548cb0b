//! CLI definition, tracing setup and the harvest command.

use std::path::Path;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
#[cfg(feature = "browser")]
use tracing::warn;

use mdharvest_core::{CrawlSummary, ProgressReporter, harvest};
#[cfg(feature = "browser")]
use mdharvest_crawler::BrowserRenderer;
use mdharvest_crawler::HttpRenderer;
use mdharvest_shared::HarvestConfig;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Convert a documentation site listed in its sitemap into Markdown files
/// with locally downloaded images.
#[derive(Parser)]
#[command(name = "mdharvest", long_about = None)]
pub(crate) struct Cli {
    /// Root documentation URL; the sitemap is read from beneath it.
    #[arg(short, long)]
    pub url: Option<String>,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Install the fmt subscriber, honouring `RUST_LOG` when set.
pub(crate) fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mdharvest=info"));

    fmt().with_env_filter(env_filter).with_target(false).init();
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// Run a full harvest for the root URL given on the command line.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config =
        HarvestConfig::from_cli(cli.url.as_deref()).wrap_err("invalid command line")?;

    info!(
        root = %config.root_url,
        output = %config.output_root.display(),
        "starting harvest"
    );

    let progress = CliProgress::new();
    let summary = harvest_with_best_renderer(&config, &progress)
        .await
        .wrap_err_with(|| format!("harvest of {} failed", config.root_url))?;

    print_summary(&summary);
    Ok(())
}

/// Harvest with headless Chromium, or over plain HTTP when no browser can be
/// launched.
#[cfg(feature = "browser")]
async fn harvest_with_best_renderer(
    config: &HarvestConfig,
    progress: &CliProgress,
) -> Result<CrawlSummary> {
    match BrowserRenderer::launch(config.request_timeout_secs).await {
        Ok(renderer) => Ok(harvest(config, renderer, progress).await?),
        Err(e) => {
            warn!(error = %e, "headless browser unavailable, falling back to HTTP; scripts will not run");
            harvest_over_http(config, progress).await
        }
    }
}

#[cfg(not(feature = "browser"))]
async fn harvest_with_best_renderer(
    config: &HarvestConfig,
    progress: &CliProgress,
) -> Result<CrawlSummary> {
    harvest_over_http(config, progress).await
}

async fn harvest_over_http(config: &HarvestConfig, progress: &CliProgress) -> Result<CrawlSummary> {
    let renderer = HttpRenderer::new(config.request_timeout_secs)
        .wrap_err("failed to start renderer")?;
    Ok(harvest(config, renderer, progress).await?)
}

fn print_summary(summary: &CrawlSummary) {
    let absolute = std::path::absolute(&summary.output_dir)
        .unwrap_or_else(|_| summary.output_dir.clone());

    println!();
    println!("  Pages:  {} written, {} failed", summary.pages_written, summary.pages_failed);
    println!(
        "  Images: {} downloaded, {} failed",
        summary.images_downloaded, summary.images_failed
    );
    println!("  Output: {}", absolute.display());
    println!("  Time:   {:.1}s", summary.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Progress bar over the sitemap pages, a spinner until their count is known.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner_style());
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn page_started(&self, url: &str, current: usize, total: usize) {
        if self.bar.length() != Some(total as u64) {
            self.bar.set_style(bar_style());
            self.bar.set_length(total as u64);
        }
        self.bar.set_position(current.saturating_sub(1) as u64);
        self.bar.set_message(url.to_string());
    }

    fn page_finished(&self, path: &Path, current: usize, _total: usize, failed: bool) {
        self.bar.set_position(current as u64);
        if failed {
            self.bar.println(format!("  failed: {}", path.display()));
        }
    }

    fn done(&self, _summary: &CrawlSummary) {
        self.bar.finish_and_clear();
    }
}
