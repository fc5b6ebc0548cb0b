//! Headless Chromium [`Renderer`].
//!
//! Pages are loaded in one reused tab. Scripts run, and the snapshot is taken
//! once the page has stopped requesting resources, so lazily inserted
//! content and images are part of the DOM that gets converted.

use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use mdharvest_shared::{HarvestError, Result, Viewport};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::page::RenderedPage;
use crate::render::Renderer;

/// Upper bound on the network-idle wait after each navigation.
const MAX_IDLE_WAIT: Duration = Duration::from_secs(10);

/// Resolves once the document is complete and no new resource entry has
/// appeared for 500 ms.
const NETWORK_IDLE_SCRIPT: &str = r#"
    new Promise((resolve) => {
        let seen = performance.getEntriesByType('resource').length;
        let quietSince = Date.now();
        const tick = () => {
            const count = performance.getEntriesByType('resource').length;
            if (count !== seen) {
                seen = count;
                quietSince = Date.now();
            }
            if (document.readyState === 'complete' && Date.now() - quietSince >= 500) {
                resolve(count);
            } else {
                setTimeout(tick, 100);
            }
        };
        tick();
    })
"#;

/// [`Renderer`] driving a locally launched headless Chromium.
pub struct BrowserRenderer {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Page,
    /// Applied on the next navigation.
    pending_viewport: Option<Viewport>,
    idle_timeout: Duration,
    pages_loaded: usize,
}

impl BrowserRenderer {
    /// Launch Chromium and open the tab every navigation reuses.
    ///
    /// Fails when no Chromium binary can be found or started.
    pub async fn launch(timeout_secs: u64) -> Result<Self> {
        let config = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .build()
            .map_err(|e| HarvestError::Render(format!("invalid browser config: {e}")))?;

        let (mut browser, mut events) = Browser::launch(config)
            .await
            .map_err(|e| HarvestError::Render(format!("failed to launch browser: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close) = browser.close().await {
                    warn!(error = %close, "could not close browser");
                }
                handler.abort();
                return Err(HarvestError::Render(format!("failed to open a tab: {e}")));
            }
        };

        info!("headless browser launched");
        Ok(Self {
            browser,
            handler,
            page,
            pending_viewport: None,
            idle_timeout: Duration::from_secs(timeout_secs).min(MAX_IDLE_WAIT),
            pages_loaded: 0,
        })
    }

    async fn apply_viewport(&mut self, url: &Url) -> Result<()> {
        let Some(viewport) = self.pending_viewport.take() else {
            return Ok(());
        };

        let metrics = SetDeviceMetricsOverrideParams::new(
            i64::from(viewport.width),
            i64::from(viewport.height),
            1.0,
            false,
        );
        self.page
            .execute(metrics)
            .await
            .map_err(cdp_error(url, "failed to set viewport"))?;

        debug!(width = viewport.width, height = viewport.height, "viewport applied");
        Ok(())
    }

    /// Wait for the network to go quiet. Running out of time is not an
    /// error: the DOM is snapshotted as it stands.
    async fn wait_for_network_idle(&self) {
        match tokio::time::timeout(
            self.idle_timeout,
            self.page.evaluate(NETWORK_IDLE_SCRIPT.to_string()),
        )
        .await
        {
            Ok(Ok(_)) => debug!("network idle"),
            Ok(Err(e)) => debug!(error = %e, "could not wait for network idle"),
            Err(_) => warn!(after = ?self.idle_timeout, "network still busy, taking snapshot anyway"),
        }
    }
}

fn cdp_error<'a>(url: &'a Url, what: &'a str) -> impl FnOnce(CdpError) -> HarvestError + 'a {
    move |e| HarvestError::Render(format!("{url}: {what}: {e}"))
}

impl Renderer for BrowserRenderer {
    fn set_viewport(&mut self, viewport: Viewport) {
        debug!(width = viewport.width, height = viewport.height, "viewport set");
        self.pending_viewport = Some(viewport);
    }

    #[instrument(skip(self), fields(url = %url))]
    async fn navigate(&mut self, url: &Url) -> Result<RenderedPage> {
        self.apply_viewport(url).await?;

        debug!("loading page");
        self.page
            .goto(url.as_str())
            .await
            .map_err(cdp_error(url, "navigation failed"))?;

        self.wait_for_network_idle().await;

        let final_url = self
            .page
            .url()
            .await
            .map_err(cdp_error(url, "failed to read final URL"))?
            .and_then(|current| Url::parse(&current).ok())
            .unwrap_or_else(|| url.clone());
        let html = self
            .page
            .content()
            .await
            .map_err(cdp_error(url, "failed to read DOM"))?;

        self.pages_loaded += 1;
        debug!(bytes = html.len(), final_url = %final_url, "page rendered");

        Ok(RenderedPage::new(final_url, &html))
    }

    async fn close(mut self) -> Result<()> {
        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "browser process did not exit cleanly");
        }
        self.handler.abort();

        info!(pages = self.pages_loaded, "browser closed");
        closed
            .map(|_| ())
            .map_err(|e| HarvestError::Render(format!("failed to close browser: {e}")))
    }
}
