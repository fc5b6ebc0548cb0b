//! Page rendering capability and its HTTP-backed implementation.
//!
//! The headless-browser implementation lives in `browser` behind the
//! `browser` feature.

use std::time::Duration;

use mdharvest_shared::{HarvestError, Result, Viewport};
use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use crate::page::RenderedPage;

/// User-Agent string for page requests.
const USER_AGENT: &str = concat!("mdharvest/", env!("CARGO_PKG_VERSION"));

/// Loads pages and hands back a DOM snapshot.
///
/// One renderer is acquired per run, used for every page in sequence and
/// closed exactly once at the end.
#[allow(async_fn_in_trait)]
pub trait Renderer {
    /// Fix the viewport used for every subsequent navigation.
    fn set_viewport(&mut self, viewport: Viewport);

    /// Load `url` and snapshot its DOM once the network is idle.
    async fn navigate(&mut self, url: &Url) -> Result<RenderedPage>;

    /// Release the render resource.
    async fn close(self) -> Result<()>;
}

/// [`Renderer`] over a single reused HTTP client.
///
/// The response body is the snapshot; scripts are not executed, so the
/// viewport has no effect on what is returned.
pub struct HttpRenderer {
    client: Client,
    pages_loaded: usize,
}

impl HttpRenderer {
    /// Create a renderer whose navigations expire after `timeout_secs`.
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| HarvestError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            pages_loaded: 0,
        })
    }
}

impl Renderer for HttpRenderer {
    fn set_viewport(&mut self, viewport: Viewport) {
        debug!(
            width = viewport.width,
            height = viewport.height,
            "viewport ignored: pages are fetched without layout"
        );
    }

    #[instrument(skip(self), fields(url = %url))]
    async fn navigate(&mut self, url: &Url) -> Result<RenderedPage> {
        debug!("loading page");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| HarvestError::Render(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Render(format!("{url}: HTTP {status}")));
        }

        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| HarvestError::Render(format!("{url}: failed to read body: {e}")))?;

        self.pages_loaded += 1;
        debug!(bytes = html.len(), final_url = %final_url, "page loaded");

        Ok(RenderedPage::new(final_url, &html))
    }

    async fn close(self) -> Result<()> {
        info!(pages = self.pages_loaded, "renderer closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn navigate_returns_snapshot() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/main/guide/intro"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(
                "<html><head><title>Intro | Docs</title></head><body><main><h1>Intro</h1></main></body></html>",
            ))
            .mount(&server)
            .await;

        let mut renderer = HttpRenderer::new(10).unwrap();
        renderer.set_viewport(Viewport { width: 1024, height: 768 });

        let url = Url::parse(&format!("{}/main/guide/intro", server.uri())).unwrap();
        let page = renderer.navigate(&url).await.unwrap();

        assert_eq!(page.url(), &url);
        assert_eq!(page.first_h1().as_deref(), Some("Intro"));
        assert_eq!(page.site_title().as_deref(), Some("Intro"));

        renderer.close().await.unwrap();
    }

    #[tokio::test]
    async fn navigate_reports_final_url_after_redirect() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/old"))
            .respond_with(
                wiremock::ResponseTemplate::new(301)
                    .insert_header("Location", format!("{}/new/page", server.uri())),
            )
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::path("/new/page"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("<html><body>moved</body></html>"))
            .mount(&server)
            .await;

        let mut renderer = HttpRenderer::new(10).unwrap();
        let url = Url::parse(&format!("{}/old", server.uri())).unwrap();
        let page = renderer.navigate(&url).await.unwrap();

        assert_eq!(page.url().path(), "/new/page");
    }

    #[tokio::test]
    async fn navigate_error_status_is_render_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/broken"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut renderer = HttpRenderer::new(10).unwrap();
        let url = Url::parse(&format!("{}/broken", server.uri())).unwrap();
        let err = renderer.navigate(&url).await.unwrap_err();

        assert!(matches!(err, HarvestError::Render(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn navigate_times_out() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/slow"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string("<html></html>")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let mut renderer = HttpRenderer::new(1).unwrap();
        let url = Url::parse(&format!("{}/slow", server.uri())).unwrap();

        assert!(renderer.navigate(&url).await.is_err());
    }
}
