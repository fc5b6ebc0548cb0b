//! Test doubles shared by the page and pipeline tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mdharvest_crawler::{RenderedPage, Renderer};
use mdharvest_shared::{HarvestError, Result, Viewport};
use url::Url;
use uuid::Uuid;

/// What a [`FixtureRenderer`] saw, observable after it has been moved.
#[derive(Debug, Default)]
pub(crate) struct FixtureState {
    pub(crate) closed: AtomicBool,
    pub(crate) viewport: Mutex<Option<Viewport>>,
    pub(crate) visited: Mutex<Vec<String>>,
}

impl FixtureState {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn viewport(&self) -> Option<Viewport> {
        *self.viewport.lock().unwrap()
    }

    pub(crate) fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }
}

/// Serves canned HTML by URL; unknown URLs fail to navigate.
#[derive(Default)]
pub(crate) struct FixtureRenderer {
    pages: HashMap<String, String>,
    delay: Option<Duration>,
    state: Arc<FixtureState>,
}

impl FixtureRenderer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn state(&self) -> Arc<FixtureState> {
        Arc::clone(&self.state)
    }
}

impl Renderer for FixtureRenderer {
    fn set_viewport(&mut self, viewport: Viewport) {
        *self.state.viewport.lock().unwrap() = Some(viewport);
    }

    async fn navigate(&mut self, url: &Url) -> Result<RenderedPage> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.state.visited.lock().unwrap().push(url.to_string());

        let html = self
            .pages
            .get(url.as_str())
            .ok_or_else(|| HarvestError::Render(format!("{url}: HTTP 404 Not Found")))?;
        Ok(RenderedPage::new(url.clone(), html))
    }

    async fn close(self) -> Result<()> {
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A fresh directory under the system temp dir.
pub(crate) fn temp_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mdh-{label}-test-{}", Uuid::now_v7()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
