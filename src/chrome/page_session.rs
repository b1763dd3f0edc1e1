use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use super::{RenderingBackend, RenderingContext};
use crate::config::{BrowserConfig, SiteConfig};
use crate::extraction::ArtifactSource;
use crate::js_templates;
use crate::lifecycle::{RequestState, RequestTrace};
use crate::models::{PageArtifact, SearchQuery};
use crate::timeouts::{MAX_SCROLL_TICKS, SCROLL_STEP_PX, ms, secs};
use crate::{Result, ScoutError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct PageGeometry {
    pub y: f64,
    pub height: f64,
    pub viewport: f64,
}

impl PageGeometry {
    pub fn at_bottom(&self) -> bool {
        self.y >= self.height - self.viewport
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollReport {
    pub ticks: u32,
    pub final_height: f64,
    pub capped: bool,
}

/// One rendering context, driven through a single search request.
pub struct PageSession {
    context: Box<dyn RenderingContext>,
    site: SiteConfig,
    trace: Arc<RequestTrace>,
}

impl PageSession {
    pub async fn open(
        backend: &dyn RenderingBackend,
        browser: &BrowserConfig,
        site: SiteConfig,
        trace: Arc<RequestTrace>,
    ) -> Result<Self> {
        let context = backend.open_context(browser).await.map_err(|e| match e {
            ScoutError::ContextAcquisition(_) => e,
            other => ScoutError::ContextAcquisition(other.to_string()),
        })?;

        trace.transition(RequestState::SessionOpen);
        tracing::debug!(request_id = %trace.request_id(), "Rendering context opened");

        Ok(Self {
            context,
            site,
            trace,
        })
    }

    pub fn trace(&self) -> &Arc<RequestTrace> {
        &self.trace
    }

    /// Loads the search page for `query`. Slow pages are tolerated; protocol failures are not.
    pub async fn navigate(&self, query: &SearchQuery) -> Result<Url> {
        let url = self.site.search_url(query.term())?;
        let timeout = Duration::from_secs(self.site.navigation_timeout_seconds);
        let deadline = Instant::now() + timeout;

        tracing::info!(request_id = %self.trace.request_id(), url = %url, "Navigating");

        let navigated = tokio::time::timeout(timeout, self.context.navigate(url.as_str()))
            .await
            .unwrap_or(Err(ScoutError::NavigationTimeout(
                self.site.navigation_timeout_seconds,
            )));

        match navigated {
            Ok(()) => self.wait_for_network_idle(deadline).await,
            Err(e) if e.is_tolerated() => {
                tracing::warn!(url = %url, error = %e, "Continuing with partially loaded page");
            }
            Err(e) => return Err(e),
        }

        self.trace.transition(RequestState::Navigated);
        Ok(url)
    }

    async fn wait_for_network_idle(&self, deadline: Instant) {
        let waited = tokio::time::timeout_at(deadline, async {
            loop {
                if let Ok(Ok(state)) = tokio::time::timeout(
                    Duration::from_secs(secs::READY_STATE),
                    self.context.evaluate(js_templates::READY_STATE),
                )
                .await
                    && state.as_str() == Some("complete")
                {
                    tokio::time::sleep(Duration::from_millis(ms::NETWORK_IDLE)).await;
                    return;
                }
                tokio::time::sleep(Duration::from_millis(ms::POLL_INTERVAL)).await;
            }
        })
        .await;

        if waited.is_err() {
            tracing::warn!(
                error = %ScoutError::NavigationTimeout(self.site.navigation_timeout_seconds),
                "Page never reached readyState=complete"
            );
        }
    }

    /// Clicks the first visible consent control within the probe window. Never fails the request.
    pub async fn dismiss_consent_banner(&self) -> Option<String> {
        let deadline = Instant::now() + Duration::from_millis(self.site.consent_timeout_ms);

        loop {
            for selector in &self.site.consent_selectors {
                match self
                    .context
                    .evaluate(&js_templates::click_if_visible(selector))
                    .await
                {
                    Ok(value) if value.as_bool() == Some(true) => {
                        tracing::info!(selector = %selector, "Dismissed consent banner");
                        tokio::time::sleep(Duration::from_millis(ms::CONSENT_SETTLE)).await;
                        self.trace.transition(RequestState::ConsentHandled);
                        return Some(selector.clone());
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(selector = %selector, error = %e, "Consent probe failed");
                    }
                }
            }

            if Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(ms::POLL_INTERVAL)).await;
        }

        tracing::debug!("No consent banner found");
        self.trace.transition(RequestState::ConsentAbsent);
        None
    }

    /// Scrolls in fixed steps until the viewport reaches the end of the document.
    pub async fn trigger_lazy_load(&self) -> ScrollReport {
        let mut report = ScrollReport::default();

        loop {
            let geometry = match self.geometry().await {
                Ok(geometry) => geometry,
                Err(e) => {
                    tracing::warn!(error = %e, ticks = report.ticks, "Could not read page geometry, stopping scroll");
                    break;
                }
            };
            report.final_height = geometry.height;

            if geometry.at_bottom() {
                break;
            }
            if report.ticks >= MAX_SCROLL_TICKS {
                tracing::warn!(ticks = report.ticks, height = geometry.height, "Scroll tick limit reached");
                report.capped = true;
                break;
            }

            if let Err(e) = self
                .context
                .evaluate(&js_templates::scroll_by(SCROLL_STEP_PX))
                .await
            {
                tracing::warn!(error = %e, "Scroll step failed, stopping scroll");
                break;
            }
            report.ticks += 1;
            tokio::time::sleep(Duration::from_millis(ms::SCROLL_INTERVAL)).await;
        }

        tracing::debug!(ticks = report.ticks, height = report.final_height, "Lazy loading triggered");
        self.trace.transition(RequestState::Scrolled);
        report
    }

    async fn geometry(&self) -> Result<PageGeometry> {
        let value = self.context.evaluate(js_templates::PAGE_GEOMETRY).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn capture(&self, include_image: bool) -> Result<PageArtifact> {
        let markup = self.context.content().await?;
        let image = if include_image {
            Some(self.context.screenshot_full_page().await?)
        } else {
            None
        };
        tracing::debug!(
            markup_bytes = markup.len(),
            image_bytes = image.as_ref().map(Vec::len).unwrap_or(0),
            "Page captured"
        );
        Ok(PageArtifact::new(markup, image))
    }

    /// Releases the rendering context. Consumes the session so it can only happen once.
    pub async fn close(mut self) -> Result<()> {
        let result = self.context.close().await;
        self.trace.mark_context_closed();
        tracing::debug!(request_id = %self.trace.request_id(), "Rendering context closed");
        result
    }
}

#[async_trait::async_trait]
impl ArtifactSource for PageSession {
    async fn capture(&self, include_image: bool) -> Result<PageArtifact> {
        PageSession::capture(self, include_image).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct ScriptedPage {
        consent_visible: bool,
        document_height: f64,
        scroll_y: Mutex<f64>,
        scrolls: AtomicUsize,
        clicks: AtomicUsize,
        closes: AtomicUsize,
        fail_navigation: bool,
    }

    #[async_trait::async_trait]
    impl RenderingContext for Arc<ScriptedPage> {
        async fn navigate(&self, _url: &str) -> Result<()> {
            if self.fail_navigation {
                return Err(ScoutError::Protocol("net::ERR_NAME_NOT_RESOLVED".into()));
            }
            Ok(())
        }

        async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
            if script == js_templates::READY_STATE {
                return Ok(json!("complete"));
            }
            if script == js_templates::PAGE_GEOMETRY {
                let y = *self.scroll_y.lock().unwrap();
                return Ok(json!({ "y": y, "height": self.document_height, "viewport": 800.0 }));
            }
            if script.starts_with("window.scrollBy") {
                self.scrolls.fetch_add(1, Ordering::SeqCst);
                *self.scroll_y.lock().unwrap() += SCROLL_STEP_PX as f64;
                return Ok(serde_json::Value::Null);
            }
            if script.contains("el.click()") {
                let hit = self.consent_visible && script.contains("onetrust");
                if hit {
                    self.clicks.fetch_add(1, Ordering::SeqCst);
                }
                return Ok(json!(hit));
            }
            Ok(serde_json::Value::Null)
        }

        async fn content(&self) -> Result<String> {
            Ok("<html><body>R 10</body></html>".into())
        }

        async fn screenshot_full_page(&self) -> Result<Vec<u8>> {
            Ok(vec![1, 2, 3])
        }

        async fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn session(page: &Arc<ScriptedPage>) -> PageSession {
        let trace = Arc::new(RequestTrace::new());
        trace.transition(RequestState::SessionOpen);
        PageSession {
            context: Box::new(Arc::clone(page)),
            site: SiteConfig {
                consent_timeout_ms: 0,
                consent_selectors: vec!["#onetrust-accept-btn-handler".into()],
                ..SiteConfig::default()
            },
            trace,
        }
    }

    fn query() -> SearchQuery {
        SearchQuery::new("air fryer", false).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigate_builds_escaped_url() {
        let page = Arc::new(ScriptedPage::default());
        let session = session(&page);
        let url = session.navigate(&query()).await.unwrap();
        assert_eq!(url.as_str(), "https://www.takealot.com/all?qsearch=air+fryer");
        assert_eq!(session.trace().current(), RequestState::Navigated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigate_protocol_failure_is_fatal() {
        let page = Arc::new(ScriptedPage {
            fail_navigation: true,
            ..Default::default()
        });
        let err = session(&page).navigate(&query()).await.unwrap_err();
        assert!(matches!(err, ScoutError::Protocol(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_consent_clicked_when_visible() {
        let page = Arc::new(ScriptedPage {
            consent_visible: true,
            ..Default::default()
        });
        let session = session(&page);
        let selector = session.dismiss_consent_banner().await;
        assert_eq!(selector.as_deref(), Some("#onetrust-accept-btn-handler"));
        assert_eq!(page.clicks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consent_absent_is_not_an_error() {
        let page = Arc::new(ScriptedPage::default());
        let session = session(&page);
        assert!(session.dismiss_consent_banner().await.is_none());
        assert_eq!(page.clicks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_reaches_bottom() {
        let page = Arc::new(ScriptedPage {
            document_height: 1800.0,
            ..Default::default()
        });
        let report = session(&page).trigger_lazy_load().await;
        assert_eq!(report.ticks, 10);
        assert!(!report.capped);
        assert_eq!(page.scrolls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_page_needs_no_scroll() {
        let page = Arc::new(ScriptedPage {
            document_height: 600.0,
            ..Default::default()
        });
        let report = session(&page).trigger_lazy_load().await;
        assert_eq!(report.ticks, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_marks_trace() {
        let page = Arc::new(ScriptedPage::default());
        let session = session(&page);
        let trace = Arc::clone(session.trace());
        session.close().await.unwrap();
        assert!(trace.context_closed());
        assert_eq!(page.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_geometry_at_bottom() {
        let geometry = PageGeometry {
            y: 1000.0,
            height: 1800.0,
            viewport: 800.0,
        };
        assert!(geometry.at_bottom());
        assert!(!PageGeometry { y: 999.0, ..geometry }.at_bottom());
    }
}
