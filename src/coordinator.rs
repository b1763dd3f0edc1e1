use chrono::Utc;
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::chrome::{ChromiumBackend, PageSession, RenderingBackend};
use crate::extraction::ExtractionPipeline;
use crate::lifecycle::{RequestState, RequestTrace};
use crate::models::{Diagnostics, ExtractionResult, SearchQuery, SearchResult};
use crate::ocr::{OcrEngine, TesseractOcr};
use crate::stats::StatisticsEngine;
use crate::{Config, Result, ScoutError};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    pub elapsed_ms: u64,
}

/// An open session together with the permit it was opened under.
///
/// Dropping a lease that was never closed (the request future was cancelled) hands the
/// session to a background task that closes it and only then returns the permit.
struct SessionLease {
    session: Option<PageSession>,
    permit: Option<OwnedSemaphorePermit>,
}

impl SessionLease {
    fn new(session: PageSession, permit: OwnedSemaphorePermit) -> Self {
        Self {
            session: Some(session),
            permit: Some(permit),
        }
    }

    fn session(&self) -> &PageSession {
        match &self.session {
            Some(session) => session,
            None => unreachable!("session is only taken by close or drop"),
        }
    }

    async fn close(mut self) -> Result<()> {
        let result = match self.session.take() {
            Some(session) => session.close().await,
            None => Ok(()),
        };
        self.permit.take();
        result
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let permit = self.permit.take();
        let request_id = session.trace().request_id();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(%request_id, "Request cancelled, closing rendering context in background");
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        tracing::warn!(%request_id, error = %e, "Closing rendering context failed");
                    }
                    drop(permit);
                });
            }
            Err(_) => {
                tracing::error!(%request_id, "No runtime left to close rendering context");
            }
        }
    }
}

/// Drives search requests end to end. Each request gets its own rendering context, which is
/// always released before the request finishes.
pub struct RequestCoordinator {
    config: Arc<Config>,
    backend: Arc<dyn RenderingBackend>,
    pipeline: ExtractionPipeline,
    permits: Arc<Semaphore>,
}

impl RequestCoordinator {
    pub fn new(
        config: Arc<Config>,
        backend: Arc<dyn RenderingBackend>,
        ocr: Option<Arc<dyn OcrEngine>>,
    ) -> Result<Self> {
        let pipeline = ExtractionPipeline::from_config(&config.extraction, ocr)?;
        let permits = Arc::new(Semaphore::new(config.server.max_concurrent_sessions.max(1)));

        tracing::debug!(
            strategies = ?pipeline.strategy_kinds(),
            threshold = pipeline.min_confidence(),
            max_sessions = config.server.max_concurrent_sessions,
            "Request coordinator ready"
        );

        Ok(Self {
            config,
            backend,
            pipeline,
            permits,
        })
    }

    /// Chromium rendering with tesseract OCR (when enabled).
    pub fn with_chromium(config: Arc<Config>) -> Result<Self> {
        let ocr: Option<Arc<dyn OcrEngine>> = if config.ocr.enabled {
            Some(Arc::new(TesseractOcr::from_config(&config.ocr)))
        } else {
            None
        };
        Self::new(config, Arc::new(ChromiumBackend::new()), ocr)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn search(&self, term: &str, debug: bool) -> Result<SearchResult> {
        let query = SearchQuery::new(term, debug)?;
        self.run(&query).await
    }

    pub async fn run(&self, query: &SearchQuery) -> Result<SearchResult> {
        let trace = Arc::new(RequestTrace::new());
        let lease = match self.open_session(Arc::clone(&trace)).await {
            Ok(lease) => lease,
            Err(e) => {
                trace.transition(RequestState::Error);
                tracing::error!(request_id = %trace.request_id(), error = %e, "Could not open rendering context");
                return Err(e);
            }
        };

        tracing::info!(request_id = %trace.request_id(), term = %query.term(), "Search started");

        let outcome = AssertUnwindSafe(self.drive(lease.session(), query))
            .catch_unwind()
            .await;

        if let Err(e) = lease.close().await {
            tracing::warn!(request_id = %trace.request_id(), error = %e, "Closing rendering context failed");
        }

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(panic) => {
                trace.transition(RequestState::Error);
                tracing::error!(request_id = %trace.request_id(), "Search panicked, context released");
                std::panic::resume_unwind(panic);
            }
        };

        let (url, extraction) = match outcome {
            Ok(done) => done,
            Err(e) => {
                trace.transition(RequestState::Error);
                tracing::error!(request_id = %trace.request_id(), kind = e.kind(), error = %e, "Search failed");
                return Err(e);
            }
        };

        let stats = StatisticsEngine::compute(&extraction.values);
        trace.transition(RequestState::StatsComputed);
        trace.transition(RequestState::Done);

        tracing::info!(
            request_id = %trace.request_id(),
            strategy = %extraction.strategy,
            prices = stats.count,
            elapsed_ms = trace.elapsed().as_millis() as u64,
            "Search finished"
        );

        let diagnostics = query.debug().then(|| Diagnostics {
            request_id: trace.request_id().to_string(),
            url: url.to_string(),
            strategy: extraction.strategy,
            attempts: extraction.attempts.clone(),
            states: trace.labels(),
            elapsed_ms: trace.elapsed().as_millis() as u64,
        });

        Ok(SearchResult {
            search_term: query.term().to_string(),
            timestamp: Utc::now(),
            extraction,
            stats,
            diagnostics,
        })
    }

    async fn drive(
        &self,
        session: &PageSession,
        query: &SearchQuery,
    ) -> Result<(url::Url, ExtractionResult)> {
        let url = session.navigate(query).await?;
        session.dismiss_consent_banner().await;
        session.trigger_lazy_load().await;

        let extraction = self.pipeline.run(session).await?;
        session
            .trace()
            .transition(RequestState::Extracted(extraction.strategy));

        Ok((url, extraction))
    }

    /// Waits for a free slot, then opens a rendering context in it.
    async fn open_session(&self, trace: Arc<RequestTrace>) -> Result<SessionLease> {
        let wait = Duration::from_secs(self.config.server.session_wait_seconds);
        let permit =
            match tokio::time::timeout(wait, Arc::clone(&self.permits).acquire_owned()).await {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => {
                    return Err(ScoutError::ContextAcquisition(
                        "coordinator is shutting down".into(),
                    ));
                }
                Err(_) => {
                    return Err(ScoutError::ContextAcquisition(format!(
                        "no rendering context became free within {}s",
                        wait.as_secs()
                    )));
                }
            };

        let session = PageSession::open(
            self.backend.as_ref(),
            &self.config.browser,
            self.config.site.clone(),
            trace,
        )
        .await?;

        Ok(SessionLease::new(session, permit))
    }

    /// Opens and immediately closes a rendering context.
    pub async fn health_check(&self) -> Result<HealthReport> {
        let trace = Arc::new(RequestTrace::new());
        self.open_session(Arc::clone(&trace)).await?.close().await?;

        Ok(HealthReport {
            status: "ok".to_string(),
            elapsed_ms: trace.elapsed().as_millis() as u64,
        })
    }
}
