use std::sync::Arc;

use crate::coordinator::{HealthReport, RequestCoordinator};
use crate::models::SearchResult;
use crate::{Config, Result};

pub async fn handle_search(config: Arc<Config>, term: &str, debug: bool) -> Result<SearchResult> {
    let coordinator = RequestCoordinator::with_chromium(config)?;
    coordinator.search(term, debug).await
}

pub async fn handle_health(config: Arc<Config>) -> Result<HealthReport> {
    let coordinator = RequestCoordinator::with_chromium(config)?;
    coordinator.health_check().await
}

pub async fn handle_serve(config: Arc<Config>, host: Option<String>) -> Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = config.server.port;
    let coordinator = Arc::new(RequestCoordinator::with_chromium(config)?);

    crate::server::HttpServer::new(host, port, coordinator)
        .run()
        .await
}
