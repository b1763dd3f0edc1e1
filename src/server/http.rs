use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::ScoutError;
use crate::coordinator::{HealthReport, RequestCoordinator};
use crate::models::{ErrorResponse, SearchResponse};

#[derive(Clone)]
struct AppState {
    coordinator: Arc<RequestCoordinator>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    q: String,
    #[serde(default)]
    debug: bool,
}

/// HTTP form of a [`ScoutError`].
pub struct ApiError(ScoutError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ScoutError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ScoutError::ContextAcquisition(_) => StatusCode::SERVICE_UNAVAILABLE,
            ScoutError::Protocol(_) | ScoutError::RecognitionFailed(_) => StatusCode::BAD_GATEWAY,
            ScoutError::NavigationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ScoutError> for ApiError {
    fn from(err: ScoutError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorResponse::from(&self.0))).into_response()
    }
}

pub struct HttpServer {
    host: String,
    port: u16,
    coordinator: Arc<RequestCoordinator>,
}

impl HttpServer {
    pub fn new(host: impl Into<String>, port: u16, coordinator: Arc<RequestCoordinator>) -> Self {
        Self {
            host: host.into(),
            port,
            coordinator,
        }
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            coordinator: Arc::clone(&self.coordinator),
        };

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/api/search", get(search))
            .route("/api/health", get(health))
            .layer(cors)
            .with_state(state)
    }

    pub async fn run(&self) -> crate::Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("HTTP server listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(crate::utils::shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let result = state.coordinator.search(&params.q, params.debug).await?;
    Ok(Json(SearchResponse::from(&result)))
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthReport>, ApiError> {
    Ok(Json(state.coordinator.health_check().await?))
}
