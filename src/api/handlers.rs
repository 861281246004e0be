//! HTTP API handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use crate::composite::{CompositeBuilder, LayerParams, LayerRequest};
use crate::engine::ImageryBackend;
use crate::error::LayerError;
use crate::metrics;

/// Landing page with the map client.
const INDEX_HTML: &str = include_str!("../../templates/index.html");

/// Application state shared with handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Whether Earth Engine authenticated at startup. Never changes afterwards.
    engine_ready: bool,
    /// Layer builder over the configured backend.
    builder: CompositeBuilder,
}

impl AppState {
    /// Create app state around a backend and its startup readiness.
    pub fn new(
        backend: Arc<dyn ImageryBackend>,
        engine_ready: bool,
        cloud_cover_ceiling: f64,
    ) -> Self {
        Self {
            engine_ready,
            builder: CompositeBuilder::new(backend, cloud_cover_ceiling),
        }
    }

    /// Check if the engine is ready.
    pub fn is_ready(&self) -> bool {
        self.engine_ready
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
    /// Human readable status.
    pub message: &'static str,
    /// Whether Earth Engine authenticated at startup.
    pub ee_initialized: bool,
    /// Service is reachable without user credentials.
    pub public_access: bool,
}

/// Error body for failed layer requests.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Stable error label.
    pub error: &'static str,
    /// Additional detail safe to show to callers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Image count, for the empty-collection case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl IntoResponse for LayerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            LayerError::ServiceUnavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "Earth Engine not initialized",
                    message: Some("Service account credentials not configured".to_string()),
                    count: None,
                },
            ),
            LayerError::NoImagesFound { count } => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error: "No images found for this period",
                    message: None,
                    count: Some(*count),
                },
            ),
            LayerError::InvalidRegion(reason) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "Invalid region",
                    message: Some(reason.clone()),
                    count: None,
                },
            ),
            LayerError::InvalidRequest(reason) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "Invalid request",
                    message: Some(reason.clone()),
                    count: None,
                },
            ),
            LayerError::Processing(source) => {
                // Remote error text stays in the server log.
                error!(error = %source, "Layer processing failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "Error processing request",
                        message: Some(
                            "The imagery service failed to build the layer".to_string(),
                        ),
                        count: None,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Landing page handler.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Health check handler - always returns 200.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        message: "Backend running correctly",
        ee_initialized: state.is_ready(),
        public_access: true,
    })
}

/// Layer handler: builds the bloom composite and returns its tile URL.
pub async fn get_canola_layer(State(state): State<AppState>, body: Bytes) -> Response {
    let _timer = metrics::timer_layer_request();

    let result = async {
        if !state.is_ready() {
            return Err(LayerError::ServiceUnavailable);
        }
        let params = LayerParams::try_from(LayerRequest::from_body(&body)?)?;
        state.builder.build(&params).await
    }
    .await;

    match result {
        Ok(response) => {
            metrics::inc_layer_requests("success");
            Json(response).into_response()
        }
        Err(err) => {
            if !matches!(err, LayerError::Processing(_)) {
                warn!(kind = err.kind(), "Layer request rejected: {}", err);
            }
            metrics::inc_layer_requests(err.kind());
            err.into_response()
        }
    }
}
