//! HTTP surface of the metrics server.
//!
//! - `POST /update/<type>/<name>/<value>` ingests one point
//! - `GET /value/<type>/<name>` reads one value as plain text
//! - `GET /` renders the HTML dashboard
//! - `GET /health` reports liveness and store size

use crate::core::{format_counter, format_gauge, MetricKind};
use crate::metrics::MetricsBackend;
use crate::server::dashboard::render_dashboard;
use crate::server::path::{self, PathError};
use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, decompression::RequestDecompressionLayer, trace::TraceLayer,
};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Shared state of every handler.
#[derive(Clone)]
pub struct HttpState {
    /// Metric store
    pub storage: Arc<dyn MetricsBackend>,
}

/// Create the router for all metric endpoints.
pub fn create_router(storage: Arc<dyn MetricsBackend>) -> Router {
    let state = HttpState { storage };

    Router::new()
        .route("/", get(dashboard_handler))
        // `/*path` needs a non-empty tail; the bare prefixes carry an empty type
        .route("/update", post(update_handler))
        .route("/update/", post(update_handler))
        .route("/update/*path", post(update_handler))
        .route("/value", get(value_handler))
        .route("/value/", get(value_handler))
        .route("/value/*path", get(value_handler))
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestDecompressionLayer::new())
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

/// Handle `POST /update/<type>/<name>/<value>`.
async fn update_handler(
    State(state): State<HttpState>,
    uri: Uri,
) -> std::result::Result<impl IntoResponse, HttpError> {
    let update = path::parse_update(path_tail(&uri, "/update/"))?;

    state.storage.apply(&update.name, update.value);
    tracing::debug!(
        kind = %update.value.kind(),
        name = %update.name,
        value = %update.value,
        "metric updated"
    );

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, TEXT_PLAIN)]))
}

/// Handle `GET /value/<type>/<name>`.
async fn value_handler(
    State(state): State<HttpState>,
    uri: Uri,
) -> std::result::Result<impl IntoResponse, HttpError> {
    let request = path::parse_value(path_tail(&uri, "/value/"))?;
    let name = request.name.as_str();

    let body = match request.kind {
        MetricKind::Gauge => state.storage.gauge(name).map(format_gauge),
        MetricKind::Counter => state.storage.counter(name).map(format_counter),
    };

    match body {
        Some(body) => Ok((StatusCode::OK, [(header::CONTENT_TYPE, TEXT_PLAIN)], body)),
        None => Err(HttpError::NotFound(format!(
            "{} {} not found",
            request.kind, request.name
        ))),
    }
}

/// Handle `GET /`.
async fn dashboard_handler(
    State(state): State<HttpState>,
) -> std::result::Result<impl IntoResponse, HttpError> {
    // Copies are taken one map at a time; the lock is never held while rendering.
    let gauges = state.storage.list_gauges();
    let counters = state.storage.list_counters();

    let html = render_dashboard(&gauges, &counters).map_err(|e| {
        tracing::error!(error = %e, "dashboard rendering failed");
        HttpError::Internal
    })?;

    Ok(Html(html))
}

/// Health check endpoint.
async fn health_check(State(state): State<HttpState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "pulse-server",
        "version": env!("CARGO_PKG_VERSION"),
        "gauges": state.storage.list_gauges().len(),
        "counters": state.storage.list_counters().len(),
    }))
}

/// Raw path after `prefix`, empty for the bare `/update` and `/value` routes.
fn path_tail<'a>(uri: &'a Uri, prefix: &str) -> &'a str {
    uri.path().strip_prefix(prefix).unwrap_or_default()
}

/// HTTP-specific error type.
#[derive(Debug)]
pub enum HttpError {
    /// 400 with a short reason
    BadRequest(String),
    /// 404 with a short reason
    NotFound(String),
    /// Cause is logged where it happens; clients only see a generic message.
    Internal,
}

impl From<PathError> for HttpError {
    fn from(err: PathError) -> Self {
        if err.status() == StatusCode::NOT_FOUND {
            HttpError::NotFound(err.reason())
        } else {
            HttpError::BadRequest(err.reason())
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            HttpError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            HttpError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            HttpError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };

        (status, [(header::CONTENT_TYPE, TEXT_PLAIN)], message).into_response()
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            HttpError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            HttpError::Internal => write!(f, "Internal Error"),
        }
    }
}

impl std::error::Error for HttpError {}
