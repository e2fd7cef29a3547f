use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use domains::contracts::HealthBody;
use tracing::{error, warn};

use crate::extract::Json;
use crate::state::AppState;

const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// `GET /health`: 200 when storage answers, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> Response {
    match state.storage.ping().await {
        Ok(()) => Json(HealthBody { status: "ok".into() }).into_response(),
        Err(err) => {
            warn!(error = %err, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(HealthBody { status: "unavailable".into() }))
                .into_response()
        }
    }
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => ([(header::CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)], body).into_response(),
        Err(err) => {
            error!(error = %err, "could not encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
