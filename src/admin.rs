//! The admin plane: a second axum router, independent of the data plane,
//! exposing health, metrics, and effective-config introspection.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use http::StatusCode;

use crate::config::GatewayConfig;
use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AdminState {
    pub metrics: Arc<Metrics>,
    pub config: Arc<GatewayConfig>,
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics(State(state): State<AdminState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn config(State(state): State<AdminState>) -> impl IntoResponse {
    axum::Json((*state.config).clone())
}

#[must_use]
pub fn router(state: AdminState) -> axum::Router {
    axum::Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/config", get(config))
        .with_state(state)
}
