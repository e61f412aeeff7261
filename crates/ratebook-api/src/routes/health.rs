//! # Health Probes
//!
//! Mounted outside the tenant-scoped routes so probes need no headers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};

use crate::middleware::metrics::{ApiMetrics, MetricsSnapshot};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/health/metrics", get(metrics))
}

/// Liveness probe. Always 200 while the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. The state is only constructed once the rule schema has
/// compiled, so a reachable handler with a non-empty checker is ready.
async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.registry.checker().supported().next().is_some() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "no schema versions configured")
    }
}

#[utoipa::path(
    get,
    path = "/health/metrics",
    responses((status = 200, description = "Request and divergence counters", body = MetricsSnapshot)),
    tag = "health"
)]
pub(crate) async fn metrics(Extension(metrics): Extension<ApiMetrics>) -> Json<MetricsSnapshot> {
    Json(metrics.snapshot())
}
