//! # ratebook-api: Axum HTTP Surface
//!
//! ## API Surface
//!
//! | Prefix                 | Module                  | Domain               |
//! |------------------------|-------------------------|----------------------|
//! | `/v1/rulesets/*`       | [`routes::rulesets`]    | RuleSet lifecycle    |
//! | `/v1/quotes/*`         | [`routes::quotes`]      | Evaluation, versions |
//! | `/health/*`            | [`routes::health`]      | Probes, counters     |
//! | `/openapi.json`        | [`openapi`]             | OpenAPI 3.1 document |
//!
//! Every `/v1` route is scoped to the firm named by the `x-firm-id` header.
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → Handler
//! ```

pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::middleware::from_fn;
use axum::Router;

use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

/// Assemble the full application router with a fresh set of counters.
pub fn app(state: AppState) -> Router {
    app_with_metrics(state, ApiMetrics::new())
}

/// Assemble the router around caller-owned counters.
pub fn app_with_metrics(state: AppState, metrics: ApiMetrics) -> Router {
    Router::new()
        .merge(routes::rulesets::router())
        .merge(routes::quotes::router())
        .merge(routes::health::router())
        .merge(openapi::router())
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(middleware::tracing_layer::layer())
        .layer(axum::Extension(metrics))
        .with_state(state)
}
