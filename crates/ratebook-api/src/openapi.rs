//! # OpenAPI Document Assembly
//!
//! Assembles the utoipa-documented routes into one OpenAPI 3.1 document
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI document for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Ratebook API",
        version = "0.1.0",
        description = "Pricing rule lifecycle, deterministic quote evaluation, and reproducible quote versions.",
        license(name = "AGPL-3.0-or-later")
    ),
    paths(
        // RuleSets
        crate::routes::rulesets::create_ruleset,
        crate::routes::rulesets::list_rulesets,
        crate::routes::rulesets::get_ruleset,
        crate::routes::rulesets::update_ruleset,
        crate::routes::rulesets::publish_ruleset,
        crate::routes::rulesets::deprecate_ruleset,
        // Quotes
        crate::routes::quotes::evaluate,
        crate::routes::quotes::create_quote,
        crate::routes::quotes::get_quote,
        crate::routes::quotes::add_version,
        crate::routes::quotes::get_version,
        crate::routes::quotes::reproduce,
        crate::routes::quotes::audit,
        // Health
        crate::routes::health::metrics,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::rulesets::CreateRuleSetRequest,
        crate::routes::rulesets::UpdateRuleSetRequest,
        crate::routes::rulesets::RuleSetResponse,
        crate::routes::quotes::EvaluateRequest,
        crate::routes::quotes::EvaluateResponse,
        crate::routes::quotes::CreateQuoteRequest,
        crate::routes::quotes::QuoteResponse,
        crate::routes::quotes::QuoteVersionResponse,
        crate::routes::quotes::ReproduceResponse,
        crate::routes::quotes::AuditResponse,
        crate::middleware::metrics::MetricsSnapshot,
    )),
    tags(
        (name = "rulesets", description = "RuleSet lifecycle"),
        (name = "quotes", description = "Evaluation, quote versions and reproduction"),
        (name = "health", description = "Probes and counters"),
    )
)]
pub struct ApiDoc;

/// Serves the OpenAPI JSON document at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
