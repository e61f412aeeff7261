//! # Quote API
//!
//! Pricing against a published RuleSet, quote containers, immutable quote
//! versions, and reproduction of a stored version.
//!
//! A reproduction that diverges is a server-side defect, not a client
//! error: it answers 500 with `match: false` and the diverged fields, is
//! logged at error level, and bumps the divergence counter.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use ratebook_core::{QuoteId, QuoteVersionId, RuleSetId};
use ratebook_engine::{AppliedDiscount, EvaluationResult, LineItem, PricingContext, TraceEntry};
use ratebook_quote::{AuditFailure, AuditReport, Quote, QuoteVersion, ReproductionReport};
use ratebook_state::RuleSet;

use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, Tenant, Validate};
use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

// -- Request DTOs -------------------------------------------------------------

/// Price a context against a published RuleSet.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EvaluateRequest {
    pub ruleset_id: Uuid,
    pub ruleset_version: u32,
    /// `{items: [{code, quantity}], engagement_size?, promo_codes?, currency?}`
    #[schema(value_type = Object)]
    pub context: PricingContext,
}

/// Create a quote container.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateQuoteRequest {
    pub title: String,
}

impl Validate for CreateQuoteRequest {
    fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        Ok(())
    }
}

// -- Response DTOs ------------------------------------------------------------

/// Priced result plus the RuleSet reference it was computed from.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EvaluateResponse {
    pub ruleset_id: Uuid,
    pub ruleset_version: u32,
    pub ruleset_checksum: String,
    #[schema(value_type = Vec<Object>)]
    pub line_items: Vec<LineItem>,
    #[schema(value_type = Vec<Object>)]
    pub quote_discounts: Vec<AppliedDiscount>,
    #[schema(value_type = String)]
    pub base_subtotal: Decimal,
    #[schema(value_type = String)]
    pub subtotal: Decimal,
    #[schema(value_type = String)]
    pub total: Decimal,
    pub currency: String,
    #[schema(value_type = Vec<Object>)]
    pub trace: Vec<TraceEntry>,
}

impl EvaluateResponse {
    fn new(ruleset: &RuleSet, result: EvaluationResult) -> Self {
        Self {
            ruleset_id: *ruleset.id.as_uuid(),
            ruleset_version: ruleset.version,
            ruleset_checksum: ruleset.checksum.to_string(),
            line_items: result.line_items,
            quote_discounts: result.quote_discounts,
            base_subtotal: result.base_subtotal,
            subtotal: result.subtotal,
            total: result.total,
            currency: result.currency.to_string(),
            trace: result.trace,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuoteResponse {
    pub quote_id: Uuid,
    pub title: String,
    pub version_ids: Vec<Uuid>,
    pub created_at: String,
}

impl From<Quote> for QuoteResponse {
    fn from(q: Quote) -> Self {
        Self {
            quote_id: *q.id.as_uuid(),
            title: q.title,
            version_ids: q.version_ids.iter().map(|v| *v.as_uuid()).collect(),
            created_at: q.created_at.to_iso8601(),
        }
    }
}

/// Immutable quote version snapshot.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuoteVersionResponse {
    pub quote_version_id: Uuid,
    pub quote_id: Uuid,
    pub sequence: u32,
    pub ruleset_id: Uuid,
    pub ruleset_version: u32,
    pub ruleset_checksum: String,
    #[schema(value_type = Object)]
    pub input_context_snapshot: PricingContext,
    #[schema(value_type = Object)]
    pub output_snapshot: EvaluationResult,
    #[schema(value_type = Vec<Object>)]
    pub trace_snapshot: Vec<TraceEntry>,
    pub created_at: String,
}

impl From<QuoteVersion> for QuoteVersionResponse {
    fn from(v: QuoteVersion) -> Self {
        Self {
            quote_version_id: *v.id.as_uuid(),
            quote_id: *v.quote_id.as_uuid(),
            sequence: v.sequence,
            ruleset_id: *v.ruleset.ruleset_id.as_uuid(),
            ruleset_version: v.ruleset.ruleset_version,
            ruleset_checksum: v.ruleset.ruleset_checksum.to_string(),
            input_context_snapshot: v.input_context_snapshot,
            output_snapshot: v.output_snapshot,
            trace_snapshot: v.trace_snapshot,
            created_at: v.created_at.to_iso8601(),
        }
    }
}

/// Reproduction outcome.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReproduceResponse {
    pub quote_version_id: Uuid,
    #[serde(rename = "match")]
    pub matched: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diverged_fields: Vec<String>,
}

impl From<ReproductionReport> for ReproduceResponse {
    fn from(r: ReproductionReport) -> Self {
        Self {
            quote_version_id: *r.quote_version_id.as_uuid(),
            matched: r.matched,
            diverged_fields: r.diverged_fields,
        }
    }
}

/// Summary of reproducing every stored version of a firm.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditResponse {
    pub checked: usize,
    pub matched: usize,
    pub diverged: Vec<ReproduceResponse>,
    /// `{quote_version_id, error}` for versions that could not be reproduced.
    #[schema(value_type = Vec<Object>)]
    pub failed: Vec<AuditFailure>,
}

impl From<AuditReport> for AuditResponse {
    fn from(r: AuditReport) -> Self {
        Self {
            checked: r.checked,
            matched: r.matched,
            diverged: r.diverged.into_iter().map(ReproduceResponse::from).collect(),
            failed: r.failed,
        }
    }
}

// -- Router -------------------------------------------------------------------

/// Build the quote router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/quotes/evaluate", post(evaluate))
        .route("/v1/quotes/audit", get(audit))
        .route("/v1/quotes", post(create_quote))
        .route("/v1/quotes/{id}", get(get_quote))
        .route("/v1/quotes/{id}/versions", post(add_version))
        .route("/v1/quotes/versions/{id}", get(get_version))
        .route("/v1/quotes/versions/{id}/reproduce", get(reproduce))
}

/// POST /v1/quotes/evaluate: Price without persisting.
#[utoipa::path(
    post,
    path = "/v1/quotes/evaluate",
    params(("x-firm-id" = Uuid, Header, description = "Tenant firm id")),
    request_body = EvaluateRequest,
    responses(
        (status = 200, description = "Priced result with trace", body = EvaluateResponse),
        (status = 400, description = "Unknown product or unsupported currency", body = crate::error::ErrorBody),
        (status = 404, description = "RuleSet not found", body = crate::error::ErrorBody),
        (status = 409, description = "RuleSet is not published", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid context or incompatible schema", body = crate::error::ErrorBody),
    ),
    tag = "quotes"
)]
pub(crate) async fn evaluate(
    State(state): State<AppState>,
    Tenant(firm): Tenant,
    body: Result<Json<EvaluateRequest>, JsonRejection>,
) -> Result<Json<EvaluateResponse>, AppError> {
    let req = extract_json(body)?;
    let (ruleset, result) = state.quotes.evaluate(
        &firm,
        &RuleSetId::from_uuid(req.ruleset_id),
        req.ruleset_version,
        &req.context,
    )?;
    Ok(Json(EvaluateResponse::new(&ruleset, result)))
}

/// POST /v1/quotes: Create a quote container.
#[utoipa::path(
    post,
    path = "/v1/quotes",
    params(("x-firm-id" = Uuid, Header, description = "Tenant firm id")),
    request_body = CreateQuoteRequest,
    responses(
        (status = 201, description = "Quote created", body = QuoteResponse),
        (status = 422, description = "Invalid title", body = crate::error::ErrorBody),
    ),
    tag = "quotes"
)]
pub(crate) async fn create_quote(
    State(state): State<AppState>,
    Tenant(firm): Tenant,
    body: Result<Json<CreateQuoteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<QuoteResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let quote = state.quotes.create_quote(firm, &req.title)?;
    Ok((StatusCode::CREATED, Json(quote.into())))
}

/// GET /v1/quotes/{id}: Fetch a quote container.
#[utoipa::path(
    get,
    path = "/v1/quotes/{id}",
    params(
        ("id" = Uuid, Path, description = "Quote id"),
        ("x-firm-id" = Uuid, Header, description = "Tenant firm id"),
    ),
    responses(
        (status = 200, description = "Quote found", body = QuoteResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "quotes"
)]
pub(crate) async fn get_quote(
    State(state): State<AppState>,
    Tenant(firm): Tenant,
    Path(id): Path<Uuid>,
) -> Result<Json<QuoteResponse>, AppError> {
    let quote = state.quotes.get_quote(&firm, &QuoteId::from_uuid(id))?;
    Ok(Json(quote.into()))
}

/// POST /v1/quotes/{id}/versions: Evaluate and record a new version.
#[utoipa::path(
    post,
    path = "/v1/quotes/{id}/versions",
    params(
        ("id" = Uuid, Path, description = "Quote id"),
        ("x-firm-id" = Uuid, Header, description = "Tenant firm id"),
    ),
    request_body = EvaluateRequest,
    responses(
        (status = 201, description = "Version recorded", body = QuoteVersionResponse),
        (status = 400, description = "Unknown product or unsupported currency", body = crate::error::ErrorBody),
        (status = 404, description = "Quote or RuleSet not found", body = crate::error::ErrorBody),
        (status = 409, description = "RuleSet is not published", body = crate::error::ErrorBody),
    ),
    tag = "quotes"
)]
pub(crate) async fn add_version(
    State(state): State<AppState>,
    Tenant(firm): Tenant,
    Path(id): Path<Uuid>,
    body: Result<Json<EvaluateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<QuoteVersionResponse>), AppError> {
    let req = extract_json(body)?;
    let version = state.quotes.add_version(
        &firm,
        &QuoteId::from_uuid(id),
        &RuleSetId::from_uuid(req.ruleset_id),
        req.ruleset_version,
        req.context,
    )?;
    Ok((StatusCode::CREATED, Json(version.into())))
}

/// GET /v1/quotes/versions/{id}: Fetch a stored version.
#[utoipa::path(
    get,
    path = "/v1/quotes/versions/{id}",
    params(
        ("id" = Uuid, Path, description = "Quote version id"),
        ("x-firm-id" = Uuid, Header, description = "Tenant firm id"),
    ),
    responses(
        (status = 200, description = "Version found", body = QuoteVersionResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "quotes"
)]
pub(crate) async fn get_version(
    State(state): State<AppState>,
    Tenant(firm): Tenant,
    Path(id): Path<Uuid>,
) -> Result<Json<QuoteVersionResponse>, AppError> {
    let version = state
        .quotes
        .get_version(&firm, &QuoteVersionId::from_uuid(id))?;
    Ok(Json(version.into()))
}

/// GET /v1/quotes/versions/{id}/reproduce: Re-derive a stored version.
#[utoipa::path(
    get,
    path = "/v1/quotes/versions/{id}/reproduce",
    params(
        ("id" = Uuid, Path, description = "Quote version id"),
        ("x-firm-id" = Uuid, Header, description = "Tenant firm id"),
    ),
    responses(
        (status = 200, description = "Reproduced exactly", body = ReproduceResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 500, description = "Diverged, or the RuleSet failed its integrity check", body = ReproduceResponse),
    ),
    tag = "quotes"
)]
pub(crate) async fn reproduce(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
    Tenant(firm): Tenant,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let report = state
        .quotes
        .reproduce(&firm, &QuoteVersionId::from_uuid(id))?;
    let status = if report.matched {
        StatusCode::OK
    } else {
        metrics.record_divergence();
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(ReproduceResponse::from(report))).into_response())
}

/// GET /v1/quotes/audit: Reproduce every stored version of the firm.
#[utoipa::path(
    get,
    path = "/v1/quotes/audit",
    params(("x-firm-id" = Uuid, Header, description = "Tenant firm id")),
    responses(
        (status = 200, description = "Audit summary", body = AuditResponse),
    ),
    tag = "quotes"
)]
pub(crate) async fn audit(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
    Tenant(firm): Tenant,
) -> Json<AuditResponse> {
    let report = state.quotes.audit(&firm);
    for _ in &report.diverged {
        metrics.record_divergence();
    }
    Json(report.into())
}
