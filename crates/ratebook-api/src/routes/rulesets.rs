//! # RuleSet Lifecycle API
//!
//! Drafts are created and edited here, then published (validated and
//! frozen) and eventually deprecated. A RuleSet is never deleted.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use ratebook_core::{Currency, RuleSetCode, RuleSetId};
use ratebook_schema::SchemaVersion;
use ratebook_state::{NewRuleSet, Revision, RuleSet};

use crate::error::AppError;
use crate::extractors::{extract_validated_json, Tenant, Validate};
use crate::state::AppState;

/// Create a draft RuleSet.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRuleSetRequest {
    /// Stable code, e.g. "STANDARD-2027".
    pub code: String,
    /// Business version. Defaults to the next free version for the code.
    #[serde(default)]
    pub version: Option<u32>,
    /// Rule schema version, e.g. "1.1.0".
    pub schema_version: String,
    /// ISO 4217 code.
    pub default_currency: String,
    /// The rule document.
    #[schema(value_type = Object)]
    pub rules: serde_json::Value,
}

impl Validate for CreateRuleSetRequest {
    fn validate(&self) -> Result<(), String> {
        if !self.rules.is_object() {
            return Err("rules must be a JSON object".to_string());
        }
        Ok(())
    }
}

/// Replace a draft's rules.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRuleSetRequest {
    #[schema(value_type = Object)]
    pub rules: serde_json::Value,
    /// Revision last read by the caller. Stale revisions are rejected.
    #[serde(default)]
    pub revision: Option<u64>,
}

impl Validate for UpdateRuleSetRequest {
    fn validate(&self) -> Result<(), String> {
        if !self.rules.is_object() {
            return Err("rules must be a JSON object".to_string());
        }
        Ok(())
    }
}

/// RuleSet as returned by every lifecycle endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RuleSetResponse {
    pub ruleset_id: Uuid,
    pub code: String,
    pub version: u32,
    pub schema_version: String,
    pub default_currency: String,
    /// "draft", "published" or "deprecated".
    pub status: String,
    /// `sha256:<hex>` over the canonical rules.
    pub checksum: String,
    pub revision: u64,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated_at: Option<String>,
    #[schema(value_type = Object)]
    pub rules: serde_json::Value,
}

impl From<RuleSet> for RuleSetResponse {
    fn from(rs: RuleSet) -> Self {
        Self {
            ruleset_id: *rs.id.as_uuid(),
            code: rs.code.to_string(),
            version: rs.version,
            schema_version: rs.schema_version.to_string(),
            default_currency: rs.default_currency.to_string(),
            status: rs.status.as_str().to_string(),
            checksum: rs.checksum.to_string(),
            revision: rs.revision.value(),
            created_at: rs.created_at.to_iso8601(),
            published_at: rs.published_at.map(|t| t.to_iso8601()),
            deprecated_at: rs.deprecated_at.map(|t| t.to_iso8601()),
            rules: rs.rules,
        }
    }
}

/// Build the RuleSet router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/rulesets", post(create_ruleset).get(list_rulesets))
        .route("/v1/rulesets/{id}", get(get_ruleset).patch(update_ruleset))
        .route("/v1/rulesets/{id}/publish", post(publish_ruleset))
        .route("/v1/rulesets/{id}/deprecate", post(deprecate_ruleset))
}

/// POST /v1/rulesets: Create a draft.
#[utoipa::path(
    post,
    path = "/v1/rulesets",
    request_body = CreateRuleSetRequest,
    params(("x-firm-id" = Uuid, Header, description = "Tenant firm id")),
    responses(
        (status = 201, description = "Draft created", body = RuleSetResponse),
        (status = 409, description = "Code and version already taken", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid rules or schema version", body = crate::error::ErrorBody),
    ),
    tag = "rulesets"
)]
pub(crate) async fn create_ruleset(
    State(state): State<AppState>,
    Tenant(firm): Tenant,
    body: Result<Json<CreateRuleSetRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RuleSetResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let new = NewRuleSet {
        code: RuleSetCode::new(req.code)?,
        version: req.version,
        schema_version: req
            .schema_version
            .parse::<SchemaVersion>()
            .map_err(|e| AppError::SchemaIncompatible(e.to_string()))?,
        default_currency: Currency::new(req.default_currency)?,
        rules: req.rules,
    };
    let ruleset = state.registry.create_draft(firm, new)?;
    Ok((StatusCode::CREATED, Json(ruleset.into())))
}

/// GET /v1/rulesets: List the firm's RuleSets.
#[utoipa::path(
    get,
    path = "/v1/rulesets",
    params(("x-firm-id" = Uuid, Header, description = "Tenant firm id")),
    responses(
        (status = 200, description = "RuleSets ordered by code then version", body = Vec<RuleSetResponse>),
    ),
    tag = "rulesets"
)]
pub(crate) async fn list_rulesets(
    State(state): State<AppState>,
    Tenant(firm): Tenant,
) -> Json<Vec<RuleSetResponse>> {
    Json(
        state
            .registry
            .list(&firm)
            .into_iter()
            .map(RuleSetResponse::from)
            .collect(),
    )
}

/// GET /v1/rulesets/{id}: Fetch one RuleSet.
#[utoipa::path(
    get,
    path = "/v1/rulesets/{id}",
    params(
        ("id" = Uuid, Path, description = "RuleSet id"),
        ("x-firm-id" = Uuid, Header, description = "Tenant firm id"),
    ),
    responses(
        (status = 200, description = "RuleSet found", body = RuleSetResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "rulesets"
)]
pub(crate) async fn get_ruleset(
    State(state): State<AppState>,
    Tenant(firm): Tenant,
    Path(id): Path<Uuid>,
) -> Result<Json<RuleSetResponse>, AppError> {
    let ruleset = state.registry.get(&firm, &RuleSetId::from_uuid(id))?;
    Ok(Json(ruleset.into()))
}

/// PATCH /v1/rulesets/{id}: Replace a draft's rules.
#[utoipa::path(
    patch,
    path = "/v1/rulesets/{id}",
    params(
        ("id" = Uuid, Path, description = "RuleSet id"),
        ("x-firm-id" = Uuid, Header, description = "Tenant firm id"),
    ),
    request_body = UpdateRuleSetRequest,
    responses(
        (status = 200, description = "Rules replaced, checksum recomputed", body = RuleSetResponse),
        (status = 409, description = "RuleSet is immutable or was modified concurrently", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid rules", body = crate::error::ErrorBody),
    ),
    tag = "rulesets"
)]
pub(crate) async fn update_ruleset(
    State(state): State<AppState>,
    Tenant(firm): Tenant,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateRuleSetRequest>, JsonRejection>,
) -> Result<Json<RuleSetResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let ruleset = state.registry.update(
        &firm,
        &RuleSetId::from_uuid(id),
        req.rules,
        req.revision.map(Revision::new),
    )?;
    Ok(Json(ruleset.into()))
}

/// POST /v1/rulesets/{id}/publish: Validate and freeze a draft.
#[utoipa::path(
    post,
    path = "/v1/rulesets/{id}/publish",
    params(
        ("id" = Uuid, Path, description = "RuleSet id"),
        ("x-firm-id" = Uuid, Header, description = "Tenant firm id"),
    ),
    responses(
        (status = 200, description = "Published (or already published)", body = RuleSetResponse),
        (status = 409, description = "Deprecated RuleSets cannot be republished", body = crate::error::ErrorBody),
        (status = 422, description = "Rules are not publishable", body = crate::error::ErrorBody),
    ),
    tag = "rulesets"
)]
pub(crate) async fn publish_ruleset(
    State(state): State<AppState>,
    Tenant(firm): Tenant,
    Path(id): Path<Uuid>,
) -> Result<Json<RuleSetResponse>, AppError> {
    let ruleset = state.registry.publish(&firm, &RuleSetId::from_uuid(id))?;
    Ok(Json(ruleset.into()))
}

/// POST /v1/rulesets/{id}/deprecate: Retire a published RuleSet.
#[utoipa::path(
    post,
    path = "/v1/rulesets/{id}/deprecate",
    params(
        ("id" = Uuid, Path, description = "RuleSet id"),
        ("x-firm-id" = Uuid, Header, description = "Tenant firm id"),
    ),
    responses(
        (status = 200, description = "Deprecated", body = RuleSetResponse),
        (status = 409, description = "Only published RuleSets can be deprecated", body = crate::error::ErrorBody),
    ),
    tag = "rulesets"
)]
pub(crate) async fn deprecate_ruleset(
    State(state): State<AppState>,
    Tenant(firm): Tenant,
    Path(id): Path<Uuid>,
) -> Result<Json<RuleSetResponse>, AppError> {
    let ruleset = state.registry.deprecate(&firm, &RuleSetId::from_uuid(id))?;
    Ok(Json(ruleset.into()))
}
