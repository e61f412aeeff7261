//! # Custom Extractors & Validation
//!
//! - [`Tenant`]: the calling firm, taken from the `x-firm-id` header. Every
//!   RuleSet and quote route is scoped by it.
//! - [`Validate`] and [`extract_validated_json`]: JSON body extraction with
//!   deserialization errors mapped to [`AppError::BadRequest`].

use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::Json;

use ratebook_core::FirmId;

use crate::error::AppError;

/// Header carrying the tenant's firm id (a UUID).
pub const FIRM_HEADER: &str = "x-firm-id";

/// The firm a request acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tenant(pub FirmId);

impl<S: Send + Sync> FromRequestParts<S> for Tenant {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(FIRM_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("missing {FIRM_HEADER} header")))?;
        let text = raw
            .to_str()
            .map_err(|_| AppError::Unauthorized(format!("{FIRM_HEADER} is not valid text")))?;
        let firm = text
            .trim()
            .parse::<FirmId>()
            .map_err(|_| AppError::Unauthorized(format!("{FIRM_HEADER} must be a UUID")))?;
        Ok(Self(firm))
    }
}

/// Request types that check business rules beyond deserialization.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::validation)?;
    Ok(value)
}
