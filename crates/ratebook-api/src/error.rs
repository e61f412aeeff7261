//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from ratebook-state, ratebook-engine and
//! ratebook-quote to HTTP status codes with a JSON body of the form
//! `{"error": {"code", "message", "details"?}}`. Internal and integrity
//! failures are logged and returned without their message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use ratebook_engine::EvaluationError;
use ratebook_quote::QuoteError;
use ratebook_schema::{DocumentError, Violations};
use ratebook_state::RegistryError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. "NOT_FOUND", "IMMUTABLE_RULESET").
    pub code: String,
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("{0}")]
    NotFound(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or malformed tenant header (401).
    #[error("{0}")]
    Unauthorized(String),

    /// Input failed validation (422). `violations` become `details`.
    #[error("{message}")]
    Validation {
        message: String,
        violations: Option<Violations>,
    },

    /// The rule schema version cannot be interpreted (422).
    #[error("{0}")]
    SchemaIncompatible(String),

    /// A requested product has no price (400).
    #[error("{0}")]
    UnknownProduct(String),

    /// The requested currency is not the RuleSet's (400).
    #[error("{0}")]
    UnsupportedCurrency(String),

    /// A computed amount left the representable range (422).
    #[error("{0}")]
    AmountOutOfRange(String),

    /// A frozen RuleSet field was written (409).
    #[error("{0}")]
    Immutable(String),

    /// The RuleSet is not in a status that allows new quotes (409).
    #[error("{0}")]
    NotPublished(String),

    /// Conflict with current resource state (409).
    #[error("{0}")]
    Conflict(String),

    /// Stored rules no longer match their checksum (500). Message hidden.
    #[error("integrity failure: {0}")]
    Integrity(String),

    /// Internal server error (500). Message is logged but not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            violations: None,
        }
    }

    /// HTTP status and machine-readable code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Validation { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::SchemaIncompatible(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "SCHEMA_INCOMPATIBLE")
            }
            Self::UnknownProduct(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_PRODUCT"),
            Self::UnsupportedCurrency(_) => (StatusCode::BAD_REQUEST, "UNSUPPORTED_CURRENCY"),
            Self::AmountOutOfRange(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "AMOUNT_OUT_OF_RANGE")
            }
            Self::Immutable(_) => (StatusCode::CONFLICT, "IMMUTABLE_RULESET"),
            Self::NotPublished(_) => (StatusCode::CONFLICT, "RULESET_NOT_PUBLISHED"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Integrity(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTEGRITY_ERROR"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Integrity(_) => "Stored pricing rules failed an integrity check".to_string(),
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed with server error");
        }

        let details = match &self {
            Self::Validation {
                violations: Some(v),
                ..
            } => Some(serde_json::Value::Array(
                v.iter()
                    .map(|v| serde_json::json!({"path": v.path, "message": v.message}))
                    .collect(),
            )),
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ratebook_core::ValidationError> for AppError {
    fn from(err: ratebook_core::ValidationError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Structural(v) => Self::Validation {
                message: "rule document failed structural validation".into(),
                violations: Some(v),
            },
            DocumentError::Configuration(v) => Self::Validation {
                message: "rule document is not publishable".into(),
                violations: Some(v),
            },
            DocumentError::Malformed(_) => Self::validation(err.to_string()),
            DocumentError::SchemaBuild(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Validation(e) => e.into(),
            RegistryError::Canonicalization(_) | RegistryError::Invalid(_) => {
                Self::validation(err.to_string())
            }
            RegistryError::SchemaCompatibility(e) => Self::SchemaIncompatible(e.to_string()),
            RegistryError::Immutable(e) => Self::Immutable(e.to_string()),
            RegistryError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            RegistryError::InvalidTransition { .. }
            | RegistryError::Duplicate { .. }
            | RegistryError::ConcurrentModification { .. } => Self::Conflict(err.to_string()),
        }
    }
}

impl From<EvaluationError> for AppError {
    fn from(err: EvaluationError) -> Self {
        match err {
            EvaluationError::SchemaCompatibility(e) => Self::SchemaIncompatible(e.to_string()),
            EvaluationError::Integrity(e) => Self::Integrity(e.to_string()),
            EvaluationError::UnknownProduct { .. } => Self::UnknownProduct(err.to_string()),
            EvaluationError::UnsupportedCurrency { .. } => {
                Self::UnsupportedCurrency(err.to_string())
            }
            EvaluationError::InvalidContext(_) => Self::validation(err.to_string()),
            EvaluationError::Overflow { .. } => Self::AmountOutOfRange(err.to_string()),
            EvaluationError::MalformedRules(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<QuoteError> for AppError {
    fn from(err: QuoteError) -> Self {
        match err {
            QuoteError::Registry(e) => e.into(),
            QuoteError::Evaluation(e) => e.into(),
            QuoteError::Integrity(e) => Self::Integrity(e.to_string()),
            QuoteError::Canonicalization(e) => Self::Internal(e.to_string()),
            QuoteError::NotPublished { .. } => Self::NotPublished(err.to_string()),
            QuoteError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            QuoteError::Invalid(_) => Self::validation(err.to_string()),
        }
    }
}
