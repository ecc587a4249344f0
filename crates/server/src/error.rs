#![forbid(unsafe_code)]

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value, json};
use thiserror::Error;
use vt_storage::StoreError;

/// Everything a handler can answer with besides success. Storage and I/O failures collapse into
/// `Internal`; their details go to the log, never to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Unauthenticated(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("unknown id")]
    UnknownId,
    #[error("revision mismatch (expected={expected}, actual={actual})")]
    RevisionMismatch { expected: i64, actual: i64 },
    #[error("cannot go from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
    #[error("{0}")]
    Conflict(&'static str),
    #[error("too many failed attempts")]
    Locked { until_ms: i64 },
    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal(detail.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::UnknownId => StatusCode::NOT_FOUND,
            Self::RevisionMismatch { .. } | Self::InvalidTransition { .. } | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::Locked { .. } => StatusCode::LOCKED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Unauthenticated(_) => "UNAUTHENTICATED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::UnknownId => "UNKNOWN_ID",
            Self::RevisionMismatch { .. } => "REVISION_MISMATCH",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Conflict(_) => "CONFLICT",
            Self::Locked { .. } => "LOCKED",
            Self::Internal(_) => "INTERNAL",
        }
    }

    fn recovery(&self) -> Option<&'static str> {
        match self {
            Self::InvalidInput(_) => Some("Fix the request fields and retry."),
            Self::Unauthenticated(_) => Some("Log in again and send the token as a Bearer header."),
            Self::Forbidden(_) => None,
            Self::UnknownId => Some("Check the id; it may be outside your scope."),
            Self::RevisionMismatch { .. } => {
                Some("Reload the record and retry with its current revision.")
            }
            Self::InvalidTransition { .. } => Some("Reload the record to see its current status."),
            Self::Conflict(_) => Some("Use the existing record instead of creating a new one."),
            Self::Locked { .. } => Some("Wait until the lock expires before trying again."),
            Self::Internal(_) => Some("Retry later."),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut error = Map::new();
        error.insert("code".to_string(), Value::String(self.code().to_string()));
        error.insert("message".to_string(), Value::String(self.to_string()));
        if let Some(recovery) = self.recovery() {
            error.insert("recovery".to_string(), Value::String(recovery.to_string()));
        }
        match self {
            Self::RevisionMismatch { expected, actual } => {
                error.insert("expected_revision".to_string(), json!(expected));
                error.insert("actual_revision".to_string(), json!(actual));
            }
            Self::Locked { until_ms } => {
                error.insert("locked_until_ms".to_string(), json!(until_ms));
            }
            _ => {}
        }
        json!({ "success": false, "error": Value::Object(error) })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            tracing::error!(%detail, "request failed");
        }
        (self.status(), Json(self.to_json())).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::InvalidInput(message) => Self::InvalidInput(message.to_string()),
            StoreError::UnknownId => Self::UnknownId,
            StoreError::RevisionMismatch { expected, actual } => {
                Self::RevisionMismatch { expected, actual }
            }
            StoreError::InvalidTransition { from, to } => Self::InvalidTransition { from, to },
            StoreError::Conflict(message) => Self::Conflict(message),
            StoreError::InvalidCredentials => Self::Unauthenticated("invalid credentials"),
            StoreError::Locked { until_ms } => Self::Locked { until_ms },
            err @ (StoreError::Io(_) | StoreError::Sql(_) | StoreError::Hash(_)) => Self::Internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self::InvalidInput(value.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(value: QueryRejection) -> Self {
        Self::InvalidInput(value.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_keep_their_meaning() {
        let err = ApiError::from(StoreError::RevisionMismatch {
            expected: 1,
            actual: 3,
        });
        assert_eq!(err.status(), StatusCode::CONFLICT);
        let body = err.to_json();
        assert_eq!(body["error"]["code"], "REVISION_MISMATCH");
        assert_eq!(body["error"]["actual_revision"], 3);

        let err = ApiError::from(StoreError::Locked { until_ms: 42 });
        assert_eq!(err.status(), StatusCode::LOCKED);
        assert_eq!(err.to_json()["error"]["locked_until_ms"], 42);
    }

    #[test]
    fn internal_details_stay_out_of_the_body() {
        let err = ApiError::from(StoreError::Io(std::io::Error::other("disk on fire")));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = err.to_json().to_string();
        assert!(!body.contains("disk on fire"));
    }
}
