use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use bairro_crypto::TokenError;
use bairro_types::error::{ErrorBody, ErrorKind, FieldError};

/// Typed failure carried from domain code to the HTTP boundary.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub fields: Vec<FieldError>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: &str, message: impl Into<String>) -> Self {
        self.fields.push(FieldError::new(field, message));
        self
    }

    /// Generic request error, e.g. an invalid listing filter.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Error, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn not_allowed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotAllowed, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn validation(message: impl Into<String>, fields: Vec<FieldError>) -> Self {
        Self {
            kind: ErrorKind::ValidationError,
            message: message.into(),
            fields,
        }
    }

    pub fn internal() -> Self {
        Self::new(ErrorKind::InternalServerError, "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Storage failures never reach the client verbatim.
impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        error!("Storage error: {:#}", e);
        Self::internal()
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        error!("Token codec error: {}", e);
        Self::internal()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text(), Vec::new())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            name: self.kind,
            message: self.message,
            fields: self.fields,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_kind() {
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::not_allowed("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::validation("x", vec![]).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::internal().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn storage_errors_are_masked() {
        let err: ApiError = anyhow::anyhow!("disk I/O error at /var/lib/bairro.db").into();
        assert_eq!(err.kind, ErrorKind::InternalServerError);
        assert!(!err.message.contains("bairro.db"));
    }
}
