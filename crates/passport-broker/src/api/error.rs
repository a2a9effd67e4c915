//! API error types and OAuth error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use passport_bridge::VerifierError;
use passport_core::PassportError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

use crate::exchange::ExchangeError;

/// API error type
///
/// Messages carried here are shown to callers; internal detail is logged
/// where the error is converted and never reaches the response body.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    #[error("Invalid grant: {0}")]
    InvalidGrant(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// OAuth 2.0 error response body (RFC 6749 §5.2)
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, description) = match self {
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg),
            ApiError::UnsupportedGrantType(msg) => {
                (StatusCode::BAD_REQUEST, "unsupported_grant_type", msg)
            }
            ApiError::InvalidGrant(msg) => (StatusCode::BAD_REQUEST, "invalid_grant", msg),
            ApiError::AccessDenied(msg) => (StatusCode::FORBIDDEN, "access_denied", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", msg),
        };

        let body = ErrorResponse {
            error: code.to_string(),
            error_description: Some(description),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ExchangeError> for ApiError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::InvalidGrantParameters {
                parameter: "grant_type",
                ..
            } => ApiError::UnsupportedGrantType("grant_type must be token-exchange".into()),
            ExchangeError::InvalidGrantParameters { parameter, reason } => {
                ApiError::InvalidRequest(format!("invalid {}: {}", parameter, reason))
            }
            ExchangeError::Verification(
                e @ (VerifierError::KeyFetchFailed { .. } | VerifierError::UnknownIssuer(_)),
            ) => {
                error!(error = %e, "Upstream verification unavailable");
                ApiError::Internal("subject token could not be verified".into())
            }
            ExchangeError::Verification(e) => {
                warn!(error = %e, "Subject token rejected");
                ApiError::InvalidGrant("subject token is invalid or expired".into())
            }
            ExchangeError::Assembly(PassportError::NoVisas) => {
                ApiError::AccessDenied("no visas available for subject".into())
            }
            other => {
                error!(state = %other.state(), error = %other, "Token exchange error");
                ApiError::Internal("passport could not be issued".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use passport_bridge::FactError;

    fn status_and_code(err: ExchangeError) -> (StatusCode, String) {
        let api: ApiError = err.into();
        let code = match &api {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::UnsupportedGrantType(_) => "unsupported_grant_type",
            ApiError::InvalidGrant(_) => "invalid_grant",
            ApiError::AccessDenied(_) => "access_denied",
            ApiError::Internal(_) => "server_error",
        };
        (api.into_response().status(), code.to_string())
    }

    #[test]
    fn test_exchange_error_mapping() {
        assert_eq!(
            status_and_code(ExchangeError::InvalidGrantParameters {
                parameter: "grant_type",
                reason: "unsupported".into()
            }),
            (StatusCode::BAD_REQUEST, "unsupported_grant_type".into())
        );
        assert_eq!(
            status_and_code(ExchangeError::InvalidGrantParameters {
                parameter: "subject_token",
                reason: "missing".into()
            }),
            (StatusCode::BAD_REQUEST, "invalid_request".into())
        );
        assert_eq!(
            status_and_code(VerifierError::TokenExpired(0).into()),
            (StatusCode::BAD_REQUEST, "invalid_grant".into())
        );
        assert_eq!(
            status_and_code(
                VerifierError::KeyFetchFailed {
                    issuer: "https://login.example.org".into(),
                    reason: "timeout".into()
                }
                .into()
            ),
            (StatusCode::INTERNAL_SERVER_ERROR, "server_error".into())
        );
        assert_eq!(
            status_and_code(ExchangeError::Assembly(PassportError::NoVisas)),
            (StatusCode::FORBIDDEN, "access_denied".into())
        );
        assert_eq!(
            status_and_code(FactError::unavailable("directory", "refused").into()),
            (StatusCode::INTERNAL_SERVER_ERROR, "server_error".into())
        );
    }

    #[test]
    fn test_internal_detail_not_exposed() {
        let api: ApiError = ExchangeError::VisaSigning(PassportError::UnknownKey(
            "secret-kid-name".into(),
        ))
        .into();
        assert!(!api.to_string().contains("secret-kid-name"));
    }
}
