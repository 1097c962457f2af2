//! OIDC Gate error types.
//!
//! [`AuthError`] enumerates every reason a bearer token can be rejected.
//! [`GateError`] is the HTTP-facing error: it maps to a status code via the
//! `IntoResponse` impl. Messages returned to clients are intentionally
//! generic; the precise `AuthError` is logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Generic client-facing message for every authentication failure.
const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

/// Reasons a token verification attempt fails.
///
/// Every variant is terminal for the request's authentication attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Token has expired")]
    Expired,

    #[error("Token is not valid yet")]
    NotYetValid,

    #[error("Required scopes ({required:?}) not found in token. Found: {found:?}")]
    InsufficientScope {
        required: Vec<String>,
        found: Vec<String>,
    },

    #[error("Unexpected signing method: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Custom validation failed: {0}")]
    CustomValidationFailed(String),

    #[error("Token issuer {0} does not match the expected issuer")]
    IssuerMismatch(String),

    #[error("Token audience does not include the expected audience")]
    InvalidAudience,

    #[error("Failed to get kid header from token")]
    MissingKeyId,

    #[error("Key with kid {kid} not found at issuer {issuer}")]
    KeyNotFound { issuer: String, kid: String },

    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("Key resolution failed: {0}")]
    KeyResolutionFailed(String),

    #[error("Token signature is invalid")]
    InvalidSignature,
}

impl AuthError {
    /// Bounded label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::Expired => "expired",
            AuthError::NotYetValid => "not_yet_valid",
            AuthError::InsufficientScope { .. } => "insufficient_scope",
            AuthError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            AuthError::CustomValidationFailed(_) => "custom_validation_failed",
            AuthError::IssuerMismatch(_) => "issuer_mismatch",
            AuthError::InvalidAudience => "invalid_audience",
            AuthError::MissingKeyId => "missing_key_id",
            AuthError::KeyNotFound { .. } => "key_not_found",
            AuthError::UnsupportedKeyType(_) => "unsupported_key_type",
            AuthError::KeyResolutionFailed(_) => "key_resolution_failed",
            AuthError::InvalidSignature => "invalid_signature",
        }
    }
}

/// HTTP-facing error for requests that must be rejected.
///
/// Only produced when the gate runs with the reject policy, or by handlers
/// that require an authenticated caller.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] AuthError),
}

impl GateError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            GateError::MissingToken | GateError::Unauthorized(_) => 401,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            GateError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "MISSING_TOKEN",
                "A bearer token is required".to_string(),
            ),
            GateError::Unauthorized(reason) => {
                // Log actual reason server-side, return generic message to client
                tracing::debug!(target: "gate.errors", reason = %reason, "Rejecting request");
                (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_TOKEN",
                    INVALID_TOKEN_MESSAGE.to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            let challenge = match &self {
                GateError::MissingToken => "Bearer realm=\"oidc-gate\"",
                GateError::Unauthorized(_) => "Bearer realm=\"oidc-gate\", error=\"invalid_token\"",
            };
            if let Ok(header_value) = challenge.parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
