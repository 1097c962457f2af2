//! Current caller handler.
//!
//! Returns information about the authenticated caller from JWT claims.

use crate::auth::Claims;
use crate::errors::GateError;
use axum::{Extension, Json};
use serde::Serialize;
use tracing::instrument;

/// Response for `/v1/me` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    /// Token issuer.
    pub iss: String,

    /// Subject (user or client ID).
    pub sub: String,

    /// Token scopes.
    pub scopes: Vec<String>,

    /// Token audiences.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aud: Vec<String>,

    /// Token expiration timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Token issued-at timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl From<Claims> for MeResponse {
    fn from(claims: Claims) -> Self {
        Self {
            iss: claims.iss,
            sub: claims.sub,
            scopes: claims.scopes,
            aud: claims.aud,
            exp: claims.exp,
            iat: claims.iat,
        }
    }
}

/// Handler for GET /v1/me
///
/// ## Response
///
/// Returns 200 OK with the caller's claims:
///
/// ```json
/// {
///   "iss": "https://login.example.com/v2.0",
///   "sub": "client_abc123",
///   "scopes": ["read", "write"],
///   "exp": 1234567890,
///   "iat": 1234567800
/// }
/// ```
///
/// Returns 401 when the request is unauthenticated.
#[instrument(skip_all, name = "gate.handlers.me")]
pub async fn get_me(claims: Option<Extension<Claims>>) -> Result<Json<MeResponse>, GateError> {
    let Extension(claims) = claims.ok_or_else(|| {
        tracing::debug!(target: "gate.handlers.me", "No verified claims on request");
        GateError::MissingToken
    })?;

    Ok(Json(MeResponse::from(claims)))
}
