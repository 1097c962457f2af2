//! Structural decoding of bearer tokens.
//!
//! Splits a compact JWT into its header, claims, signing input and signature
//! without verifying anything. The signature is checked later by the
//! verifier, once the signing key has been resolved.

use crate::auth::claims::Claims;
use crate::errors::AuthError;
use common::jwt::{decode_segment, split_token, JwtValidationError};

/// The JOSE header fields the verifier relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Declared signing algorithm, kept verbatim (including `none`).
    pub alg: String,

    /// Key ID, `None` when absent, empty or not a string.
    pub kid: Option<String>,
}

/// A token that has been decoded but not verified.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    /// Decoded JOSE header.
    pub header: Header,

    /// Decoded claims, `None` when the payload is JSON `null`.
    pub claims: Option<Claims>,

    /// `header.payload` exactly as received.
    pub signing_input: String,

    /// Base64url-encoded signature exactly as received.
    pub signature: String,
}

/// Decode a compact JWT into header and claims, deferring the signature.
///
/// # Errors
///
/// Returns `AuthError::MalformedToken` if the token is oversized, does not
/// have three segments, or its header or payload cannot be decoded.
pub fn decode_unverified(token: &str) -> Result<DecodedToken, AuthError> {
    let segments = split_token(token).map_err(malformed)?;

    let header_json: serde_json::Value = decode_segment(segments.header).map_err(malformed)?;

    let alg = header_json
        .get("alg")
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
        .ok_or_else(|| {
            tracing::debug!(target: "gate.auth.token", "Token header has no alg");
            AuthError::MalformedToken("Token header has no alg".to_string())
        })?;

    // Extract kid as string, treating empty values as absent
    let kid = header_json
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string);

    let claims: Option<Claims> = decode_segment(segments.payload).map_err(malformed)?;

    Ok(DecodedToken {
        header: Header { alg, kid },
        claims,
        signing_input: segments.signing_input.to_string(),
        signature: segments.signature.to_string(),
    })
}

fn malformed(e: JwtValidationError) -> AuthError {
    AuthError::MalformedToken(e.to_string())
}
