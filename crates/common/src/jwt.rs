//! JWT utilities shared across OIDC Gate components.
//!
//! This module provides the structural side of JWT handling:
//! - Size limits for DoS prevention
//! - Splitting a compact JWT into its segments without verifying it
//! - Decoding a base64url JSON segment
//! - Temporal claim validation (`exp`, `nbf`, `iat`) with clock skew tolerance
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE splitting or decoding (DoS prevention)
//! - Nothing in this module verifies a signature. Callers MUST verify the
//!   signature over [`TokenSegments::signing_input`] before trusting any claim.
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{decode_segment, split_token, validate_time_window, DEFAULT_CLOCK_SKEW};
//!
//! let segments = split_token(token)?;
//! let header: serde_json::Value = decode_segment(segments.header)?;
//!
//! // After decoding claims
//! validate_time_window(claims.exp, claims.nbf, claims.iat, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any parsing or cryptographic
/// operations.
///
/// # Rationale
///
/// - Typical RS256 access tokens are 800-1500 bytes
/// - Tokens carrying large group or role lists rarely exceed 4KB
/// - Checked BEFORE base64 decode and signature verification
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes per NIST SP 800-63B).
///
/// Applied to `nbf` and `iat`: tokens whose not-before or issued-at timestamps
/// lie more than this amount in the future are rejected.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Upper bound for configuration validation.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while structurally decoding or time-checking a JWT.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("Token exceeds {MAX_JWT_SIZE_BYTES} bytes")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("Token is not a well-formed JWT")]
    MalformedToken,

    /// Token `exp` claim lies in the past.
    #[error("Token has expired")]
    Expired,

    /// Token `nbf` claim lies too far in the future.
    #[error("Token is not valid yet")]
    NotYetValid,

    /// Token `iat` claim is too far in the future.
    #[error("Token issued-at time is in the future")]
    IatTooFarInFuture,
}

// =============================================================================
// Segments
// =============================================================================

/// The three segments of a compact JWT, borrowed from the original string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSegments<'a> {
    /// Base64url-encoded header.
    pub header: &'a str,

    /// Base64url-encoded claims.
    pub payload: &'a str,

    /// Base64url-encoded signature (may be empty for unsigned tokens).
    pub signature: &'a str,

    /// `header.payload`, the bytes the signature is computed over.
    pub signing_input: &'a str,
}

// =============================================================================
// Functions
// =============================================================================

/// Split a compact JWT into header, payload and signature segments.
///
/// The signature segment may be empty so that unsigned (`alg: none`) tokens
/// reach algorithm checks and are rejected there with a precise reason.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` - Token does not have exactly three segments, or the
///   header or payload segment is empty
pub fn split_token(token: &str) -> Result<TokenSegments<'_>, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let (signing_input, signature) = token.rsplit_once('.').ok_or_else(|| {
        tracing::debug!(target: "common.jwt", "Token rejected: no segment separator");
        JwtValidationError::MalformedToken
    })?;

    let (header, payload) = signing_input.split_once('.').ok_or_else(|| {
        tracing::debug!(target: "common.jwt", "Token rejected: missing payload segment");
        JwtValidationError::MalformedToken
    })?;

    if header.is_empty() || payload.is_empty() || payload.contains('.') {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(JwtValidationError::MalformedToken);
    }

    Ok(TokenSegments {
        header,
        payload,
        signature,
        signing_input,
    })
}

/// Decode a base64url (unpadded) JSON segment into `T`.
///
/// # Errors
///
/// Returns `JwtValidationError::MalformedToken` if the segment is not valid
/// base64url or the decoded bytes do not deserialize into `T`.
pub fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, JwtValidationError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT segment base64");
        JwtValidationError::MalformedToken
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT segment JSON");
        JwtValidationError::MalformedToken
    })
}

/// Validate the temporal claims of a token against the current time.
///
/// - `exp` is strict: a token is expired once `exp < now`. A token without
///   `exp` does not expire
/// - `nbf` and `iat` may lie up to `clock_skew` in the future
///
/// # Errors
///
/// Returns `Expired`, `NotYetValid` or `IatTooFarInFuture`.
pub fn validate_time_window(
    exp: Option<i64>,
    nbf: Option<i64>,
    iat: Option<i64>,
    clock_skew: Duration,
) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_time_window_at(exp, nbf, iat, clock_skew, now)
}

/// Deterministic time window validation against an explicit `now` timestamp.
///
/// Prefer [`validate_time_window`] in production code. This variant exists so
/// that boundary conditions can be unit-tested without wall-clock dependence.
///
/// # Errors
///
/// See [`validate_time_window`].
pub fn validate_time_window_at(
    exp: Option<i64>,
    nbf: Option<i64>,
    iat: Option<i64>,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // Saturates rather than wrapping for skews beyond the i64 range
    let clock_skew_secs = i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX);
    let latest_allowed = now.saturating_add(clock_skew_secs);

    if let Some(exp) = exp {
        if exp < now {
            tracing::debug!(target: "common.jwt", exp = exp, now = now, "Token rejected: expired");
            return Err(JwtValidationError::Expired);
        }
    }

    if let Some(nbf) = nbf {
        if nbf > latest_allowed {
            tracing::debug!(
                target: "common.jwt",
                nbf = nbf,
                now = now,
                clock_skew_secs = clock_skew_secs,
                "Token rejected: not valid yet"
            );
            return Err(JwtValidationError::NotYetValid);
        }
    }

    if let Some(iat) = iat {
        if iat > latest_allowed {
            tracing::debug!(
                target: "common.jwt",
                iat = iat,
                now = now,
                max_allowed = latest_allowed,
                clock_skew_secs = clock_skew_secs,
                "Token rejected: iat too far in the future"
            );
            return Err(JwtValidationError::IatTooFarInFuture);
        }
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
