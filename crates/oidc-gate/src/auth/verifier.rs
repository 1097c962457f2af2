//! Bearer token verification.
//!
//! [`TokenVerifier`] turns a decoded-but-unverified token into trusted
//! [`Claims`], or the first reason it must be rejected.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RSA signature algorithms are accepted; `none`, HMAC, EC and EdDSA
//!   are rejected before any key is fetched
//! - The token issuer must match the configured issuer, so signing keys are
//!   only ever fetched from a trusted discovery endpoint
//! - Expiry is strict; `nbf` and `iat` are checked with clock skew tolerance

use crate::auth::cache::{SigningKeyCache, DEFAULT_KEY_CACHE_TTL_SECONDS};
use crate::auth::claims::Claims;
use crate::auth::resolver::{KeyResolver, OidcKeyResolver};
use crate::auth::token::{decode_unverified, DecodedToken};
use crate::errors::AuthError;
use crate::observability::metrics;
use common::jwt::{validate_time_window, JwtValidationError, DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use jsonwebtoken::Algorithm;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Caller-supplied check run after the built-in claim checks.
///
/// Returning `Err(message)` rejects the token with
/// `AuthError::CustomValidationFailed(message)`.
pub trait ClaimsValidator: Send + Sync {
    fn validate(&self, claims: &Claims) -> Result<(), String>;
}

impl<F> ClaimsValidator for F
where
    F: Fn(&Claims) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, claims: &Claims) -> Result<(), String> {
        self(claims)
    }
}

/// Verification settings. Built once at startup and shared read-only.
#[derive(Clone)]
pub struct VerificationConfig {
    /// Issuer tokens must come from.
    pub issuer: String,

    /// Scopes every token must carry.
    pub required_scopes: Vec<String>,

    /// Audience tokens must be issued for, if any.
    pub audience: Option<String>,

    /// Optional application-specific check.
    pub custom_validator: Option<Arc<dyn ClaimsValidator>>,

    /// How long a resolved signing key stays cached.
    pub key_cache_ttl: Duration,

    /// Leeway applied to `nbf` and `iat`.
    pub clock_skew: Duration,
}

impl VerificationConfig {
    /// Settings for `issuer` with defaults for everything else.
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            required_scopes: Vec::new(),
            audience: None,
            custom_validator: None,
            key_cache_ttl: Duration::from_secs(DEFAULT_KEY_CACHE_TTL_SECONDS),
            clock_skew: DEFAULT_CLOCK_SKEW,
        }
    }

    pub fn with_required_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_custom_validator(mut self, validator: impl ClaimsValidator + 'static) -> Self {
        self.custom_validator = Some(Arc::new(validator));
        self
    }

    pub fn with_key_cache_ttl(mut self, ttl: Duration) -> Self {
        self.key_cache_ttl = ttl;
        self
    }

    /// Leeway for `nbf` and `iat`, clamped to [`MAX_CLOCK_SKEW`].
    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew.min(MAX_CLOCK_SKEW);
        self
    }
}

impl fmt::Debug for VerificationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationConfig")
            .field("issuer", &self.issuer)
            .field("required_scopes", &self.required_scopes)
            .field("audience", &self.audience)
            .field("custom_validator", &self.custom_validator.is_some())
            .field("key_cache_ttl", &self.key_cache_ttl)
            .field("clock_skew", &self.clock_skew)
            .finish()
    }
}

/// Token verifier backed by a signing key cache.
pub struct TokenVerifier {
    config: VerificationConfig,

    /// Cache of issuer signing keys.
    key_cache: Arc<SigningKeyCache>,
}

impl TokenVerifier {
    /// Create a verifier that resolves keys over HTTP.
    pub fn new(config: VerificationConfig) -> Self {
        Self::with_resolver(config, Arc::new(OidcKeyResolver::new()))
    }

    /// Create a verifier whose cache consults `resolver` on a miss.
    pub fn with_resolver(config: VerificationConfig, resolver: Arc<dyn KeyResolver>) -> Self {
        let key_cache = Arc::new(SigningKeyCache::new(resolver, config.key_cache_ttl));
        Self::with_cache(config, key_cache)
    }

    /// Create a verifier sharing an existing cache.
    pub fn with_cache(config: VerificationConfig, key_cache: Arc<SigningKeyCache>) -> Self {
        Self { config, key_cache }
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    pub fn key_cache(&self) -> &Arc<SigningKeyCache> {
        &self.key_cache
    }

    /// Decode and verify a compact JWT.
    ///
    /// # Errors
    ///
    /// Returns the first `AuthError` encountered; see [`Self::verify_decoded`].
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let result = match decode_unverified(token) {
            Ok(decoded) => self.check(decoded).await,
            Err(e) => Err(e),
        };
        record_outcome(&result);
        result
    }

    /// Verify an already decoded token.
    ///
    /// # Security Checks
    ///
    /// 1. Claims present - else `MalformedToken`
    /// 2. `exp` (when present), `nbf`, `iat` - `Expired` / `NotYetValid`
    /// 3. Required scopes - `InsufficientScope`
    /// 4. RSA algorithm pinning - `UnsupportedAlgorithm`
    /// 5. Custom validator - `CustomValidationFailed`
    /// 6. Issuer and audience - `IssuerMismatch` / `InvalidAudience`
    /// 7. `kid` and key lookup - `MissingKeyId` or the cache's error
    /// 8. Key's declared `alg` - `UnsupportedAlgorithm`; then the signature
    ///    over `header.payload` - `InvalidSignature`
    ///
    /// # Errors
    ///
    /// Returns the first failing check's `AuthError`.
    #[instrument(skip_all)]
    pub async fn verify_decoded(&self, token: DecodedToken) -> Result<Claims, AuthError> {
        let result = self.check(token).await;
        record_outcome(&result);
        result
    }

    async fn check(&self, token: DecodedToken) -> Result<Claims, AuthError> {
        let DecodedToken {
            header,
            claims,
            signing_input,
            signature,
        } = token;

        // 1. Claims must be present
        let claims = claims.ok_or_else(|| {
            tracing::debug!(target: "gate.auth.verifier", "Token carries no claims");
            AuthError::MalformedToken("Token carries no claims".to_string())
        })?;

        // 2. Time window
        validate_time_window(claims.exp, claims.nbf, claims.iat, self.config.clock_skew).map_err(
            |e| match e {
                JwtValidationError::Expired => AuthError::Expired,
                JwtValidationError::NotYetValid | JwtValidationError::IatTooFarInFuture => {
                    AuthError::NotYetValid
                }
                other => AuthError::MalformedToken(other.to_string()),
            },
        )?;

        // 3. Scopes
        if !claims.has_all_scopes(&self.config.required_scopes) {
            tracing::debug!(
                target: "gate.auth.verifier",
                required = ?self.config.required_scopes,
                found = ?claims.scopes,
                "Token lacks required scopes"
            );
            return Err(AuthError::InsufficientScope {
                required: self.config.required_scopes.clone(),
                found: claims.scopes.clone(),
            });
        }

        // 4. Algorithm pinning
        let algorithm = pinned_algorithm(&header.alg)?;

        // 5. Custom validation
        if let Some(validator) = &self.config.custom_validator {
            validator.validate(&claims).map_err(|message| {
                tracing::debug!(target: "gate.auth.verifier", message = %message, "Custom validation failed");
                AuthError::CustomValidationFailed(message)
            })?;
        }

        // 6. Issuer and audience
        if !same_issuer(&claims.iss, &self.config.issuer) {
            tracing::warn!(
                target: "gate.auth.verifier",
                token_issuer = %claims.iss,
                "Token issuer does not match configured issuer"
            );
            return Err(AuthError::IssuerMismatch(claims.iss.clone()));
        }

        if let Some(audience) = &self.config.audience {
            if !claims.has_audience(audience) {
                tracing::debug!(target: "gate.auth.verifier", aud = ?claims.aud, "Token audience mismatch");
                return Err(AuthError::InvalidAudience);
            }
        }

        // 7. Signing key
        let kid = header.kid.ok_or_else(|| {
            tracing::debug!(target: "gate.auth.verifier", "Token header has no kid");
            AuthError::MissingKeyId
        })?;

        let key = self.key_cache.get_key(&claims.iss, &kid).await?;

        // 8. Signature, with the algorithm the key was published for
        if let Some(key_algorithm) = key.algorithm() {
            if key_algorithm != algorithm {
                tracing::warn!(
                    target: "gate.auth.verifier",
                    kid = %kid,
                    token_alg = %header.alg,
                    key_alg = ?key_algorithm,
                    "Token algorithm does not match the key's declared algorithm"
                );
                return Err(AuthError::UnsupportedAlgorithm(header.alg));
            }
        }

        let valid = jsonwebtoken::crypto::verify(
            &signature,
            signing_input.as_bytes(),
            key.decoding_key(),
            algorithm,
        )
        .unwrap_or_else(|e| {
            tracing::debug!(target: "gate.auth.verifier", error = %e, "Signature could not be checked");
            false
        });

        if !valid {
            tracing::debug!(target: "gate.auth.verifier", kid = %kid, "Token signature is invalid");
            return Err(AuthError::InvalidSignature);
        }

        tracing::debug!(target: "gate.auth.verifier", kid = %kid, "Token verified successfully");
        Ok(claims)
    }
}

/// Map a header `alg` to an accepted RSA algorithm.
///
/// # Errors
///
/// Returns `AuthError::UnsupportedAlgorithm` for anything outside the RSA
/// family, including `none`.
pub fn pinned_algorithm(alg: &str) -> Result<Algorithm, AuthError> {
    match alg {
        "RS256" => Ok(Algorithm::RS256),
        "RS384" => Ok(Algorithm::RS384),
        "RS512" => Ok(Algorithm::RS512),
        "PS256" => Ok(Algorithm::PS256),
        "PS384" => Ok(Algorithm::PS384),
        "PS512" => Ok(Algorithm::PS512),
        other => {
            tracing::warn!(target: "gate.auth.verifier", alg = %other, "Unexpected signing method");
            Err(AuthError::UnsupportedAlgorithm(other.to_string()))
        }
    }
}

/// Issuers match when equal apart from trailing slashes.
fn same_issuer(token_issuer: &str, expected: &str) -> bool {
    token_issuer.trim_end_matches('/') == expected.trim_end_matches('/')
}

fn record_outcome(result: &Result<Claims, AuthError>) {
    match result {
        Ok(_) => metrics::record_token_verification("success", None),
        Err(e) => metrics::record_token_verification("error", Some(e.kind())),
    }
}
