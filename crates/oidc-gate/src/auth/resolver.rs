//! Signing key resolution via OIDC discovery and JWKS.
//!
//! For an issuer and key ID, the resolver fetches the issuer's
//! `/.well-known/openid-configuration` document, follows its `jwks_uri`,
//! and returns the RSA public key whose `kid` matches.
//!
//! # Security
//!
//! - Only RSA signing keys are accepted; any other key type is rejected
//! - Failures are surfaced once and never retried here; retry policy
//!   belongs to the caller (the key cache retries on the next lookup)
//! - HTTPS should be used in production (enforced by issuer configuration)

use crate::errors::AuthError;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::instrument;

/// Path of the OIDC discovery document relative to the issuer.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Default timeout for discovery and JWKS requests in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Map a JWK `alg` member to an RSA signature algorithm.
fn rsa_algorithm(alg: &str) -> Option<Algorithm> {
    match alg {
        "RS256" => Some(Algorithm::RS256),
        "RS384" => Some(Algorithm::RS384),
        "RS512" => Some(Algorithm::RS512),
        "PS256" => Some(Algorithm::PS256),
        "PS384" => Some(Algorithm::PS384),
        "PS512" => Some(Algorithm::PS512),
        _ => None,
    }
}

/// An RSA public key usable for signature verification.
#[derive(Clone)]
pub struct PublicKey {
    kid: String,
    modulus: String,
    exponent: String,
    /// Algorithm the issuer bound this key to, if it declared one.
    algorithm: Option<Algorithm>,
    decoding_key: DecodingKey,
}

impl PublicKey {
    /// Build a key from base64url-encoded RSA modulus and exponent.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnsupportedKeyType` if the components are not
    /// valid base64url.
    pub fn from_rsa_components(kid: &str, modulus: &str, exponent: &str) -> Result<Self, AuthError> {
        let decoding_key = DecodingKey::from_rsa_components(modulus, exponent).map_err(|e| {
            tracing::warn!(target: "gate.auth.resolver", kid = %kid, error = %e, "Invalid RSA key components");
            AuthError::UnsupportedKeyType(format!("invalid RSA key components: {e}"))
        })?;

        Ok(Self {
            kid: kid.to_string(),
            modulus: modulus.to_string(),
            exponent: exponent.to_string(),
            algorithm: None,
            decoding_key,
        })
    }

    /// Restrict the key to a single signature algorithm.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Algorithm the key is restricted to; `None` allows any RSA algorithm.
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    /// Key ID this key was published under.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Base64url-encoded RSA modulus.
    pub fn modulus(&self) -> &str {
        &self.modulus
    }

    /// Key handle for the signature primitive.
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.kid == other.kid && self.modulus == other.modulus && self.exponent == other.exponent
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("kid", &self.kid)
            .field("modulus_len", &self.modulus.len())
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Resolves an (issuer, key ID) pair to a public key.
///
/// The production implementation is [`OidcKeyResolver`]; tests substitute
/// counting or failing resolvers.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Resolve the key published by `issuer` under `kid`.
    async fn resolve(&self, issuer: &str, kid: &str) -> Result<PublicKey, AuthError>;
}

/// OIDC discovery document. Only the JWKS location is needed.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryDocument {
    /// URL of the issuer's JSON Web Key Set.
    pub jwks_uri: String,
}

/// JSON Web Key from a JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" for supported keys).
    #[serde(default)]
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// RSA modulus (base64url encoded).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url encoded).
    #[serde(default)]
    pub e: Option<String>,

    /// Algorithm the key is intended for.
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

impl Jwk {
    /// Convert to a verification key, rejecting anything but RSA signing keys.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnsupportedKeyType` describing the mismatch.
    pub fn to_public_key(&self) -> Result<PublicKey, AuthError> {
        let kid = self.kid.as_deref().unwrap_or_default();

        if self.kty != "RSA" {
            tracing::warn!(target: "gate.auth.resolver", kid = %kid, kty = %self.kty, "Unexpected JWK key type");
            return Err(AuthError::UnsupportedKeyType(format!(
                "key type {} is not RSA",
                self.kty
            )));
        }

        if let Some(key_use) = &self.key_use {
            if key_use != "sig" {
                tracing::warn!(target: "gate.auth.resolver", kid = %kid, key_use = %key_use, "JWK is not a signing key");
                return Err(AuthError::UnsupportedKeyType(format!(
                    "key use {key_use} is not sig"
                )));
            }
        }

        let algorithm = match &self.alg {
            Some(alg) => match rsa_algorithm(alg) {
                Some(algorithm) => Some(algorithm),
                None => {
                    tracing::warn!(target: "gate.auth.resolver", kid = %kid, alg = %alg, "Unexpected JWK algorithm");
                    return Err(AuthError::UnsupportedKeyType(format!(
                        "key algorithm {alg} is not an RSA signature algorithm"
                    )));
                }
            },
            None => None,
        };

        match (&self.n, &self.e) {
            (Some(n), Some(e)) => {
                let key = PublicKey::from_rsa_components(kid, n, e)?;
                Ok(match algorithm {
                    Some(algorithm) => key.with_algorithm(algorithm),
                    None => key,
                })
            }
            _ => {
                tracing::warn!(target: "gate.auth.resolver", kid = %kid, "JWK missing n or e field");
                Err(AuthError::UnsupportedKeyType(
                    "RSA key is missing its modulus or exponent".to_string(),
                ))
            }
        }
    }
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksDocument {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

impl JwksDocument {
    /// First key whose `kid` equals `kid`, in document order.
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|key| key.kid.as_deref() == Some(kid))
    }
}

/// Build the discovery URL for an issuer, ignoring trailing slashes.
pub fn discovery_url(issuer: &str) -> String {
    format!("{}{}", issuer.trim_end_matches('/'), DISCOVERY_PATH)
}

/// Key resolver performing OIDC discovery then a JWKS fetch over HTTP.
pub struct OidcKeyResolver {
    /// HTTP client for discovery and JWKS requests.
    http_client: reqwest::Client,
}

impl OidcKeyResolver {
    /// Create a resolver with the default request timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECONDS))
    }

    /// Create a resolver whose requests time out after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gate.auth.resolver", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self { http_client }
    }

    /// GET `url` and decode the JSON body.
    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, AuthError> {
        tracing::debug!(target: "gate.auth.resolver", url = %url, "Fetching document");

        let response = self.http_client.get(url).send().await.map_err(|e| {
            tracing::error!(target: "gate.auth.resolver", url = %url, error = %e, "Request failed");
            AuthError::KeyResolutionFailed(format!("Unable to GET {url}: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| e.to_string());
            tracing::error!(
                target: "gate.auth.resolver",
                url = %url,
                status = %status,
                "Endpoint returned error"
            );
            return Err(AuthError::KeyResolutionFailed(format!(
                "Unable to GET {url}: response status was [{status}] and body was: {body}"
            )));
        }

        response.json::<T>().await.map_err(|e| {
            tracing::error!(target: "gate.auth.resolver", url = %url, error = %e, "Failed to parse response");
            AuthError::KeyResolutionFailed(format!("Unable to deserialize response from {url}: {e}"))
        })
    }
}

impl Default for OidcKeyResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyResolver for OidcKeyResolver {
    #[instrument(skip(self), fields(issuer = %issuer, kid = %kid))]
    async fn resolve(&self, issuer: &str, kid: &str) -> Result<PublicKey, AuthError> {
        let discovery: DiscoveryDocument = self.fetch_json(&discovery_url(issuer)).await?;

        let jwks: JwksDocument = self.fetch_json(&discovery.jwks_uri).await?;

        let jwk = jwks.find(kid).ok_or_else(|| {
            tracing::warn!(target: "gate.auth.resolver", kid = %kid, key_count = jwks.keys.len(), "Key not found in JWKS");
            AuthError::KeyNotFound {
                issuer: issuer.to_string(),
                kid: kid.to_string(),
            }
        })?;

        let key = jwk.to_public_key()?;

        tracing::info!(target: "gate.auth.resolver", kid = %kid, "Signing key resolved");
        Ok(key)
    }
}
