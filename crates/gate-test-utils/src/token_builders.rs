//! Builder patterns for test data construction
//!
//! Provides a fluent API for creating signed (and deliberately broken) test
//! tokens.

use crate::crypto_fixtures::{TestKeypair, PRIMARY_KID};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, Header};
use serde_json::{json, Map, Value};

/// Default issuer for test tokens.
pub const TEST_ISSUER: &str = "https://issuer.test";

/// Builder for creating test JWTs
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .with_issuer("https://issuer.test")
///     .for_user("alice")
///     .with_scope("read")
///     .expires_in(3600)
///     .sign(&TestKeypair::primary());
/// ```
#[derive(Debug, Clone)]
pub struct TestTokenBuilder {
    iss: String,
    sub: String,
    scopes: Vec<String>,
    aud: Option<String>,
    /// `None` leaves `exp` out of the claims.
    exp: Option<i64>,
    iat: i64,
    nbf: Option<i64>,
    extra: Map<String, Value>,
    /// `None` uses the signing keypair's kid.
    kid: Option<String>,
    omit_kid: bool,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            iss: TEST_ISSUER.to_string(),
            sub: "test-subject".to_string(),
            scopes: Vec::new(),
            aud: None,
            exp: Some((now + Duration::seconds(3600)).timestamp()),
            iat: now.timestamp(),
            nbf: None,
            extra: Map::new(),
            kid: None,
            omit_kid: false,
        }
    }

    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.iss = issuer.to_string();
        self
    }

    /// Set the subject (user/service)
    pub fn for_user(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    /// Alias of [`Self::for_user`].
    pub fn with_subject(self, subject: &str) -> Self {
        self.for_user(subject)
    }

    /// Add a scope; the `scope` claim is emitted as a JSON array
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scopes.push(scope.to_string());
        self
    }

    pub fn with_audience(mut self, audience: &str) -> Self {
        self.aud = Some(audience.to_string());
        self
    }

    /// Set expiration in seconds from now (negative for an expired token)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Leave `exp` out of the claims entirely
    pub fn without_expiry(mut self) -> Self {
        self.exp = None;
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    /// Set not-before timestamp
    pub fn not_before(mut self, timestamp: i64) -> Self {
        self.nbf = Some(timestamp);
        self
    }

    /// Add an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    /// Override the header kid instead of using the signing key's
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = Some(kid.to_string());
        self.omit_kid = false;
        self
    }

    /// Leave the kid out of the header entirely
    pub fn without_kid(mut self) -> Self {
        self.omit_kid = true;
        self
    }

    /// Build the claims as a JSON value
    pub fn build(&self) -> Value {
        let mut claims = json!({
            "iss": self.iss,
            "sub": self.sub,
            "scope": self.scopes,
            "iat": self.iat,
        });

        if let Some(object) = claims.as_object_mut() {
            if let Some(exp) = self.exp {
                object.insert("exp".to_string(), json!(exp));
            }
            if let Some(aud) = &self.aud {
                object.insert("aud".to_string(), json!(aud));
            }
            if let Some(nbf) = self.nbf {
                object.insert("nbf".to_string(), json!(nbf));
            }
            for (name, value) in &self.extra {
                object.insert(name.clone(), value.clone());
            }
        }

        claims
    }

    /// Sign with RS256
    pub fn sign(&self, keypair: &TestKeypair) -> String {
        self.sign_with_algorithm(keypair, Algorithm::RS256)
    }

    /// Sign with any RSA algorithm (RS* or PS*)
    pub fn sign_with_algorithm(&self, keypair: &TestKeypair, algorithm: Algorithm) -> String {
        let mut header = Header::new(algorithm);
        header.kid = self.header_kid(keypair.kid());

        encode(&header, &self.build(), &keypair.encoding_key())
            .expect("Test token signing should succeed")
    }

    /// Token declaring `alg` with an empty signature segment
    ///
    /// Used for `none`, HMAC and other algorithms the gate must refuse.
    pub fn unsigned_with_alg(&self, alg: &str) -> String {
        let mut header = json!({ "alg": alg, "typ": "JWT" });
        if let (Some(object), Some(kid)) = (header.as_object_mut(), self.header_kid(PRIMARY_KID))
        {
            object.insert("kid".to_string(), json!(kid));
        }

        format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(self.build().to_string())
        )
    }

    /// Correctly signed token whose payload is JSON `null`
    pub fn null_payload(keypair: &TestKeypair) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(keypair.kid().to_string());

        encode(&header, &Value::Null, &keypair.encoding_key())
            .expect("Test token signing should succeed")
    }

    fn header_kid(&self, default_kid: &str) -> Option<String> {
        if self.omit_kid {
            None
        } else {
            Some(self.kid.clone().unwrap_or_else(|| default_kid.to_string()))
        }
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
