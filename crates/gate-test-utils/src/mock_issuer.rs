//! Mock OIDC issuer backed by wiremock
//!
//! Serves `/.well-known/openid-configuration` pointing at `/keys`, and a JWKS
//! document at `/keys`. Expectations set with the `expect_*` methods are
//! verified when the issuer is dropped.

use crate::crypto_fixtures::TestKeypair;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Discovery document path, relative to the issuer.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// JWKS path advertised by the mock discovery document.
pub const JWKS_PATH: &str = "/keys";

/// A running mock OIDC issuer.
pub struct MockIssuer {
    server: MockServer,
}

impl MockIssuer {
    /// Start a mock issuer on a random local port
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Issuer URL (no trailing slash)
    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    pub fn jwks_uri(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Serve discovery and JWKS for `keys` with no call-count expectations
    pub async fn serve_keys(&self, keys: &[&TestKeypair]) {
        self.mount(DISCOVERY_PATH, ResponseTemplate::new(200).set_body_json(self.discovery()), None)
            .await;
        self.mount(JWKS_PATH, ResponseTemplate::new(200).set_body_json(jwks(keys)), None)
            .await;
    }

    /// Serve discovery, expecting exactly `times` requests
    pub async fn expect_discovery(&self, times: u64) {
        self.mount(
            DISCOVERY_PATH,
            ResponseTemplate::new(200).set_body_json(self.discovery()),
            Some(times),
        )
        .await;
    }

    /// Serve JWKS for `keys`, expecting exactly `times` requests
    pub async fn expect_jwks(&self, keys: &[&TestKeypair], times: u64) {
        self.mount(
            JWKS_PATH,
            ResponseTemplate::new(200).set_body_json(jwks(keys)),
            Some(times),
        )
        .await;
    }

    /// Serve a raw JWKS document, expecting exactly `times` requests
    pub async fn expect_raw_jwks(&self, document: Value, times: u64) {
        self.mount(
            JWKS_PATH,
            ResponseTemplate::new(200).set_body_json(document),
            Some(times),
        )
        .await;
    }

    /// Answer discovery with `status` and a plain-text body
    pub async fn fail_discovery(&self, status: u16, body: &str) {
        self.mount(
            DISCOVERY_PATH,
            ResponseTemplate::new(status).set_body_string(body),
            None,
        )
        .await;
    }

    /// Drop every mounted response and expectation
    pub async fn reset(&self) {
        self.server.reset().await;
    }

    /// Number of requests received for `request_path`
    pub async fn request_count(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == request_path)
            .count()
    }

    fn discovery(&self) -> Value {
        json!({
            "issuer": self.issuer(),
            "jwks_uri": self.jwks_uri(),
            "id_token_signing_alg_values_supported": ["RS256"],
        })
    }

    async fn mount(&self, request_path: &str, response: ResponseTemplate, times: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(response);
        let mock = match times {
            Some(times) => mock.expect(times),
            None => mock,
        };
        mock.mount(&self.server).await;
    }
}

/// JWKS document publishing the public halves of `keys`, in order
pub fn jwks(keys: &[&TestKeypair]) -> Value {
    json!({
        "keys": keys.iter().map(|key| key.jwk()).collect::<Vec<_>>(),
    })
}
