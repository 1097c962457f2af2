//! Signing key cache integration tests.
//!
//! Exercises `OidcKeyResolver` and `SigningKeyCache` against a mocked OIDC
//! issuer, counting discovery and JWKS fetches.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use gate_test_utils::{MockIssuer, TestKeypair, DISCOVERY_PATH, JWKS_PATH};
use oidc_gate::auth::{KeyResolver, OidcKeyResolver, SigningKeyCache};
use oidc_gate::errors::AuthError;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn cache(ttl: Duration) -> SigningKeyCache {
    SigningKeyCache::new(Arc::new(OidcKeyResolver::new()), ttl)
}

#[tokio::test]
async fn test_miss_fetches_discovery_and_jwks_once() {
    let issuer = MockIssuer::start().await;
    let primary = TestKeypair::primary();
    issuer.expect_discovery(1).await;
    issuer.expect_jwks(&[&primary], 1).await;

    let cache = cache(Duration::from_secs(60));
    let key = cache.get_key(&issuer.issuer(), primary.kid()).await.unwrap();

    assert_eq!(key.kid(), primary.kid());
    assert_eq!(key.modulus(), primary.modulus());
    assert_eq!(cache.len().await, 1);
    assert_eq!(issuer.request_count(DISCOVERY_PATH).await, 1);
    assert_eq!(issuer.request_count(JWKS_PATH).await, 1);
}

#[tokio::test]
async fn test_hit_within_ttl_makes_no_network_calls() {
    let issuer = MockIssuer::start().await;
    let primary = TestKeypair::primary();
    issuer.expect_discovery(1).await;
    issuer.expect_jwks(&[&primary], 1).await;

    let cache = cache(Duration::from_secs(60));
    let first = cache.get_key(&issuer.issuer(), primary.kid()).await.unwrap();
    let second = cache.get_key(&issuer.issuer(), primary.kid()).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(issuer.request_count(DISCOVERY_PATH).await, 1);
    assert_eq!(issuer.request_count(JWKS_PATH).await, 1);
}

#[tokio::test]
async fn test_re_resolves_after_ttl() {
    let issuer = MockIssuer::start().await;
    let primary = TestKeypair::primary();
    issuer.expect_discovery(2).await;
    issuer.expect_jwks(&[&primary], 2).await;

    let cache = cache(Duration::from_millis(100));
    cache.get_key(&issuer.issuer(), primary.kid()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    cache.get_key(&issuer.issuer(), primary.kid()).await.unwrap();
    assert_eq!(issuer.request_count(JWKS_PATH).await, 2);
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn test_rotated_key_is_picked_up_after_ttl() {
    let issuer = MockIssuer::start().await;
    let original = TestKeypair::primary().with_kid("rotating");
    let rotated = TestKeypair::secondary().with_kid("rotating");
    issuer.serve_keys(&[&original]).await;

    let cache = cache(Duration::from_millis(100));
    let first = cache.get_key(&issuer.issuer(), "rotating").await.unwrap();
    assert_eq!(first.modulus(), original.modulus());

    issuer.reset().await;
    issuer.serve_keys(&[&rotated]).await;

    // Still fresh: the old key is served
    let cached = cache.get_key(&issuer.issuer(), "rotating").await.unwrap();
    assert_eq!(cached.modulus(), original.modulus());

    tokio::time::sleep(Duration::from_millis(200)).await;

    let refreshed = cache.get_key(&issuer.issuer(), "rotating").await.unwrap();
    assert_eq!(refreshed.modulus(), rotated.modulus());
}

#[tokio::test]
async fn test_unknown_kid_is_key_not_found() {
    let issuer = MockIssuer::start().await;
    issuer.serve_keys(&[&TestKeypair::primary()]).await;

    let result = cache(Duration::from_secs(60))
        .get_key(&issuer.issuer(), "missing")
        .await;

    assert_eq!(
        result.unwrap_err(),
        AuthError::KeyNotFound {
            issuer: issuer.issuer(),
            kid: "missing".to_string(),
        }
    );
}

#[tokio::test]
async fn test_failures_are_retried_on_next_call() {
    let issuer = MockIssuer::start().await;
    let primary = TestKeypair::primary();
    issuer.fail_discovery(503, "maintenance").await;

    let cache = cache(Duration::from_secs(60));
    let err = cache
        .get_key(&issuer.issuer(), primary.kid())
        .await
        .unwrap_err();

    match err {
        AuthError::KeyResolutionFailed(message) => {
            assert!(message.contains("503"), "status missing from: {message}");
            assert!(message.contains("maintenance"), "body missing from: {message}");
        }
        other => panic!("expected KeyResolutionFailed, got {other:?}"),
    }
    assert!(cache.is_empty().await);

    issuer.reset().await;
    issuer.serve_keys(&[&primary]).await;

    assert!(cache.get_key(&issuer.issuer(), primary.kid()).await.is_ok());
}

#[tokio::test]
async fn test_non_rsa_key_is_unsupported() {
    let issuer = MockIssuer::start().await;
    issuer.expect_discovery(1).await;
    issuer
        .expect_raw_jwks(
            json!({
                "keys": [{
                    "kty": "EC",
                    "kid": "ec-key",
                    "crv": "P-256",
                    "x": "f83OJ3D2xF1Bg8vub9tLe1gHMzV76e8Tus9uPHvRVEU",
                    "y": "x_FEzRu9m36HLN_tue659LNpXW6pCyStikYjKIWI5a0"
                }]
            }),
            1,
        )
        .await;

    let result = cache(Duration::from_secs(60))
        .get_key(&issuer.issuer(), "ec-key")
        .await;

    assert!(matches!(result, Err(AuthError::UnsupportedKeyType(_))));
}

#[tokio::test]
async fn test_first_matching_kid_wins() {
    let issuer = MockIssuer::start().await;
    let first = TestKeypair::secondary().with_kid("dup");
    let second = TestKeypair::primary().with_kid("dup");
    issuer.serve_keys(&[&first, &second]).await;

    let key = OidcKeyResolver::new()
        .resolve(&issuer.issuer(), "dup")
        .await
        .unwrap();

    assert_eq!(key.modulus(), first.modulus());
}

#[tokio::test]
async fn test_issuer_trailing_slash_is_ignored() {
    let issuer = MockIssuer::start().await;
    let primary = TestKeypair::primary();
    issuer.serve_keys(&[&primary]).await;

    let key = OidcKeyResolver::new()
        .resolve(&format!("{}/", issuer.issuer()), primary.kid())
        .await
        .unwrap();

    assert_eq!(key.kid(), primary.kid());
}

#[tokio::test]
async fn test_malformed_discovery_is_resolution_failure() {
    let issuer = MockIssuer::start().await;
    issuer.fail_discovery(200, "not json").await;

    let result = OidcKeyResolver::new().resolve(&issuer.issuer(), "kid").await;

    assert!(matches!(result, Err(AuthError::KeyResolutionFailed(_))));
}

#[tokio::test]
async fn test_unreachable_issuer_is_resolution_failure() {
    // Port 9 (discard) on localhost is not expected to be listening
    let resolver = OidcKeyResolver::with_timeout(Duration::from_secs(2));

    let result = resolver.resolve("http://127.0.0.1:9", "kid").await;

    assert!(matches!(result, Err(AuthError::KeyResolutionFailed(_))));
}

#[tokio::test]
async fn test_slow_issuer_times_out() {
    let server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path(DISCOVERY_PATH))
        .respond_with(
            wiremock::ResponseTemplate::new(200)
                .set_body_json(json!({ "jwks_uri": format!("{}{}", server.uri(), JWKS_PATH) }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let resolver = OidcKeyResolver::with_timeout(Duration::from_millis(200));
    let started = std::time::Instant::now();

    let result = resolver.resolve(&server.uri(), "kid").await;

    assert!(matches!(result, Err(AuthError::KeyResolutionFailed(_))));
    assert!(started.elapsed() < Duration::from_secs(5));
}
