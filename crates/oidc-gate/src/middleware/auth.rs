//! Authentication gate for incoming requests.
//!
//! Extracts the bearer token from the `Authorization` header, verifies it,
//! and on success stores the claims in request extensions for downstream
//! handlers. What happens on failure depends on [`UnauthenticatedPolicy`].

use crate::auth::{Claims, TokenVerifier};
use crate::errors::GateError;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::instrument;

/// Name of the per-request slot holding verified claims.
///
/// Claims are stored in request extensions keyed by the [`Claims`] type;
/// this name identifies the slot in logs and documentation.
pub const CLAIMS_KEY: &str = "claims";

/// Length of `"Bearer "`.
const BEARER_PREFIX_LEN: usize = 7;

/// What the gate does with a request that carries no valid token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnauthenticatedPolicy {
    /// Forward the request without claims. Downstream handlers decide.
    #[default]
    PassThrough,

    /// Answer `401 Unauthorized` without calling the handler.
    Reject,
}

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Token verifier with its signing key cache.
    pub verifier: Arc<TokenVerifier>,

    /// Handling of missing or invalid tokens.
    pub policy: UnauthenticatedPolicy,
}

impl AuthState {
    pub fn new(verifier: Arc<TokenVerifier>, policy: UnauthenticatedPolicy) -> Self {
        Self { verifier, policy }
    }
}

/// Extract the bearer token from request headers.
///
/// Returns an empty string when the header is absent, not valid UTF-8, or
/// not a bearer credential.
pub fn token_from_header(headers: &HeaderMap) -> &str {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(bearer_token)
        .unwrap_or_default()
}

/// Extract the token from an `Authorization` header value.
///
/// The scheme is matched case-insensitively and must be followed by exactly
/// one space and a non-empty token. Anything else yields an empty string.
pub fn bearer_token(header_value: &str) -> &str {
    if header_value.len() <= BEARER_PREFIX_LEN {
        return "";
    }

    let scheme_matches = header_value
        .get(..BEARER_PREFIX_LEN - 1)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("bearer"));
    let separator_matches = header_value.get(BEARER_PREFIX_LEN - 1..BEARER_PREFIX_LEN) == Some(" ");

    if !(scheme_matches && separator_matches) {
        return "";
    }

    header_value.get(BEARER_PREFIX_LEN..).unwrap_or_default()
}

/// Authentication middleware.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - Valid token: claims are inserted into request extensions and the
///   request continues
/// - Missing or invalid token with `PassThrough`: the request continues
///   without claims
/// - Missing or invalid token with `Reject`: 401 Unauthorized with a
///   WWW-Authenticate header
#[instrument(skip(state, req, next), name = "gate.middleware.auth")]
pub async fn authenticate(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Response {
    // Never trust claims attached before the gate ran
    req.extensions_mut().remove::<Claims>();

    let token = token_from_header(req.headers()).to_string();

    if token.is_empty() {
        tracing::debug!(target: "gate.middleware.auth", "No bearer token on request");
        return match state.policy {
            UnauthenticatedPolicy::PassThrough => next.run(req).await,
            UnauthenticatedPolicy::Reject => GateError::MissingToken.into_response(),
        };
    }

    match state.verifier.verify(&token).await {
        Ok(claims) => {
            tracing::debug!(target: "gate.middleware.auth", slot = CLAIMS_KEY, "Attaching verified claims");
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            tracing::info!(
                target: "gate.middleware.auth",
                error_type = e.kind(),
                error = %e,
                "Bearer token rejected"
            );
            match state.policy {
                UnauthenticatedPolicy::PassThrough => next.run(req).await,
                UnauthenticatedPolicy::Reject => GateError::Unauthorized(e).into_response(),
            }
        }
    }
}

/// Extension trait for extracting claims from request.
///
/// Provides a convenient method for handlers to get the authenticated claims.
pub trait ClaimsExt {
    /// Get the authenticated claims from request extensions.
    ///
    /// Returns `None` if the request is unauthenticated.
    fn claims(&self) -> Option<&Claims>;
}

impl<B> ClaimsExt for axum::extract::Request<B> {
    fn claims(&self) -> Option<&Claims> {
        self.extensions().get::<Claims>()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::resolver::{KeyResolver, PublicKey};
    use crate::auth::VerificationConfig;
    use crate::errors::AuthError;
    use async_trait::async_trait;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use gate_test_utils::{TestKeypair, TestTokenBuilder};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const ISSUER: &str = "https://issuer.example";

    struct PrimaryKeyResolver;

    #[async_trait]
    impl KeyResolver for PrimaryKeyResolver {
        async fn resolve(&self, _issuer: &str, kid: &str) -> Result<PublicKey, AuthError> {
            let keypair = TestKeypair::primary();
            PublicKey::from_rsa_components(kid, keypair.modulus(), keypair.exponent())
        }
    }

    async fn echo_subject(req: Request) -> String {
        match req.claims() {
            Some(claims) => format!("sub={}", claims.sub),
            None => "anonymous".to_string(),
        }
    }

    fn app(policy: UnauthenticatedPolicy) -> Router {
        let verifier = Arc::new(TokenVerifier::with_resolver(
            VerificationConfig::new(ISSUER),
            Arc::new(PrimaryKeyResolver),
        ));
        let state = Arc::new(AuthState::new(verifier, policy));

        Router::new()
            .route("/", get(echo_subject))
            .layer(middleware::from_fn_with_state(state, authenticate))
    }

    async fn call(app: Router, authorization: Option<&str>) -> (StatusCode, String) {
        let mut builder = axum::http::Request::builder().uri("/");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), "abc.def.ghi");
        assert_eq!(bearer_token("bearer abc"), "abc");
        assert_eq!(bearer_token("BEARER abc"), "abc");
        assert_eq!(bearer_token("BeArEr abc"), "abc");
    }

    #[test]
    fn test_bearer_token_rejects_other_forms() {
        assert_eq!(bearer_token(""), "");
        assert_eq!(bearer_token("Bearer"), "");
        assert_eq!(bearer_token("Bearer "), "");
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), "");
        assert_eq!(bearer_token("Bearerabc"), "");
        assert_eq!(bearer_token("Bearer\tabc"), "");
        assert_eq!(bearer_token("Beärer abc"), "");
    }

    #[test]
    fn test_token_from_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(token_from_header(&headers), "");

        headers.insert(AUTHORIZATION, "Bearer xyz".parse().unwrap());
        assert_eq!(token_from_header(&headers), "xyz");
    }

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }

    #[test]
    fn test_default_policy_is_pass_through() {
        assert_eq!(UnauthenticatedPolicy::default(), UnauthenticatedPolicy::PassThrough);
    }

    #[tokio::test]
    async fn test_missing_token_passes_through() {
        let (status, body) = call(app(UnauthenticatedPolicy::PassThrough), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");
    }

    #[tokio::test]
    async fn test_valid_token_attaches_claims() {
        let jwt = TestTokenBuilder::new()
            .with_issuer(ISSUER)
            .with_subject("user-42")
            .sign(&TestKeypair::primary());

        let (status, body) = call(
            app(UnauthenticatedPolicy::PassThrough),
            Some(&format!("Bearer {jwt}")),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "sub=user-42");
    }

    #[tokio::test]
    async fn test_invalid_token_passes_through_without_claims() {
        let jwt = TestTokenBuilder::new()
            .with_issuer(ISSUER)
            .expires_in(-10)
            .sign(&TestKeypair::primary());

        let (status, body) = call(
            app(UnauthenticatedPolicy::PassThrough),
            Some(&format!("Bearer {jwt}")),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");
    }

    #[tokio::test]
    async fn test_reject_policy_returns_401() {
        let (status, _) = call(app(UnauthenticatedPolicy::Reject), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(app(UnauthenticatedPolicy::Reject), Some("Bearer not-a-jwt")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("INVALID_TOKEN"));
    }
}
