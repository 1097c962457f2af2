//! HTTP routes for OIDC Gate.
//!
//! Defines the Axum router and application state.

use crate::auth::TokenVerifier;
use crate::config::Config;
use crate::handlers;
use crate::middleware::{authenticate, AuthState, UnauthenticatedPolicy};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Token verifier shared with the authentication gate.
    pub verifier: Arc<TokenVerifier>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/` - Greeting - behind the authentication gate
/// - `/v1/me` - Current caller's claims - behind the authentication gate
/// - TraceLayer for request logging
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let policy = if state.config.reject_unauthenticated {
        UnauthenticatedPolicy::Reject
    } else {
        UnauthenticatedPolicy::PassThrough
    };
    let auth_state = Arc::new(AuthState::new(Arc::clone(&state.verifier), policy));

    // Public routes (no authentication)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Gated routes: claims are attached when the token verifies
    let gated_routes = Router::new()
        .route("/", get(handlers::hello))
        .route("/v1/me", get(handlers::get_me))
        .route_layer(middleware::from_fn_with_state(auth_state, authenticate));

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    public_routes
        .merge(metrics_routes)
        .merge(gated_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}
