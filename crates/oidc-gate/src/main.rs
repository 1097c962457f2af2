//! OIDC Gate
//!
//! Demo service protecting a greeting and a `/v1/me` endpoint with bearer
//! token authentication against a single OIDC issuer.

use oidc_gate::auth::{OidcKeyResolver, SigningKeyCache, TokenVerifier};
use oidc_gate::config::Config;
use oidc_gate::observability::metrics::init_metrics_recorder;
use oidc_gate::routes::{self, AppState};
use oidc_gate::tasks::start_key_cache_sweeper;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oidc_gate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting OIDC Gate");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        issuer = %config.issuer,
        bind_address = %config.bind_address,
        required_scopes = ?config.required_scopes,
        key_cache_ttl_seconds = config.key_cache_ttl_seconds,
        reject_unauthenticated = config.reject_unauthenticated,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics: {}", e);
        anyhow::anyhow!(e)
    })?;

    // Build the verification pipeline
    let resolver = Arc::new(OidcKeyResolver::with_timeout(Duration::from_secs(
        config.key_fetch_timeout_seconds,
    )));
    let verification = config.verification_config();
    let mut key_cache = SigningKeyCache::new(resolver, verification.key_cache_ttl);
    if let Some(max_entries) = config.key_cache_max_entries {
        key_cache = key_cache.with_max_entries(max_entries);
    }
    let key_cache = Arc::new(key_cache);
    let verifier = Arc::new(TokenVerifier::with_cache(verification, Arc::clone(&key_cache)));

    // Background sweeper for expired keys
    let cancel_token = CancellationToken::new();
    let sweeper = tokio::spawn(start_key_cache_sweeper(
        key_cache,
        Duration::from_secs(config.key_cache_sweep_interval_seconds),
        cancel_token.clone(),
    ));

    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState { config, verifier });
    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("OIDC Gate listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel_token.cancel();
    if let Err(e) = sweeper.await {
        error!("Key cache sweeper task failed: {}", e);
    }

    info!("OIDC Gate shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
