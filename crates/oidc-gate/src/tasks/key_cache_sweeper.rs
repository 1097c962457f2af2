//! Signing key cache sweeper background task.
//!
//! Lookups already ignore expired keys; the sweeper only reclaims memory for
//! keys that are never asked for again (rotated away, or from a token that
//! was rejected later in verification).
//!
//! # Graceful Shutdown
//!
//! The task supports graceful shutdown via a cancellation token. When the token
//! is cancelled, the task completes its current iteration and exits cleanly.

use crate::auth::SigningKeyCache;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Run the sweeper loop until `cancel_token` is cancelled.
///
/// # Arguments
///
/// * `cache` - Cache to purge
/// * `interval` - Time between sweeps
/// * `cancel_token` - Token for graceful shutdown
#[instrument(skip_all, name = "gate.task.key_cache_sweeper")]
pub async fn start_key_cache_sweeper(
    cache: Arc<SigningKeyCache>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "gate.task.key_cache_sweeper",
        interval_seconds = interval.as_secs(),
        "Starting key cache sweeper"
    );

    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately; nothing can have expired yet
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let purged = cache.purge_expired().await;
                if purged > 0 {
                    info!(target: "gate.task.key_cache_sweeper", purged = purged, "Purged expired signing keys");
                } else {
                    debug!(target: "gate.task.key_cache_sweeper", "No expired signing keys");
                }
            }
            _ = cancel_token.cancelled() => {
                info!(target: "gate.task.key_cache_sweeper", "Key cache sweeper received shutdown signal, exiting");
                break;
            }
        }
    }
}
