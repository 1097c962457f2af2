//! Metrics definitions for OIDC Gate.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gate_` prefix
//! - `_total` suffix for counters
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `result`: 2 values (hit, miss)
//! - `status`: 2 values (success, error)
//! - `error_type`: bounded by `AuthError` variants (see `AuthError::kind`)
//!
//! Issuers and key IDs are never used as labels.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record a signing key cache lookup
///
/// Metric: `gate_key_cache_lookups_total`
/// Labels: `result`
pub fn record_key_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("gate_key_cache_lookups_total", "result" => result).increment(1);
}

/// Record a key resolution (discovery + JWKS fetch) outcome
///
/// Metric: `gate_key_resolutions_total`
/// Labels: `status`
pub fn record_key_resolution(success: bool) {
    let status = if success { "success" } else { "error" };
    counter!("gate_key_resolutions_total", "status" => status).increment(1);
}

/// Record a token verification outcome
///
/// Metric: `gate_token_verifications_total`
/// Labels: `status`, `error_type`
pub fn record_token_verification(status: &str, error_type: Option<&'static str>) {
    counter!("gate_token_verifications_total",
        "status" => status.to_string(),
        "error_type" => error_type.unwrap_or("none")
    )
    .increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    /// Sum every counter named `name` whose labels include all of `labels`.
    fn counter_value(recorder: &DebuggingRecorder, name: &str, labels: &[(&str, &str)]) -> u64 {
        recorder
            .snapshotter()
            .snapshot()
            .into_vec()
            .into_iter()
            .filter(|(key, _, _, _)| key.key().name() == name)
            .filter(|(key, _, _, _)| {
                labels.iter().all(|(k, v)| {
                    key.key()
                        .labels()
                        .any(|label| label.key() == *k && label.value() == *v)
                })
            })
            .map(|(_, _, _, value)| match value {
                DebugValue::Counter(c) => c,
                _ => 0,
            })
            .sum()
    }

    #[test]
    fn test_record_key_cache_lookup() {
        let recorder = DebuggingRecorder::new();

        metrics::with_local_recorder(&recorder, || {
            record_key_cache_lookup(true);
            record_key_cache_lookup(true);
            record_key_cache_lookup(false);
        });

        assert_eq!(
            counter_value(&recorder, "gate_key_cache_lookups_total", &[("result", "hit")]),
            2
        );
        assert_eq!(
            counter_value(&recorder, "gate_key_cache_lookups_total", &[("result", "miss")]),
            1
        );
    }

    #[test]
    fn test_record_key_resolution() {
        let recorder = DebuggingRecorder::new();

        metrics::with_local_recorder(&recorder, || {
            record_key_resolution(true);
            record_key_resolution(false);
        });

        assert_eq!(
            counter_value(&recorder, "gate_key_resolutions_total", &[("status", "success")]),
            1
        );
        assert_eq!(
            counter_value(&recorder, "gate_key_resolutions_total", &[("status", "error")]),
            1
        );
    }

    #[test]
    fn test_record_token_verification_labels() {
        let recorder = DebuggingRecorder::new();

        metrics::with_local_recorder(&recorder, || {
            record_token_verification("success", None);
            record_token_verification("error", Some("expired"));
            record_token_verification("error", Some("expired"));
        });

        assert_eq!(
            counter_value(
                &recorder,
                "gate_token_verifications_total",
                &[("status", "success"), ("error_type", "none")]
            ),
            1
        );
        assert_eq!(
            counter_value(
                &recorder,
                "gate_token_verifications_total",
                &[("status", "error"), ("error_type", "expired")]
            ),
            2
        );
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        // The global no-op recorder accepts everything
        record_key_cache_lookup(true);
        record_key_resolution(false);
        record_token_verification("error", Some("invalid_signature"));
    }
}
