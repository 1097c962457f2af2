//! Observability for OIDC Gate.
//!
//! - `metrics` - Prometheus counters for the key cache and token verification

pub mod metrics;
