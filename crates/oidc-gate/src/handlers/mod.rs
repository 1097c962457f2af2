//! HTTP request handlers for OIDC Gate.

pub mod health;
pub mod hello;
pub mod me;
pub mod metrics;

pub use health::health_check;
pub use hello::hello;
pub use me::get_me;
pub use metrics::metrics_handler;
