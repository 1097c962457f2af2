//! OIDC Gate Library
//!
//! Authenticates HTTP requests carrying an OAuth2/OIDC bearer token. The
//! token's signature is checked against a key fetched from the issuer's
//! JWKS endpoint (via OIDC discovery) and cached per (issuer, key ID).
//!
//! # Architecture
//!
//! ```text
//! middleware::auth -> auth::verifier -> auth::cache -> auth::resolver
//! ```
//!
//! # Modules
//!
//! - `auth` - Token decoding, verification and the signing key cache
//! - `config` - Service configuration from environment
//! - `errors` - Verification errors and their HTTP mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication gate
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup
//! - `tasks` - Background tasks

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod tasks;
