//! Authentication module for OIDC Gate.
//!
//! This module handles bearer token verification against keys published by
//! an OIDC issuer.
//!
//! # Components
//!
//! - `resolver` - OIDC discovery and JWKS fetch for a single key
//! - `cache` - Signing key cache keyed by (issuer, kid)
//! - `token` - Structural decoding of compact JWTs
//! - `verifier` - Ordered claim, algorithm and signature checks
//! - `claims` - JWT claims structure for validated tokens

pub mod cache;
pub mod claims;
pub mod resolver;
pub mod token;
pub mod verifier;

pub use cache::SigningKeyCache;
pub use claims::Claims;
pub use resolver::{KeyResolver, OidcKeyResolver, PublicKey};
pub use token::{decode_unverified, DecodedToken};
pub use verifier::{ClaimsValidator, TokenVerifier, VerificationConfig};
