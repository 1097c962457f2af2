//! # Gate Test Utilities
//!
//! Shared test utilities for OIDC Gate.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed RSA keys for reproducible tests)
//! - Test data builders (TestTokenBuilder)
//! - A mock OIDC issuer serving discovery and JWKS documents
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gate_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let issuer = MockIssuer::start().await;
//!     issuer.serve_keys(&[&TestKeypair::primary()]).await;
//!
//!     let token = TestTokenBuilder::new()
//!         .with_issuer(&issuer.issuer())
//!         .with_scope("read")
//!         .sign(&TestKeypair::primary());
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_issuer;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_issuer::*;
pub use token_builders::*;
