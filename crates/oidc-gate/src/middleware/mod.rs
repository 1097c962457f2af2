//! Middleware for OIDC Gate.
//!
//! # Components
//!
//! - `auth` - Authentication gate attaching verified claims to requests

pub mod auth;

pub use auth::{
    authenticate, bearer_token, token_from_header, AuthState, ClaimsExt, UnauthenticatedPolicy,
    CLAIMS_KEY,
};
