//! Common utilities and types shared across OIDC Gate components.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (segment decoding, time window checks, constants)
pub mod jwt;
