//! Background tasks for OIDC Gate.
//!
//! - `key_cache_sweeper` - Periodically purges expired signing keys

pub mod key_cache_sweeper;

pub use key_cache_sweeper::start_key_cache_sweeper;
