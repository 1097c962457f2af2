//! OIDC Gate configuration.
//!
//! Configuration is loaded from environment variables. Only the issuer is
//! required; everything else has a default.

use crate::auth::cache::{DEFAULT_KEY_CACHE_TTL_SECONDS, MAX_KEY_CACHE_TTL_SECONDS};
use crate::auth::resolver::DEFAULT_FETCH_TIMEOUT_SECONDS;
use crate::auth::verifier::VerificationConfig;
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default interval between expired-key sweeps in seconds.
pub const DEFAULT_KEY_CACHE_SWEEP_INTERVAL_SECONDS: u64 = 300;

/// OIDC Gate configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Issuer whose tokens are accepted.
    pub issuer: String,

    /// Scopes every token must carry.
    pub required_scopes: Vec<String>,

    /// Audience tokens must be issued for, if set.
    pub audience: Option<String>,

    /// Signing key freshness in seconds (default: 86400).
    pub key_cache_ttl_seconds: u64,

    /// Upper bound on cached keys, unbounded when `None`.
    pub key_cache_max_entries: Option<usize>,

    /// Interval between expired-key sweeps in seconds (default: 300).
    pub key_cache_sweep_interval_seconds: u64,

    /// Timeout for discovery and JWKS requests in seconds (default: 10).
    pub key_fetch_timeout_seconds: u64,

    /// JWT clock skew tolerance in seconds for `nbf`/`iat` validation.
    pub jwt_clock_skew_seconds: u64,

    /// Reject unauthenticated requests instead of passing them through.
    pub reject_unauthenticated: bool,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid issuer configuration: {0}")]
    InvalidIssuer(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid key cache configuration: {0}")]
    InvalidKeyCache(String),

    #[error("Invalid key fetch timeout configuration: {0}")]
    InvalidKeyFetchTimeout(String),

    #[error("Invalid boolean value for {0}: {1}")]
    InvalidBool(String, String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let issuer = vars
            .get("OIDC_ISSUER")
            .ok_or_else(|| ConfigError::MissingEnvVar("OIDC_ISSUER".to_string()))?
            .trim()
            .to_string();

        if !(issuer.starts_with("https://") || issuer.starts_with("http://")) {
            return Err(ConfigError::InvalidIssuer(format!(
                "OIDC_ISSUER must be an http(s) URL, got '{}'",
                issuer
            )));
        }

        if issuer.starts_with("http://") {
            tracing::warn!(target: "gate.config", issuer = %issuer, "OIDC_ISSUER is not HTTPS; use only for local testing");
        }

        let required_scopes = vars
            .get("REQUIRED_SCOPES")
            .map(|value| parse_scopes(value))
            .unwrap_or_default();

        let audience = vars
            .get("OIDC_AUDIENCE")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let key_cache_ttl_seconds = parse_positive(
            vars,
            "KEY_CACHE_TTL_SECONDS",
            DEFAULT_KEY_CACHE_TTL_SECONDS,
            ConfigError::InvalidKeyCache,
        )?;

        if key_cache_ttl_seconds > MAX_KEY_CACHE_TTL_SECONDS {
            return Err(ConfigError::InvalidKeyCache(format!(
                "KEY_CACHE_TTL_SECONDS must not exceed {} seconds, got {}",
                MAX_KEY_CACHE_TTL_SECONDS, key_cache_ttl_seconds
            )));
        }

        let key_cache_max_entries = match vars.get("KEY_CACHE_MAX_ENTRIES") {
            Some(value_str) => {
                let value: usize = value_str.parse().map_err(|e| {
                    ConfigError::InvalidKeyCache(format!(
                        "KEY_CACHE_MAX_ENTRIES must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidKeyCache(
                        "KEY_CACHE_MAX_ENTRIES must be greater than 0".to_string(),
                    ));
                }

                Some(value)
            }
            None => None,
        };

        let key_cache_sweep_interval_seconds = parse_positive(
            vars,
            "KEY_CACHE_SWEEP_INTERVAL_SECONDS",
            DEFAULT_KEY_CACHE_SWEEP_INTERVAL_SECONDS,
            ConfigError::InvalidKeyCache,
        )?;

        let key_fetch_timeout_seconds = parse_positive(
            vars,
            "KEY_FETCH_TIMEOUT_SECONDS",
            DEFAULT_FETCH_TIMEOUT_SECONDS,
            ConfigError::InvalidKeyFetchTimeout,
        )?;

        let jwt_clock_skew_seconds = parse_positive(
            vars,
            "JWT_CLOCK_SKEW_SECONDS",
            DEFAULT_CLOCK_SKEW.as_secs(),
            ConfigError::InvalidJwtClockSkew,
        )?;

        if jwt_clock_skew_seconds > MAX_CLOCK_SKEW.as_secs() {
            return Err(ConfigError::InvalidJwtClockSkew(format!(
                "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                MAX_CLOCK_SKEW.as_secs(),
                jwt_clock_skew_seconds
            )));
        }

        let reject_unauthenticated = match vars.get("REJECT_UNAUTHENTICATED") {
            Some(value) => parse_bool("REJECT_UNAUTHENTICATED", value)?,
            None => false,
        };

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        Ok(Config {
            issuer,
            required_scopes,
            audience,
            key_cache_ttl_seconds,
            key_cache_max_entries,
            key_cache_sweep_interval_seconds,
            key_fetch_timeout_seconds,
            jwt_clock_skew_seconds,
            reject_unauthenticated,
            bind_address,
        })
    }

    /// Verification settings derived from this configuration.
    ///
    /// A custom validator, if any, is attached by the caller.
    pub fn verification_config(&self) -> VerificationConfig {
        let config = VerificationConfig::new(self.issuer.clone())
            .with_required_scopes(self.required_scopes.clone())
            .with_key_cache_ttl(Duration::from_secs(self.key_cache_ttl_seconds))
            .with_clock_skew(Duration::from_secs(self.jwt_clock_skew_seconds));

        match &self.audience {
            Some(audience) => config.with_audience(audience.clone()),
            None => config,
        }
    }
}

/// Split a scope list on whitespace and commas, dropping empties.
fn parse_scopes(value: &str) -> Vec<String> {
    value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a strictly positive integer variable, falling back to `default`.
fn parse_positive(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    error: fn(String) -> ConfigError,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        error(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(error(format!("{} must be greater than 0", name)));
    }

    Ok(value)
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        _ => Err(ConfigError::InvalidBool(name.to_string(), value.to_string())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([(
            "OIDC_ISSUER".to_string(),
            "https://login.example.com/tenant/v2.0".to_string(),
        )])
    }

    fn with(mut vars: HashMap<String, String>, key: &str, value: &str) -> HashMap<String, String> {
        vars.insert(key.to_string(), value.to_string());
        vars
    }

    #[test]
    fn test_from_vars_defaults() {
        let config = Config::from_vars(&base_vars()).unwrap();

        assert_eq!(config.issuer, "https://login.example.com/tenant/v2.0");
        assert!(config.required_scopes.is_empty());
        assert!(config.audience.is_none());
        assert_eq!(config.key_cache_ttl_seconds, 86_400);
        assert!(config.key_cache_max_entries.is_none());
        assert_eq!(config.key_cache_sweep_interval_seconds, 300);
        assert_eq!(config.key_fetch_timeout_seconds, 10);
        assert_eq!(config.jwt_clock_skew_seconds, 300);
        assert!(!config.reject_unauthenticated);
        assert_eq!(config.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn test_missing_issuer() {
        let result = Config::from_vars(&HashMap::new());
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == "OIDC_ISSUER"));
    }

    #[test]
    fn test_issuer_must_be_url() {
        let vars = with(HashMap::new(), "OIDC_ISSUER", "login.example.com");
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidIssuer(_))
        ));
    }

    #[test]
    fn test_required_scopes_parsing() {
        let vars = with(base_vars(), "REQUIRED_SCOPES", "read, write  admin,");
        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.required_scopes, vec!["read", "write", "admin"]);
    }

    #[test]
    fn test_custom_values() {
        let mut vars = base_vars();
        vars.insert("OIDC_AUDIENCE".to_string(), "api://gate".to_string());
        vars.insert("KEY_CACHE_TTL_SECONDS".to_string(), "3600".to_string());
        vars.insert("KEY_CACHE_MAX_ENTRIES".to_string(), "64".to_string());
        vars.insert("KEY_FETCH_TIMEOUT_SECONDS".to_string(), "3".to_string());
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "60".to_string());
        vars.insert("REJECT_UNAUTHENTICATED".to_string(), "TRUE".to_string());
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());

        let config = Config::from_vars(&vars).unwrap();

        assert_eq!(config.audience.as_deref(), Some("api://gate"));
        assert_eq!(config.key_cache_ttl_seconds, 3600);
        assert_eq!(config.key_cache_max_entries, Some(64));
        assert_eq!(config.key_fetch_timeout_seconds, 3);
        assert_eq!(config.jwt_clock_skew_seconds, 60);
        assert!(config.reject_unauthenticated);
        assert_eq!(config.bind_address, "127.0.0.1:9000");
    }

    #[test]
    fn test_clock_skew_bounds() {
        for bad in ["0", "601", "-5", "abc"] {
            let vars = with(base_vars(), "JWT_CLOCK_SKEW_SECONDS", bad);
            assert!(
                matches!(
                    Config::from_vars(&vars),
                    Err(ConfigError::InvalidJwtClockSkew(_))
                ),
                "clock skew {bad} should be rejected"
            );
        }

        let vars = with(base_vars(), "JWT_CLOCK_SKEW_SECONDS", "600");
        assert_eq!(Config::from_vars(&vars).unwrap().jwt_clock_skew_seconds, 600);
    }

    #[test]
    fn test_zero_cache_values_rejected() {
        for key in [
            "KEY_CACHE_TTL_SECONDS",
            "KEY_CACHE_MAX_ENTRIES",
            "KEY_CACHE_SWEEP_INTERVAL_SECONDS",
        ] {
            let vars = with(base_vars(), key, "0");
            assert!(
                matches!(Config::from_vars(&vars), Err(ConfigError::InvalidKeyCache(_))),
                "{key}=0 should be rejected"
            );
        }
    }

    #[test]
    fn test_key_cache_ttl_upper_bound() {
        for bad in ["2592001", "18446744073709551615"] {
            let vars = with(base_vars(), "KEY_CACHE_TTL_SECONDS", bad);
            assert!(
                matches!(Config::from_vars(&vars), Err(ConfigError::InvalidKeyCache(_))),
                "KEY_CACHE_TTL_SECONDS={bad} should be rejected"
            );
        }

        let vars = with(base_vars(), "KEY_CACHE_TTL_SECONDS", "2592000");
        assert_eq!(Config::from_vars(&vars).unwrap().key_cache_ttl_seconds, 2_592_000);
    }

    #[test]
    fn test_invalid_bool() {
        let vars = with(base_vars(), "REJECT_UNAUTHENTICATED", "maybe");
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidBool(_, _))
        ));
    }

    #[test]
    fn test_verification_config() {
        let mut vars = with(base_vars(), "REQUIRED_SCOPES", "read");
        vars.insert("OIDC_AUDIENCE".to_string(), "api://gate".to_string());
        vars.insert("KEY_CACHE_TTL_SECONDS".to_string(), "120".to_string());

        let verification = Config::from_vars(&vars).unwrap().verification_config();

        assert_eq!(verification.issuer, "https://login.example.com/tenant/v2.0");
        assert_eq!(verification.required_scopes, vec!["read"]);
        assert_eq!(verification.audience.as_deref(), Some("api://gate"));
        assert_eq!(verification.key_cache_ttl, Duration::from_secs(120));
        assert_eq!(verification.clock_skew, DEFAULT_CLOCK_SKEW);
        assert!(verification.custom_validator.is_none());
    }
}
