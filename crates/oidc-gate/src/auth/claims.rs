//! JWT claims structure.
//!
//! Contains the claims decoded from a bearer token. The `sub` field is
//! redacted in Debug output to prevent exposure in logs.
//!
//! Identity providers disagree on how scopes are encoded, so the `scope`
//! claim is accepted either as a JSON array or as a space-delimited string.
//! When `scope` is absent the `scp` claim is consulted with the same rules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// JWT Claims structure for bearer tokens.
///
/// Immutable once decoded. Unknown claims are kept in `extra` so that custom
/// validators can inspect provider-specific fields (`tid`, `azp`, ...).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawClaims")]
pub struct Claims {
    /// Issuer URL.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub iss: String,

    /// Subject (user or client ID) - redacted in Debug output.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sub: String,

    /// Expiration timestamp (Unix epoch seconds). A token without one does
    /// not expire.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Not-before timestamp (Unix epoch seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Audiences the token was issued for.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aud: Vec<String>,

    /// Scopes granted to this token, in token order.
    #[serde(rename = "scope", skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,

    /// Any claims not modelled above.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Custom Debug implementation that redacts the `sub` field.
impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("iss", &self.iss)
            .field("sub", &"[REDACTED]")
            .field("exp", &self.exp)
            .field("nbf", &self.nbf)
            .field("iat", &self.iat)
            .field("aud", &self.aud)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

impl Claims {
    /// Check if the token has a specific scope.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Check that every required scope is granted.
    ///
    /// Order and duplicates are irrelevant. An empty requirement is always met.
    pub fn has_all_scopes<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required.iter().all(|scope| self.has_scope(scope.as_ref()))
    }

    /// Check if the token was issued for the given audience.
    pub fn has_audience(&self, audience: &str) -> bool {
        self.aud.iter().any(|a| a == audience)
    }
}

/// A claim that may be encoded as one string or a list of strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrList {
    Single(String),
    List(Vec<String>),
}

impl StringOrList {
    /// Scope form: a single string is space-delimited.
    fn into_scopes(self) -> Vec<String> {
        match self {
            StringOrList::Single(s) => s.split_whitespace().map(str::to_string).collect(),
            StringOrList::List(list) => list,
        }
    }

    /// Audience form: a single string is one audience.
    fn into_audiences(self) -> Vec<String> {
        match self {
            StringOrList::Single(s) => vec![s],
            StringOrList::List(list) => list,
        }
    }
}

/// Wire shape of the claims, before scope and audience normalisation.
#[derive(Deserialize)]
struct RawClaims {
    #[serde(default)]
    iss: String,
    #[serde(default)]
    sub: String,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    nbf: Option<i64>,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    aud: Option<StringOrList>,
    #[serde(default)]
    scope: Option<StringOrList>,
    #[serde(default)]
    scp: Option<StringOrList>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl From<RawClaims> for Claims {
    fn from(raw: RawClaims) -> Self {
        let scopes = raw
            .scope
            .or(raw.scp)
            .map(StringOrList::into_scopes)
            .unwrap_or_default();

        Self {
            iss: raw.iss,
            sub: raw.sub,
            exp: raw.exp,
            nbf: raw.nbf,
            iat: raw.iat,
            aud: raw.aud.map(StringOrList::into_audiences).unwrap_or_default(),
            scopes,
            extra: raw.extra,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn claims_from(json: serde_json::Value) -> Claims {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_claims_debug_redacts_sub() {
        let claims = claims_from(serde_json::json!({
            "iss": "https://issuer.example",
            "sub": "secret-user-id",
            "exp": 1234567890,
        }));

        let debug_str = format!("{:?}", claims);

        assert!(
            !debug_str.contains("secret-user-id"),
            "Debug output should not contain actual sub value"
        );
        assert!(
            debug_str.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
    }

    #[test]
    fn test_scope_as_array() {
        let claims = claims_from(serde_json::json!({
            "exp": 1234567890,
            "scope": ["read", "write"],
        }));
        assert_eq!(claims.scopes, vec!["read", "write"]);
    }

    #[test]
    fn test_scope_as_space_delimited_string() {
        let claims = claims_from(serde_json::json!({
            "exp": 1234567890,
            "scope": "read  write admin",
        }));
        assert_eq!(claims.scopes, vec!["read", "write", "admin"]);
    }

    #[test]
    fn test_scp_used_when_scope_absent() {
        let claims = claims_from(serde_json::json!({
            "exp": 1234567890,
            "scp": "User.Read",
        }));
        assert_eq!(claims.scopes, vec!["User.Read"]);
    }

    #[test]
    fn test_scope_wins_over_scp() {
        let claims = claims_from(serde_json::json!({
            "exp": 1234567890,
            "scope": ["read"],
            "scp": ["other"],
        }));
        assert_eq!(claims.scopes, vec!["read"]);
    }

    #[test]
    fn test_audience_single_and_list() {
        let single = claims_from(serde_json::json!({"exp": 1, "aud": "api"}));
        assert_eq!(single.aud, vec!["api"]);

        let list = claims_from(serde_json::json!({"exp": 1, "aud": ["api", "web"]}));
        assert!(list.has_audience("web"));
        assert!(!list.has_audience("cli"));
    }

    #[test]
    fn test_missing_exp_is_optional() {
        let claims = claims_from(serde_json::json!({
            "iss": "https://issuer.example",
            "sub": "user",
        }));
        assert_eq!(claims.exp, None);
        assert_eq!(claims.sub, "user");
    }

    #[test]
    fn test_has_all_scopes_subset_semantics() {
        let claims = claims_from(serde_json::json!({
            "exp": 1,
            "scope": ["write", "read", "read", "admin"],
        }));

        assert!(claims.has_all_scopes(&["read", "write"]));
        assert!(claims.has_all_scopes(&["write", "read", "write"]));
        assert!(claims.has_all_scopes::<&str>(&[]));
        assert!(!claims.has_all_scopes(&["read", "delete"]));
        assert!(!claims.has_scope("rea")); // Partial match should not work
    }

    #[test]
    fn test_extra_claims_are_kept() {
        let claims = claims_from(serde_json::json!({
            "exp": 1,
            "tid": "tenant-1",
        }));
        assert_eq!(claims.extra.get("tid").and_then(|v| v.as_str()), Some("tenant-1"));
        assert!(!claims.extra.contains_key("exp"));
    }

    #[test]
    fn test_claims_serialization_round_trip() {
        let claims = claims_from(serde_json::json!({
            "iss": "https://issuer.example",
            "sub": "user123",
            "exp": 1234567890,
            "iat": 1234567800,
            "aud": "api",
            "scope": "read write",
        }));

        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["scope"], serde_json::json!(["read", "write"]));
        assert!(json.get("nbf").is_none(), "nbf should be omitted when None");

        let deserialized: Claims = serde_json::from_value(json).unwrap();
        assert_eq!(deserialized, claims);
    }
}
