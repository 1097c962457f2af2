//! Greeting handler.
//!
//! The smallest protected resource: greets the caller by the subject of
//! their verified token.

use crate::auth::Claims;
use crate::errors::GateError;
use axum::Extension;
use tracing::instrument;

/// Handler for GET /
///
/// Returns 401 when the gate attached no claims to the request.
#[instrument(skip_all, name = "gate.handlers.hello")]
pub async fn hello(claims: Option<Extension<Claims>>) -> Result<String, GateError> {
    let Extension(claims) = claims.ok_or(GateError::MissingToken)?;
    Ok(greeting(&claims.sub))
}

fn greeting(subject: &str) -> String {
    format!("Hello World! I am secure. Subject from token: {subject}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting() {
        assert_eq!(
            greeting("user-1"),
            "Hello World! I am secure. Subject from token: user-1"
        );
    }
}
