//! Shared-secret authentication for the automation platform's webhook calls.

use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Header carrying the secret when bearer auth is not used.
pub const SECRET_HEADER: &str = "x-webhook-secret";

/// Validates calls against a configured shared secret.
///
/// Accepts the secret in either:
/// - `Authorization: Bearer <secret>` header
/// - `X-Webhook-Secret: <secret>` header
pub struct SharedSecretAuthenticator {
    expected: String,
}

impl SharedSecretAuthenticator {
    pub fn new(secret: String) -> Self {
        Self { expected: secret }
    }

    fn extract_secret<'a>(&self, request: &'a AuthRequest) -> Option<&'a str> {
        if let Some(header) = request.headers.get("authorization") {
            if let Some(secret) = header
                .strip_prefix("Bearer ")
                .or_else(|| header.strip_prefix("bearer "))
            {
                return Some(secret.trim());
            }
        }

        request.headers.get(SECRET_HEADER).map(|s| s.trim())
    }
}

#[async_trait]
impl Authenticator for SharedSecretAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let provided = self
            .extract_secret(request)
            .ok_or(AuthError::NotAuthenticated)?;

        if constant_time_eq(provided.as_bytes(), self.expected.as_bytes()) {
            Ok(Identity {
                caller: "automation_platform".to_string(),
                method: "shared_secret".to_string(),
            })
        } else {
            Err(AuthError::InvalidCredentials(
                "webhook secret mismatch".to_string(),
            ))
        }
    }

    fn method_name(&self) -> &'static str {
        "shared_secret"
    }
}

/// Constant-time byte comparison.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn make_request(headers: &[(&str, &str)]) -> AuthRequest {
        AuthRequest {
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.to_string()))
                .collect(),
            source_ip: "10.0.0.5".parse::<IpAddr>().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_bearer_secret_valid() {
        let auth = SharedSecretAuthenticator::new("hook-secret".to_string());
        let identity = auth
            .authenticate(&make_request(&[("Authorization", "Bearer hook-secret")]))
            .await
            .unwrap();
        assert_eq!(identity.method, "shared_secret");
    }

    #[tokio::test]
    async fn test_secret_header_valid() {
        let auth = SharedSecretAuthenticator::new("hook-secret".to_string());
        let result = auth
            .authenticate(&make_request(&[("X-Webhook-Secret", "hook-secret")]))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_secret() {
        let auth = SharedSecretAuthenticator::new("hook-secret".to_string());
        let result = auth
            .authenticate(&make_request(&[("Authorization", "bearer nope")]))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn test_missing_secret() {
        let auth = SharedSecretAuthenticator::new("hook-secret".to_string());
        let result = auth.authenticate(&make_request(&[])).await;
        assert!(matches!(result, Err(AuthError::NotAuthenticated)));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
        assert!(constant_time_eq(b"", b""));
    }
}
