// Session credential types and the auth endpoint payloads

use serde::{Deserialize, Serialize};
use std::fmt;

/// Access/refresh token pair held in the credential store
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    /// Bearer token attached to every API call
    #[serde(rename = "accessToken")]
    pub access_token: String,
    /// Token exchanged for a new pair when the access token expires
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Body of the refresh call: `{ "refresh": "..." }`
#[derive(Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Body of the login call
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

impl fmt::Debug for LoginRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Token pair as returned by the login and refresh endpoints
#[derive(Deserialize)]
pub struct TokenPair {
    pub access: String,
    /// Backends without rotation omit this on refresh
    #[serde(default)]
    pub refresh: Option<String>,
}

impl TokenPair {
    /// Convert to a stored pair, keeping `previous_refresh` when the
    /// backend did not rotate the refresh token
    pub fn into_credentials(self, previous_refresh: &str) -> CredentialPair {
        CredentialPair {
            access_token: self.access,
            refresh_token: self
                .refresh
                .filter(|token| !token.is_empty())
                .unwrap_or_else(|| previous_refresh.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_pair_uses_storage_keys() {
        let pair = CredentialPair::new("a1", "r1");
        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json["accessToken"], "a1");
        assert_eq!(json["refreshToken"], "r1");
    }

    #[test]
    fn test_debug_hides_tokens() {
        let pair = CredentialPair::new("secret-access", "secret-refresh");
        let debug = format!("{:?}", pair);
        assert!(!debug.contains("secret"));

        let login = LoginRequest {
            username: "ms.frizzle",
            password: "hunter2",
        };
        let debug = format!("{:?}", login);
        assert!(debug.contains("ms.frizzle"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_token_pair_keeps_previous_refresh_when_not_rotated() {
        let tokens: TokenPair = serde_json::from_str(r#"{"access":"a2"}"#).unwrap();
        let pair = tokens.into_credentials("r1");
        assert_eq!(pair, CredentialPair::new("a2", "r1"));

        let tokens: TokenPair =
            serde_json::from_str(r#"{"access":"a3","refresh":"r3"}"#).unwrap();
        assert_eq!(tokens.into_credentials("r1"), CredentialPair::new("a3", "r3"));
    }
}
