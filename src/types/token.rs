//! Credential Types
//!
//! OAuth 2.0 credential and token endpoint response types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An OAuth 2.0 bearer credential with expiration and refresh information.
///
/// Immutable value: created by the flow helper (initial exchange) or the
/// token manager (post-refresh), and replaced wholesale on refresh.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    /// The access token value.
    pub token: String,
    /// Token type, typically "Bearer".
    pub token_type: String,
    /// Absolute (UTC) expiration time.
    pub expires_at: DateTime<Utc>,
    /// Refresh token used to obtain new access tokens. A credential without
    /// one cannot be auto-refreshed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Scopes granted to this credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
}

impl Credential {
    /// Create a new credential.
    pub fn new(
        token: impl Into<String>,
        token_type: impl Into<String>,
        expires_at: DateTime<Utc>,
        refresh_token: Option<String>,
        scopes: Option<Vec<String>>,
    ) -> Self {
        Self {
            token: token.into(),
            token_type: token_type.into(),
            expires_at,
            refresh_token,
            scopes,
        }
    }

    /// Check if the credential has expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Check if the credential expires within the given margin.
    pub fn expires_within(&self, margin: std::time::Duration) -> bool {
        let margin = Duration::from_std(margin).unwrap_or_else(|_| Duration::seconds(i64::MAX));
        self.expires_at <= Utc::now() + margin
    }

    /// Check if the credential carries a refresh token.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Format as an `Authorization` header value.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.token)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Token endpoint response (RFC 6749 §5.1).
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    /// Access token value.
    pub access_token: String,
    /// Token type (usually "Bearer").
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
    /// Refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Space-separated granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    /// Convert into a credential, resolving `expires_in` against the current
    /// time.
    pub fn into_credential(self) -> Credential {
        let scopes = self
            .scope
            .as_ref()
            .map(|s| s.split_whitespace().map(String::from).collect());

        Credential {
            token: self.access_token,
            token_type: self.token_type,
            expires_at: Utc::now() + Duration::seconds(self.expires_in as i64),
            refresh_token: self.refresh_token,
            scopes,
        }
    }
}

/// Payload broadcast when the token manager replaces a credential.
#[derive(Clone, Debug)]
pub struct TokenRefreshed {
    /// The new credential that was obtained.
    pub new: Credential,
    /// The credential that was replaced, if any.
    pub old: Option<Credential>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_parsing() {
        let json = r#"{
            "access_token": "test-token",
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "test-refresh",
            "scope": "projects.read projects.write"
        }"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "test-token");
        assert_eq!(response.expires_in, 3600);

        let credential = response.into_credential();
        assert!(!credential.is_expired());
        assert!(credential.can_refresh());
        assert_eq!(
            credential.scopes,
            Some(vec!["projects.read".to_string(), "projects.write".to_string()])
        );
    }

    #[test]
    fn test_token_type_defaults_to_bearer() {
        let json = r#"{"access_token": "t", "expires_in": 60}"#;
        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.token_type, "Bearer");
    }

    #[test]
    fn test_authorization_header() {
        let credential = Credential::new("abc123", "Bearer", Utc::now(), None, None);
        assert_eq!(credential.authorization_header(), "Bearer abc123");
    }

    #[test]
    fn test_expires_within() {
        let credential = Credential::new(
            "t",
            "Bearer",
            Utc::now() + Duration::seconds(60),
            None,
            None,
        );
        assert!(credential.expires_within(std::time::Duration::from_secs(120)));
        assert!(!credential.expires_within(std::time::Duration::from_secs(10)));
        assert!(!credential.is_expired());
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let credential = Credential::new(
            "secret-token",
            "Bearer",
            Utc::now(),
            Some("secret-refresh".to_string()),
            None,
        );
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("secret-token"));
        assert!(!debug.contains("secret-refresh"));
    }

    #[test]
    fn test_credential_storage_round_trip() {
        let credential = Credential::new(
            "t",
            "Bearer",
            Utc::now() + Duration::seconds(3600),
            Some("r".to_string()),
            Some(vec!["projects.read".to_string()]),
        );

        let json = serde_json::to_string(&credential).unwrap();
        let restored: Credential = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.token, credential.token);
        assert_eq!(restored.expires_at, credential.expires_at);
        assert_eq!(restored.refresh_token, credential.refresh_token);
        assert_eq!(restored.scopes, credential.scopes);
    }
}
