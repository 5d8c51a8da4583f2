//! Configuration Builder
//!
//! Fluent builder for [`AuthOptions`].

use std::time::Duration;

use crate::error::{AuthResult, ConfigurationError};
use crate::types::AuthOptions;
use secrecy::SecretString;

/// Builder for [`AuthOptions`].
#[derive(Default)]
pub struct AuthOptionsBuilder {
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    redirect_uri: Option<String>,
    scopes: Vec<String>,
    authorization_endpoint: Option<String>,
    token_endpoint: Option<String>,
    token_refresh_margin: Option<Duration>,
    use_pkce: Option<bool>,
    http_timeout: Option<Duration>,
}

impl AuthOptionsBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the OAuth 2.0 client ID. Required.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set the OAuth 2.0 client secret. Required.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Set the registered redirect URI. Required.
    pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    /// Set the scopes to request, replacing any previously added.
    pub fn scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Add a single scope.
    pub fn add_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    /// Override the authorization endpoint.
    pub fn authorization_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.authorization_endpoint = Some(endpoint.into());
        self
    }

    /// Override the token endpoint.
    pub fn token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = Some(endpoint.into());
        self
    }

    /// Set how far ahead of expiry credentials are refreshed.
    pub fn token_refresh_margin(mut self, margin: Duration) -> Self {
        self.token_refresh_margin = Some(margin);
        self
    }

    /// Enable or disable PKCE. Enabled by default.
    pub fn use_pkce(mut self, use_pkce: bool) -> Self {
        self.use_pkce = Some(use_pkce);
        self
    }

    /// Set the HTTP timeout for token endpoint requests.
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Build the options, validating required fields and endpoint URLs.
    pub fn build(self) -> AuthResult<AuthOptions> {
        let defaults = AuthOptions::default();

        let client_id = self.client_id.filter(|v| !v.is_empty()).ok_or(
            ConfigurationError::MissingRequired {
                field: "client_id".to_string(),
            },
        )?;
        let client_secret = self
            .client_secret
            .ok_or(ConfigurationError::MissingRequired {
                field: "client_secret".to_string(),
            })?;
        let redirect_uri = self.redirect_uri.filter(|v| !v.is_empty()).ok_or(
            ConfigurationError::MissingRequired {
                field: "redirect_uri".to_string(),
            },
        )?;

        let authorization_endpoint = self
            .authorization_endpoint
            .unwrap_or(defaults.authorization_endpoint);
        let token_endpoint = self.token_endpoint.unwrap_or(defaults.token_endpoint);
        for endpoint in [&authorization_endpoint, &token_endpoint] {
            if url::Url::parse(endpoint).is_err() {
                return Err(ConfigurationError::InvalidEndpoint {
                    url: endpoint.clone(),
                }
                .into());
            }
        }

        Ok(AuthOptions {
            client_id,
            client_secret,
            redirect_uri,
            scopes: self.scopes,
            authorization_endpoint,
            token_endpoint,
            token_refresh_margin: self
                .token_refresh_margin
                .unwrap_or(defaults.token_refresh_margin),
            use_pkce: self.use_pkce.unwrap_or(defaults.use_pkce),
            http_timeout: self.http_timeout.unwrap_or(defaults.http_timeout),
        })
    }
}

/// Shorthand for [`AuthOptionsBuilder::new`].
pub fn auth_options() -> AuthOptionsBuilder {
    AuthOptionsBuilder::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;

    #[test]
    fn test_build_with_defaults() {
        let options = auth_options()
            .client_id("client-1")
            .client_secret("secret-1")
            .redirect_uri("https://localhost/callback")
            .add_scope("projects.read")
            .build()
            .unwrap();

        assert_eq!(options.client_id, "client-1");
        assert_eq!(options.scopes, vec!["projects.read"]);
        assert!(options.use_pkce);
        assert_eq!(options.token_refresh_margin, Duration::from_secs(300));
        assert!(options.token_endpoint.contains("/oauth/token"));
    }

    #[test]
    fn test_missing_client_id_rejected() {
        let result = auth_options()
            .client_secret("secret")
            .redirect_uri("https://localhost/callback")
            .build();
        assert!(matches!(
            result,
            Err(AuthError::Config(ConfigurationError::MissingRequired { field })) if field == "client_id"
        ));
    }

    #[test]
    fn test_empty_redirect_uri_rejected() {
        let result = auth_options()
            .client_id("client")
            .client_secret("secret")
            .redirect_uri("")
            .build();
        assert!(matches!(
            result,
            Err(AuthError::Config(ConfigurationError::MissingRequired { field })) if field == "redirect_uri"
        ));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let result = auth_options()
            .client_id("client")
            .client_secret("secret")
            .redirect_uri("https://localhost/callback")
            .token_endpoint("not a url")
            .build();
        assert!(matches!(
            result,
            Err(AuthError::Config(ConfigurationError::InvalidEndpoint { .. }))
        ));
    }

    #[test]
    fn test_overrides_applied() {
        let options = auth_options()
            .client_id("client")
            .client_secret("secret")
            .redirect_uri("https://localhost/callback")
            .scopes(["a", "b"])
            .use_pkce(false)
            .token_refresh_margin(Duration::from_secs(60))
            .http_timeout(Duration::from_secs(10))
            .token_endpoint("https://sandbox.sitebridge.com/oauth/token")
            .build()
            .unwrap();

        assert_eq!(options.scopes, vec!["a", "b"]);
        assert!(!options.use_pkce);
        assert_eq!(options.token_refresh_margin, Duration::from_secs(60));
        assert_eq!(options.http_timeout, Duration::from_secs(10));
        assert_eq!(
            options.token_endpoint,
            "https://sandbox.sitebridge.com/oauth/token"
        );
    }
}
