//! Authorization Code Flow
//!
//! Authorization code grant (RFC 6749 §4.1) with PKCE (RFC 7636) for the
//! SiteBridge API.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::pkce;
use crate::core::transport::{HttpRequest, HttpTransport};
use crate::error::{error_from_response, AuthError, AuthResult, ProtocolError};
use crate::types::{AuthOptions, AuthorizationUrl, Credential, TokenResponse};

/// Helper for the interactive authorization code flow.
///
/// Stateless between calls: the caller holds the PKCE verifier returned by
/// [`authorization_url`](AuthCodeFlow::authorization_url) and passes it back
/// to [`exchange_code`](AuthCodeFlow::exchange_code).
pub struct AuthCodeFlow {
    options: AuthOptions,
    transport: Arc<dyn HttpTransport>,
}

impl AuthCodeFlow {
    /// Create a flow helper from configuration and a transport.
    pub fn new(options: AuthOptions, transport: Arc<dyn HttpTransport>) -> Self {
        Self { options, transport }
    }

    /// Build the authorization URL to redirect the user to.
    ///
    /// Generates a fresh PKCE verifier per call when PKCE is enabled. Pure
    /// apart from randomness; performs no I/O.
    pub fn authorization_url(&self, state: Option<&str>) -> AuthResult<AuthorizationUrl> {
        let mut url = url::Url::parse(&self.options.authorization_endpoint).map_err(|_| {
            AuthError::Config(crate::error::ConfigurationError::InvalidEndpoint {
                url: self.options.authorization_endpoint.clone(),
            })
        })?;

        let params = self.options.use_pkce.then(pkce::generate_pkce_params);

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.options.client_id)
                .append_pair("redirect_uri", &self.options.redirect_uri);

            if !self.options.scopes.is_empty() {
                query.append_pair("scope", &self.options.scopes.join(" "));
            }
            if let Some(params) = &params {
                query
                    .append_pair("code_challenge", &params.code_challenge)
                    .append_pair("code_challenge_method", "S256");
            }
            if let Some(state) = state {
                query.append_pair("state", state);
            }
        }

        debug!(client_id = %self.options.client_id, "built authorization url");

        Ok(AuthorizationUrl {
            url: url.into(),
            code_verifier: params.map(|p| p.code_verifier).unwrap_or_default(),
            state: state.map(String::from),
        })
    }

    /// Exchange an authorization code for a credential.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        cancel: &CancellationToken,
    ) -> AuthResult<Credential> {
        if code.is_empty() {
            return Err(AuthError::InvalidArgument {
                message: "authorization code must not be empty".to_string(),
            });
        }
        if self.options.use_pkce && code_verifier.is_empty() {
            return Err(AuthError::InvalidArgument {
                message: "code verifier must not be empty".to_string(),
            });
        }

        let secret = {
            use secrecy::ExposeSecret;
            self.options.client_secret.expose_secret().clone()
        };

        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.options.client_id.as_str()),
            ("client_secret", secret.as_str()),
            ("redirect_uri", self.options.redirect_uri.as_str()),
        ];
        if self.options.use_pkce {
            params.push(("code_verifier", code_verifier));
        }

        let mut request = HttpRequest::post_form(&self.options.token_endpoint, &params);
        request.timeout = Some(self.options.http_timeout);

        let response = self.transport.send(request, cancel).await?;

        if !response.is_success() {
            return Err(error_from_response(response.status, &response.body));
        }

        let token_response: TokenResponse =
            serde_json::from_str(&response.body).map_err(|e| {
                AuthError::Protocol(ProtocolError::InvalidJson {
                    message: e.to_string(),
                })
            })?;

        debug!(client_id = %self.options.client_id, "authorization code exchanged");
        Ok(token_response.into_credential())
    }
}
