//! Authorization Types
//!
//! Types for the authorization code flow with PKCE.

/// Result of authorization URL generation.
///
/// The caller must persist `code_verifier` (and `state`, if set) until the
/// authorization callback arrives; both are needed for the code exchange.
#[derive(Clone)]
pub struct AuthorizationUrl {
    /// The authorization URL to redirect the user to.
    pub url: String,
    /// PKCE code verifier. Never transmitted in the authorization request;
    /// only its SHA-256-derived challenge is.
    pub code_verifier: String,
    /// State parameter for CSRF validation, if one was supplied.
    pub state: Option<String>,
}

impl std::fmt::Debug for AuthorizationUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationUrl")
            .field("url", &self.url)
            .field("code_verifier", &"[REDACTED]")
            .field("state", &self.state)
            .finish()
    }
}

/// PKCE parameters for one authorization attempt.
#[derive(Clone)]
pub struct PkceParams {
    /// Code verifier (keep secret, caller-held).
    pub code_verifier: String,
    /// Code challenge (sent in the authorization URL).
    pub code_challenge: String,
}

impl std::fmt::Debug for PkceParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceParams")
            .field("code_verifier", &"[REDACTED]")
            .field("code_challenge", &self.code_challenge)
            .finish()
    }
}
