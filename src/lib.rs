//! SiteBridge SDK Authentication
//!
//! Client-side credential lifecycle and resilient transport for the
//! SiteBridge construction management API.
//!
//! # Features
//!
//! - Authorization code flow with PKCE (RFC 6749 §4.1, RFC 7636)
//! - Token manager with refresh ahead of expiry and single-flight refresh
//! - Authenticating transport stage with one retry after a 401
//! - Per-operation resilience: timeout, retry with backoff, circuit breaker
//! - Pluggable credential storage: in-memory, encrypted file, OS keychain
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sitebridge_auth::{
//!     auth_options, AuthCodeFlow, AuthenticatingTransport, DefaultTokenManager,
//!     EncryptedFileStorage, ReqwestHttpTransport, TokenManager,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = auth_options()
//!         .client_id("my-client-id")
//!         .client_secret("my-client-secret")
//!         .redirect_uri("https://myapp.com/callback")
//!         .add_scope("projects.read")
//!         .build()?;
//!
//!     let transport = Arc::new(ReqwestHttpTransport::new()?);
//!     let storage = Arc::new(EncryptedFileStorage::from_passphrase(
//!         "tokens.enc",
//!         "passphrase",
//!     ));
//!     let manager = Arc::new(DefaultTokenManager::new(
//!         options.clone(),
//!         storage,
//!         transport.clone(),
//!     ));
//!
//!     // Interactive login: redirect the user, then exchange the code.
//!     let flow = AuthCodeFlow::new(options, transport.clone());
//!     let auth = flow.authorization_url(Some("csrf-state"))?;
//!     println!("Visit: {}", auth.url);
//!     let code = read_callback_code();
//!     let cancel = CancellationToken::new();
//!     let credential = flow.exchange_code(&code, &auth.code_verifier, &cancel).await?;
//!     manager.store(&credential, &cancel).await?;
//!
//!     // API requests authenticate and refresh transparently from here on.
//!     let api = AuthenticatingTransport::new(transport, manager);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: credentials, configuration, authorization types
//! - `error`: error hierarchy with transient/terminal classification
//! - `core`: HTTP transport seam and PKCE primitives
//! - `flows`: interactive authorization code flow
//! - `token`: storage backends and the token manager
//! - `pipeline`: authenticating transport stage
//! - `resilience`: per-operation timeout, retry, and circuit breaker
//! - `builders`: fluent configuration builders

pub mod builders;
pub mod core;
pub mod error;
pub mod flows;
pub mod pipeline;
pub mod resilience;
pub mod token;
pub mod types;

// Re-export builders
pub use builders::{auth_options, AuthOptionsBuilder};

// Re-export errors
pub use error::{
    error_from_response, is_transient_status, parse_error_response, AuthError, AuthResult,
    ConfigurationError, NetworkError, OAuth2ErrorResponse, ProtocolError, StorageError,
    TokenError,
};

// Re-export types
pub use types::{
    AuthOptions, AuthorizationUrl, CircuitBreakerOptions, Credential, LoggingOptions,
    OperationContext, PkceParams, ResilienceOptions, RetryOptions, TimeoutOptions,
    TokenRefreshed, TokenResponse,
};

// Re-export core components
pub use core::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport,
    ReqwestHttpTransport,
};

// Re-export flows
pub use flows::AuthCodeFlow;

// Re-export token management
pub use token::{
    DefaultTokenManager, EncryptedFileStorage, InMemoryTokenStorage, KeychainTokenStorage,
    MockTokenManager, MockTokenStorage, TokenManager, TokenStorage,
};

// Re-export pipeline
pub use pipeline::AuthenticatingTransport;

// Re-export resilience
pub use resilience::{
    CircuitBreaker, CircuitState, OperationPolicy, PolicyFactory, ResilientTransport,
    RetryPolicy,
};
