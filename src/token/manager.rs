//! Token Manager
//!
//! Credential lifecycle: retrieval from storage, proactive refresh ahead of
//! expiry, and single-flight refresh under concurrency.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::transport::{HttpRequest, HttpTransport};
use crate::error::{error_from_response, AuthError, AuthResult, ProtocolError, TokenError};
use crate::token::TokenStorage;
use crate::types::{AuthOptions, Credential, TokenRefreshed, TokenResponse};

/// Credential lifecycle interface.
#[async_trait]
pub trait TokenManager: Send + Sync {
    /// Get a usable credential, refreshing ahead of expiry when possible.
    ///
    /// Returns `None` when no credential is stored or the stored credential
    /// is expired and cannot be refreshed; the caller must run the
    /// interactive flow.
    async fn get_credential(&self, cancel: &CancellationToken) -> AuthResult<Option<Credential>>;

    /// Force a refresh of the stored credential.
    ///
    /// Concurrent callers join a single in-flight exchange and share its
    /// outcome; late joiners see the error wrapped in
    /// [`TokenError::RefreshFailed`].
    async fn refresh(&self, cancel: &CancellationToken) -> AuthResult<Credential>;

    /// Persist a credential, e.g. after the initial code exchange.
    async fn store(&self, credential: &Credential, cancel: &CancellationToken) -> AuthResult<()>;

    /// Remove the stored credential.
    async fn clear(&self, cancel: &CancellationToken) -> AuthResult<()>;

    /// Subscribe to credential replacement events.
    fn subscribe(&self) -> broadcast::Receiver<TokenRefreshed>;
}

struct RefreshState {
    /// Bumped after every completed exchange (success or failure).
    epoch: u64,
    outcome: Option<Result<Credential, Arc<AuthError>>>,
}

/// Default token manager backed by a [`TokenStorage`] and an
/// [`HttpTransport`].
pub struct DefaultTokenManager {
    options: AuthOptions,
    storage: Arc<dyn TokenStorage>,
    transport: Arc<dyn HttpTransport>,
    refresh_lock: tokio::sync::Mutex<()>,
    state: Mutex<RefreshState>,
    events: broadcast::Sender<TokenRefreshed>,
}

impl DefaultTokenManager {
    /// Create a token manager.
    pub fn new(
        options: AuthOptions,
        storage: Arc<dyn TokenStorage>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            options,
            storage,
            transport,
            refresh_lock: tokio::sync::Mutex::new(()),
            state: Mutex::new(RefreshState {
                epoch: 0,
                outcome: None,
            }),
            events,
        }
    }

    /// Storage key this manager reads and writes.
    pub fn storage_key(&self) -> String {
        format!("sitebridge_token_{}", self.options.client_id)
    }

    async fn load(&self, cancel: &CancellationToken) -> AuthResult<Option<Credential>> {
        match self.storage.get(&self.storage_key(), cancel).await {
            Ok(credential) => Ok(credential),
            Err(AuthError::Cancelled) => Err(AuthError::Cancelled),
            Err(e) => {
                // A broken storage backend must not take down reads; behave
                // as if nothing is stored.
                warn!(error = %e, "credential storage read failed");
                Ok(None)
            }
        }
    }

    /// Perform the actual refresh-token exchange. Called with the refresh
    /// lock held.
    async fn exchange_refresh_token(
        &self,
        old: &Credential,
        cancel: &CancellationToken,
    ) -> AuthResult<Credential> {
        let refresh_token = old
            .refresh_token
            .as_deref()
            .ok_or(AuthError::Token(TokenError::NoRefreshToken))?;

        let secret = {
            use secrecy::ExposeSecret;
            self.options.client_secret.expose_secret().clone()
        };

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.options.client_id.as_str()),
            ("client_secret", secret.as_str()),
        ];

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

        let mut credential = token_response.into_credential();
        // Servers may omit the refresh token on rotation-free grants; keep
        // the old one so the credential stays refreshable.
        if credential.refresh_token.is_none() {
            credential.refresh_token = old.refresh_token.clone();
        }

        self.storage
            .store(&self.storage_key(), &credential, cancel)
            .await?;

        let _ = self.events.send(TokenRefreshed {
            new: credential.clone(),
            old: Some(old.clone()),
        });

        info!(client_id = %self.options.client_id, "credential refreshed");
        Ok(credential)
    }
}

#[async_trait]
impl TokenManager for DefaultTokenManager {
    async fn get_credential(&self, cancel: &CancellationToken) -> AuthResult<Option<Credential>> {
        let Some(credential) = self.load(cancel).await? else {
            return Ok(None);
        };

        if !credential.expires_within(self.options.token_refresh_margin) {
            return Ok(Some(credential));
        }

        match self.refresh(cancel).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(AuthError::Cancelled) => Err(AuthError::Cancelled),
            Err(e) => {
                // Availability over freshness: hand out the stale credential
                // and let the server's 401 drive re-authentication.
                warn!(error = %e, "refresh failed, serving stale credential");
                Ok(Some(credential))
            }
        }
    }

    async fn refresh(&self, cancel: &CancellationToken) -> AuthResult<Credential> {
        let entry_epoch = self.state.lock().unwrap().epoch;

        let _guard = tokio::select! {
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
            guard = self.refresh_lock.lock() => guard,
        };

        // Someone else completed an exchange while we waited for the lock;
        // share its outcome instead of exchanging again.
        {
            let state = self.state.lock().unwrap();
            if state.epoch != entry_epoch {
                if let Some(outcome) = &state.outcome {
                    return match outcome {
                        Ok(credential) => Ok(credential.clone()),
                        Err(source) => Err(AuthError::Token(TokenError::RefreshFailed {
                            source: source.clone(),
                        })),
                    };
                }
            }
        }

        let Some(old) = self.load(cancel).await? else {
            return Err(AuthError::Token(TokenError::NotFound {
                key: self.storage_key(),
            }));
        };
        if old.refresh_token.is_none() {
            return Err(AuthError::Token(TokenError::NoRefreshToken));
        }

        let result = self.exchange_refresh_token(&old, cancel).await;

        // A cancelled attempt is not a completed exchange; leave the epoch
        // alone so the next caller performs its own.
        if matches!(result, Err(AuthError::Cancelled)) {
            return Err(AuthError::Cancelled);
        }

        let shared = result.map_err(Arc::new);
        {
            let mut state = self.state.lock().unwrap();
            state.epoch += 1;
            state.outcome = Some(shared.clone());
        }

        shared.map_err(|source| AuthError::Token(TokenError::RefreshFailed { source }))
    }

    async fn store(&self, credential: &Credential, cancel: &CancellationToken) -> AuthResult<()> {
        self.storage
            .store(&self.storage_key(), credential, cancel)
            .await
    }

    async fn clear(&self, cancel: &CancellationToken) -> AuthResult<()> {
        self.storage.delete(&self.storage_key(), cancel).await
    }

    fn subscribe(&self) -> broadcast::Receiver<TokenRefreshed> {
        self.events.subscribe()
    }
}

/// Mock token manager for testing pipeline behavior.
#[derive(Default)]
pub struct MockTokenManager {
    credential: Mutex<Option<Credential>>,
    refresh_result: Mutex<Option<Credential>>,
    refresh_count: std::sync::atomic::AtomicUsize,
    events: Option<broadcast::Sender<TokenRefreshed>>,
}

impl MockTokenManager {
    /// Create an empty mock manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the credential returned by `get_credential`.
    pub fn set_credential(&self, credential: Credential) {
        *self.credential.lock().unwrap() = Some(credential);
    }

    /// Set the credential `refresh` produces; unset means refresh fails.
    pub fn set_refresh_result(&self, credential: Credential) {
        *self.refresh_result.lock().unwrap() = Some(credential);
    }

    /// Number of refresh calls observed.
    pub fn refresh_count(&self) -> usize {
        self.refresh_count.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenManager for MockTokenManager {
    async fn get_credential(&self, _cancel: &CancellationToken) -> AuthResult<Option<Credential>> {
        Ok(self.credential.lock().unwrap().clone())
    }

    async fn refresh(&self, _cancel: &CancellationToken) -> AuthResult<Credential> {
        self.refresh_count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match self.refresh_result.lock().unwrap().clone() {
            Some(credential) => {
                *self.credential.lock().unwrap() = Some(credential.clone());
                Ok(credential)
            }
            None => Err(AuthError::Token(TokenError::RefreshFailed {
                source: Arc::new(AuthError::Unauthorized {
                    message: "mock refresh failure".to_string(),
                }),
            })),
        }
    }

    async fn store(&self, credential: &Credential, _cancel: &CancellationToken) -> AuthResult<()> {
        *self.credential.lock().unwrap() = Some(credential.clone());
        Ok(())
    }

    async fn clear(&self, _cancel: &CancellationToken) -> AuthResult<()> {
        *self.credential.lock().unwrap() = None;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<TokenRefreshed> {
        match &self.events {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        }
    }
}
