//! Token Storage
//!
//! Storage seam for persisted credentials plus the in-memory backend.
//! Encrypted file and platform keychain backends live in sibling modules.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{AuthError, AuthResult, StorageError};
use crate::types::Credential;

/// Pluggable credential persistence.
///
/// Keys are opaque strings; the token manager derives them from the client
/// id. Implementations must be safe for concurrent use.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Retrieve the credential stored under a key, if any.
    async fn get(&self, key: &str, cancel: &CancellationToken) -> AuthResult<Option<Credential>>;

    /// Store a credential under a key, replacing any existing one.
    async fn store(
        &self,
        key: &str,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> AuthResult<()>;

    /// Delete the credential stored under a key. Deleting a missing key is
    /// not an error.
    async fn delete(&self, key: &str, cancel: &CancellationToken) -> AuthResult<()>;
}

pub(crate) fn validate_key(key: &str) -> AuthResult<()> {
    if key.is_empty() {
        return Err(AuthError::InvalidArgument {
            message: "storage key must not be empty".to_string(),
        });
    }
    Ok(())
}

/// In-memory credential storage. Process-lifetime only; nothing touches disk.
#[derive(Default)]
pub struct InMemoryTokenStorage {
    credentials: Mutex<HashMap<String, Credential>>,
}

impl InMemoryTokenStorage {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStorage for InMemoryTokenStorage {
    async fn get(&self, key: &str, _cancel: &CancellationToken) -> AuthResult<Option<Credential>> {
        validate_key(key)?;
        Ok(self.credentials.lock().unwrap().get(key).cloned())
    }

    async fn store(
        &self,
        key: &str,
        credential: &Credential,
        _cancel: &CancellationToken,
    ) -> AuthResult<()> {
        validate_key(key)?;
        self.credentials
            .lock()
            .unwrap()
            .insert(key.to_string(), credential.clone());
        Ok(())
    }

    async fn delete(&self, key: &str, _cancel: &CancellationToken) -> AuthResult<()> {
        validate_key(key)?;
        self.credentials.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Mock credential storage for testing.
#[derive(Default)]
pub struct MockTokenStorage {
    credentials: Mutex<HashMap<String, Credential>>,
    next_error: Mutex<Option<StorageError>>,
    history: Mutex<Vec<String>>,
}

impl MockTokenStorage {
    /// Create an empty mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next operation with the given error.
    pub fn fail_next(&self, error: StorageError) {
        *self.next_error.lock().unwrap() = Some(error);
    }

    /// Pre-populate a credential.
    pub fn seed(&self, key: &str, credential: Credential) {
        self.credentials
            .lock()
            .unwrap()
            .insert(key.to_string(), credential);
    }

    /// Recorded operation log, entries like `"get:sitebridge_token_x"`.
    pub fn operations(&self) -> Vec<String> {
        self.history.lock().unwrap().clone()
    }

    fn record(&self, op: &str, key: &str) -> AuthResult<()> {
        self.history.lock().unwrap().push(format!("{op}:{key}"));
        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Err(AuthError::Storage(error));
        }
        Ok(())
    }
}

#[async_trait]
impl TokenStorage for MockTokenStorage {
    async fn get(&self, key: &str, _cancel: &CancellationToken) -> AuthResult<Option<Credential>> {
        validate_key(key)?;
        self.record("get", key)?;
        Ok(self.credentials.lock().unwrap().get(key).cloned())
    }

    async fn store(
        &self,
        key: &str,
        credential: &Credential,
        _cancel: &CancellationToken,
    ) -> AuthResult<()> {
        validate_key(key)?;
        self.record("store", key)?;
        self.credentials
            .lock()
            .unwrap()
            .insert(key.to_string(), credential.clone());
        Ok(())
    }

    async fn delete(&self, key: &str, _cancel: &CancellationToken) -> AuthResult<()> {
        validate_key(key)?;
        self.record("delete", key)?;
        self.credentials.lock().unwrap().remove(key);
        Ok(())
    }
}
