//! Keychain Storage
//!
//! Credential persistence in the operating system's user-scoped secret store
//! (Keychain on macOS, Credential Manager on Windows, Secret Service on
//! Linux) via the `keyring` crate.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{AuthError, AuthResult, StorageError};
use crate::token::storage::{validate_key, TokenStorage};
use crate::types::Credential;

/// OS-user-scoped credential storage.
///
/// Each storage key becomes one keychain entry under the configured service
/// name, holding the JSON-serialized credential. The platform store applies
/// its own per-user protection; no additional encryption is layered on top.
pub struct KeychainTokenStorage {
    service: String,
}

impl KeychainTokenStorage {
    /// Create a store under the given service name, probing the platform
    /// secret store first.
    ///
    /// Returns [`StorageError::UnsupportedPlatform`] when no usable secret
    /// store is available, so callers can fall back to
    /// [`EncryptedFileStorage`](crate::token::EncryptedFileStorage).
    pub async fn new(service: impl Into<String>) -> AuthResult<Self> {
        let service = service.into();

        let probe_service = service.clone();
        tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&probe_service, "__sitebridge_probe__")
                .map_err(unsupported)?;
            entry.set_password("probe").map_err(unsupported)?;
            let _ = entry.delete_credential();
            Ok::<(), AuthError>(())
        })
        .await
        .map_err(|e| {
            AuthError::Storage(StorageError::UnsupportedPlatform {
                message: e.to_string(),
            })
        })??;

        Ok(Self { service })
    }

    fn entry(&self, key: &str) -> AuthResult<keyring::Entry> {
        keyring::Entry::new(&self.service, key).map_err(|e| {
            AuthError::Storage(StorageError::ReadFailed {
                message: e.to_string(),
            })
        })
    }
}

fn unsupported(e: keyring::Error) -> AuthError {
    AuthError::Storage(StorageError::UnsupportedPlatform {
        message: e.to_string(),
    })
}

#[async_trait]
impl TokenStorage for KeychainTokenStorage {
    async fn get(&self, key: &str, cancel: &CancellationToken) -> AuthResult<Option<Credential>> {
        validate_key(key)?;
        if cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }

        let entry = self.entry(key)?;
        let stored = tokio::task::spawn_blocking(move || match entry.get_password() {
            Ok(blob) => Ok(Some(blob)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AuthError::Storage(StorageError::ReadFailed {
                message: e.to_string(),
            })),
        })
        .await
        .map_err(|e| {
            AuthError::Storage(StorageError::ReadFailed {
                message: e.to_string(),
            })
        })??;

        match stored {
            None => Ok(None),
            Some(blob) => {
                let credential = serde_json::from_str(&blob).map_err(|e| {
                    AuthError::Storage(StorageError::ReadFailed {
                        message: format!("stored credential is not valid JSON: {e}"),
                    })
                })?;
                Ok(Some(credential))
            }
        }
    }

    async fn store(
        &self,
        key: &str,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> AuthResult<()> {
        validate_key(key)?;
        if cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }

        let blob = serde_json::to_string(credential).map_err(|e| {
            AuthError::Storage(StorageError::WriteFailed {
                message: e.to_string(),
            })
        })?;

        let entry = self.entry(key)?;
        tokio::task::spawn_blocking(move || {
            entry.set_password(&blob).map_err(|e| {
                AuthError::Storage(StorageError::WriteFailed {
                    message: e.to_string(),
                })
            })
        })
        .await
        .map_err(|e| {
            AuthError::Storage(StorageError::WriteFailed {
                message: e.to_string(),
            })
        })?
    }

    async fn delete(&self, key: &str, cancel: &CancellationToken) -> AuthResult<()> {
        validate_key(key)?;
        if cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }

        let entry = self.entry(key)?;
        tokio::task::spawn_blocking(move || match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AuthError::Storage(StorageError::DeleteFailed {
                message: e.to_string(),
            })),
        })
        .await
        .map_err(|e| {
            AuthError::Storage(StorageError::DeleteFailed {
                message: e.to_string(),
            })
        })?
    }
}
