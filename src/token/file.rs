//! Encrypted File Storage
//!
//! Credential persistence in a single AES-256-GCM encrypted file. Each write
//! re-encrypts the whole credential map under a fresh nonce.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{AuthError, AuthResult, StorageError};
use crate::token::storage::{validate_key, TokenStorage};
use crate::types::Credential;

const NONCE_LEN: usize = 12;

/// File-backed credential storage encrypted with AES-256-GCM.
///
/// File layout: 12-byte nonce followed by the ciphertext of a JSON map of
/// storage key to credential. An unreadable or undecryptable file is treated
/// as empty rather than failing reads; the next write replaces it.
pub struct EncryptedFileStorage {
    path: PathBuf,
    cipher: Aes256Gcm,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl EncryptedFileStorage {
    /// Create a store at `path` with a raw 32-byte key.
    pub fn new(path: impl Into<PathBuf>, key: &[u8; 32]) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        Self {
            path: path.into(),
            cipher,
            lock: Mutex::new(()),
        }
    }

    /// Create a store with a key derived from a passphrase via SHA-256.
    pub fn from_passphrase(path: impl Into<PathBuf>, passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self::new(path, &key)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decrypt_map(&self, data: &[u8]) -> Option<HashMap<String, Credential>> {
        if data.len() <= NONCE_LEN {
            return None;
        }
        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        let plaintext = self.cipher.decrypt(Nonce::from_slice(nonce), ciphertext).ok()?;
        serde_json::from_slice(&plaintext).ok()
    }

    async fn load_map(&self) -> HashMap<String, Credential> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "credential file unreadable, treating as empty");
                return HashMap::new();
            }
        };

        match self.decrypt_map(&data) {
            Some(map) => map,
            None => {
                warn!(path = %self.path.display(), "credential file corrupt or key mismatch, treating as empty");
                HashMap::new()
            }
        }
    }

    async fn save_map(&self, map: &HashMap<String, Credential>) -> AuthResult<()> {
        if map.is_empty() {
            match tokio::fs::remove_file(&self.path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(AuthError::Storage(StorageError::DeleteFailed {
                        message: e.to_string(),
                    }))
                }
            }
            return Ok(());
        }

        let plaintext = serde_json::to_vec(map).map_err(|e| {
            AuthError::Storage(StorageError::WriteFailed {
                message: e.to_string(),
            })
        })?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self.cipher.encrypt(&nonce, plaintext.as_slice()).map_err(|e| {
            AuthError::Storage(StorageError::EncryptionFailed {
                message: e.to_string(),
            })
        })?;

        let mut data = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        data.extend_from_slice(&nonce);
        data.extend_from_slice(&ciphertext);

        // Write-then-rename so a crash mid-write never leaves a torn file.
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &data).await.map_err(|e| {
            AuthError::Storage(StorageError::WriteFailed {
                message: e.to_string(),
            })
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            AuthError::Storage(StorageError::WriteFailed {
                message: e.to_string(),
            })
        })?;

        Ok(())
    }
}

#[async_trait]
impl TokenStorage for EncryptedFileStorage {
    async fn get(&self, key: &str, cancel: &CancellationToken) -> AuthResult<Option<Credential>> {
        validate_key(key)?;
        if cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }
        let _guard = self.lock.lock().await;
        Ok(self.load_map().await.remove(key))
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
        let _guard = self.lock.lock().await;
        let mut map = self.load_map().await;
        map.insert(key.to_string(), credential.clone());
        self.save_map(&map).await
    }

    async fn delete(&self, key: &str, cancel: &CancellationToken) -> AuthResult<()> {
        validate_key(key)?;
        if cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }
        let _guard = self.lock.lock().await;
        let mut map = self.load_map().await;
        if map.remove(key).is_some() {
            self.save_map(&map).await?;
        }
        Ok(())
    }
}
