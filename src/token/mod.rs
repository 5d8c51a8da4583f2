//! Token Management
//!
//! Credential persistence and lifecycle:
//!
//! - **Storage**: pluggable persistence behind [`TokenStorage`], with
//!   in-memory, encrypted file, and OS keychain backends
//! - **Manager**: proactive refresh ahead of expiry with single-flight
//!   refresh under concurrency

pub mod file;
pub mod keychain;
pub mod manager;
pub mod storage;

pub use file::EncryptedFileStorage;
pub use keychain::KeychainTokenStorage;
pub use manager::{DefaultTokenManager, MockTokenManager, TokenManager};
pub use storage::{InMemoryTokenStorage, MockTokenStorage, TokenStorage};
