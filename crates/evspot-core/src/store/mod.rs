//! Secure Credential Store backends.
//!
//! The session manager persists exactly two entries, always written and
//! deleted as a pair:
//!
//! - `session_token`: the bearer token
//! - `user_data`: the JSON-serialized `User`
//!
//! Backends:
//! - `KeyringStore`: OS keychain (default)
//! - `EncryptedFileStore`: ChaCha20-Poly1305 encrypted file for hosts without a keychain
//! - `MemoryStore`: process-local, nothing survives exit

pub mod error;
pub mod file;
pub mod keychain;
pub mod memory;

use async_trait::async_trait;

pub use self::error::StoreError;
pub use self::file::EncryptedFileStore;
pub use self::keychain::KeyringStore;
pub use self::memory::MemoryStore;

/// Key holding the bearer token
pub const SESSION_TOKEN_KEY: &str = "session_token";

/// Key holding the serialized user record
pub const USER_DATA_KEY: &str = "user_data";

/// Opaque key -> string persistence with encryption at rest
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read a value. A key that was never written is `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a value. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
