//! Encrypted file credential store.
//!
//! All entries live in one file as a JSON map, sealed with ChaCha20-Poly1305.
//! The key is derived from a passphrase with Argon2id and a random per-file
//! salt. File layout:
//!
//! ```text
//! magic (4) | salt (16) | nonce (12) | ciphertext + tag
//! ```
//!
//! Every write re-encrypts the whole map under a fresh nonce and replaces the
//! file via rename.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use argon2::Argon2;
use async_trait::async_trait;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use tracing::debug;

use super::{CredentialStore, StoreError};

const MAGIC: &[u8; 4] = b"EVS1";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC.len() + SALT_LEN + NONCE_LEN;

/// Credential store kept in a single encrypted file.
///
/// Key derivation and file writes block, so the async entry points run them
/// on tokio's blocking pool.
pub struct EncryptedFileStore {
    sealed: Arc<Sealed>,
}

struct Sealed {
    path: PathBuf,
    salt: [u8; SALT_LEN],
    cipher: ChaCha20Poly1305,
    entries: Mutex<HashMap<String, String>>,
}

impl EncryptedFileStore {
    /// Open (or prepare to create) the store at `path`.
    /// An existing file must decrypt under `passphrase`.
    pub fn open(path: impl Into<PathBuf>, passphrase: &str) -> Result<Self, StoreError> {
        Self::open_with_kdf(path, passphrase, Argon2::default())
    }

    /// Same as [`open`](Self::open), off the async runtime's worker threads
    pub async fn open_async(path: impl Into<PathBuf>, passphrase: &str) -> Result<Self, StoreError> {
        Self::open_with_kdf_async(path, passphrase, Argon2::default()).await
    }

    pub(crate) async fn open_with_kdf_async(
        path: impl Into<PathBuf>,
        passphrase: &str,
        kdf: Argon2<'static>,
    ) -> Result<Self, StoreError> {
        let path = path.into();
        let passphrase = passphrase.to_string();
        run_blocking(move || Self::open_with_kdf(path, &passphrase, kdf)).await
    }

    pub(crate) fn open_with_kdf(
        path: impl Into<PathBuf>,
        passphrase: &str,
        kdf: Argon2<'_>,
    ) -> Result<Self, StoreError> {
        let path = path.into();

        let sealed = if path.exists() {
            let bytes = std::fs::read(&path)?;
            let (salt, nonce, ciphertext) = split_file(&bytes)?;
            let cipher = derive_cipher(&kdf, passphrase, &salt)?;
            let plaintext = cipher
                .decrypt(Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| StoreError::Crypto("wrong passphrase or tampered file".to_string()))?;
            let entries: HashMap<String, String> = serde_json::from_slice(&plaintext)?;
            debug!(path = %path.display(), entries = entries.len(), "Opened credential file");

            Sealed {
                path,
                salt,
                cipher,
                entries: Mutex::new(entries),
            }
        } else {
            let mut salt = [0u8; SALT_LEN];
            rand::thread_rng().fill_bytes(&mut salt);
            let cipher = derive_cipher(&kdf, passphrase, &salt)?;

            Sealed {
                path,
                salt,
                cipher,
                entries: Mutex::new(HashMap::new()),
            }
        };

        Ok(Self {
            sealed: Arc::new(sealed),
        })
    }

    pub fn path(&self) -> &Path {
        &self.sealed.path
    }
}

impl Sealed {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Backend("credential file lock poisoned".to_string()))
    }

    /// Apply `change` to a copy of the entries and commit it once the file
    /// is written. `change` returns false when there is nothing to write.
    fn update(
        &self,
        change: impl FnOnce(&mut HashMap<String, String>) -> bool,
    ) -> Result<(), StoreError> {
        let mut entries = self.lock()?;
        let mut updated = entries.clone();
        if !change(&mut updated) {
            return Ok(());
        }
        self.persist(&updated)?;
        *entries = updated;
        Ok(())
    }

    /// Seal `entries` and atomically replace the file
    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let plaintext = serde_json::to_vec(entries)?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|_| StoreError::Crypto("failed to seal credential file".to_string()))?;

        let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &out)?;
        restrict_permissions(&tmp)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Backend(format!("credential file task failed: {}", e)))?
}

fn derive_cipher(
    kdf: &Argon2<'_>,
    passphrase: &str,
    salt: &[u8],
) -> Result<ChaCha20Poly1305, StoreError> {
    let mut key = [0u8; KEY_LEN];
    kdf.hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| StoreError::Crypto(e.to_string()))?;
    Ok(ChaCha20Poly1305::new(Key::from_slice(&key)))
}

fn split_file(bytes: &[u8]) -> Result<([u8; SALT_LEN], &[u8], &[u8]), StoreError> {
    if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return Err(StoreError::Corrupt("missing header".to_string()));
    }
    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&bytes[MAGIC.len()..MAGIC.len() + SALT_LEN]);
    let nonce = &bytes[MAGIC.len() + SALT_LEN..HEADER_LEN];
    Ok((salt, nonce, &bytes[HEADER_LEN..]))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[async_trait]
impl CredentialStore for EncryptedFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.sealed.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let sealed = Arc::clone(&self.sealed);
        let (key, value) = (key.to_string(), value.to_string());
        run_blocking(move || {
            sealed.update(|entries| {
                entries.insert(key, value);
                true
            })
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let sealed = Arc::clone(&self.sealed);
        let key = key.to_string();
        run_blocking(move || sealed.update(|entries| entries.remove(&key).is_some())).await
    }
}
