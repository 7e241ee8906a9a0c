use async_trait::async_trait;
use keyring::Entry;
use tracing::debug;

use super::{CredentialStore, StoreError};

/// Default keychain service name
pub const DEFAULT_SERVICE_NAME: &str = "evspot";

/// Credential store backed by the OS keychain.
///
/// Each logical key is one keychain entry under the configured service name.
/// Keychain calls block, so they run on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    async fn with_entry<T, F>(&self, key: &str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(Entry) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let service = self.service.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let entry = Entry::new(&service, &key)?;
            f(entry)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("keychain task failed: {}", e)))?
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME)
    }
}

#[async_trait]
impl CredentialStore for KeyringStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_entry(key, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let value = value.to_string();
        self.with_entry(key, move |entry| Ok(entry.set_password(&value)?))
            .await?;
        debug!(service = %self.service, key, "Stored keychain entry");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.with_entry(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        })
        .await?;
        debug!(service = %self.service, key, "Deleted keychain entry");
        Ok(())
    }
}
