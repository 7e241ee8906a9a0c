//! Client configuration management.
//!
//! This module handles loading and saving the client configuration, which
//! names the Identity Service, the credential store backend and the last
//! email used to sign in.
//!
//! Configuration is stored at `~/.config/evspot/config.json` (platform
//! equivalent via `dirs`).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_API_BASE_URL;
use crate::api::IdentityClient;
use crate::store::keychain::DEFAULT_SERVICE_NAME;
use crate::store::{CredentialStore, EncryptedFileStore, KeyringStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "evspot";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Encrypted credential file name, used by the file store backend
const CREDENTIALS_FILE: &str = "credentials.bin";

/// Environment variable overriding the Identity Service base URL
pub const API_URL_ENV: &str = "EVSPOT_API_URL";

/// Environment variable holding the passphrase for the file store backend
pub const STORE_PASSPHRASE_ENV: &str = "EVSPOT_STORE_PASSPHRASE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Keyring,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api_url: Option<String>,
    pub store: StoreBackend,
    pub keyring_service: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Location of the encrypted credential file
    pub fn credentials_path(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME).join(CREDENTIALS_FILE))
    }

    /// Identity Service base URL: environment, then config, then default
    pub fn api_url(&self) -> String {
        self.resolve_api_url(std::env::var(API_URL_ENV).ok())
    }

    fn resolve_api_url(&self, from_env: Option<String>) -> String {
        from_env
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    pub fn keyring_service(&self) -> &str {
        self.keyring_service.as_deref().unwrap_or(DEFAULT_SERVICE_NAME)
    }

    /// Request timeout, if one is configured. Zero means no timeout.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// HTTP client for the configured Identity Service
    pub fn identity_client(&self) -> Result<IdentityClient> {
        IdentityClient::with_timeout(&self.api_url(), self.request_timeout())
            .context("Failed to create identity client")
    }

    /// Open the configured credential store backend
    pub async fn open_store(&self) -> Result<Arc<dyn CredentialStore>> {
        match self.store {
            StoreBackend::Keyring => Ok(Arc::new(KeyringStore::new(self.keyring_service()))),
            StoreBackend::File => {
                let passphrase = std::env::var(STORE_PASSPHRASE_ENV).with_context(|| {
                    format!("{} must be set to use the file credential store", STORE_PASSPHRASE_ENV)
                })?;
                let path = self.credentials_path()?;
                let store = EncryptedFileStore::open_async(&path, &passphrase)
                    .await
                    .with_context(|| format!("Failed to open credential file {}", path.display()))?;
                Ok(Arc::new(store))
            }
        }
    }
}
