//! Core library for the evspot charging/service locator client.
//!
//! Everything the presentation layer needs to know about who is signed in
//! lives here:
//!
//! - `models`: `User`, `Session` and the `AuthState` snapshot
//! - `api`: HTTP client for the Identity Service (`/auth/login`, `/auth/register`, `/auth/me`)
//! - `store`: Secure Credential Store backends (OS keychain, encrypted file, memory)
//! - `auth`: the `SessionManager` that owns authentication state
//! - `config`: persisted client configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod store;

pub use api::{ApiError, IdentityClient, IdentityService};
pub use auth::{AuthError, SessionManager};
pub use config::{Config, StoreBackend};
pub use models::{AuthState, Session, User};
pub use store::{CredentialStore, EncryptedFileStore, KeyringStore, MemoryStore, StoreError};
