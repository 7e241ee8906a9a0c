use thiserror::Error;

use crate::api::ApiError;
use crate::store::StoreError;

/// Message used when a rejected login carries no `detail`
pub const LOGIN_FAILED: &str = "Login failed";

/// Message used when a rejected registration carries no `detail`
pub const REGISTRATION_FAILED: &str = "Registration failed";

/// Errors returned by `SessionManager` operations.
/// `Display` yields a message fit to show the user.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Registration(String),

    #[error("Credential storage failed: {0}")]
    Storage(#[from] StoreError),

    #[error("Unable to reach the server: {0}")]
    Network(String),

    #[error("Unexpected server response: {0}")]
    InvalidResponse(String),

    #[error("Client configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    pub(crate) fn from_login(err: ApiError) -> Self {
        Self::from_api(err, AuthError::Authentication, LOGIN_FAILED)
    }

    pub(crate) fn from_register(err: ApiError) -> Self {
        Self::from_api(err, AuthError::Registration, REGISTRATION_FAILED)
    }

    fn from_api(err: ApiError, rejected: fn(String) -> Self, fallback: &str) -> Self {
        match err {
            ApiError::Rejected { detail, .. } => {
                rejected(detail.unwrap_or_else(|| fallback.to_string()))
            }
            ApiError::Network(msg) => AuthError::Network(msg),
            ApiError::InvalidResponse(msg) => AuthError::InvalidResponse(msg),
            ApiError::Configuration(msg) => AuthError::Configuration(msg),
        }
    }
}
