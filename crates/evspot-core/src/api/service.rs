use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::Session;

use super::ApiError;

/// Successful `/auth/login` response body
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub session: Session,
}

/// `/auth/register` request body
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Outcome of asking `/auth/me` whether a token is still good.
/// Transport failures are reported as `Err(ApiError)` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Valid,
    Rejected(u16),
}

/// The remote Identity Service as seen by the session manager
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Exchange email/password for a user record and session
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError>;

    /// Create an account. Does not establish a session.
    async fn register(&self, request: &RegisterRequest<'_>) -> Result<(), ApiError>;

    /// Check a bearer token against `/auth/me`
    async fn verify(&self, token: &str) -> Result<TokenStatus, ApiError>;
}
