//! HTTP client for the evspot Identity Service.
//!
//! `IdentityClient` is the production `IdentityService`: it speaks JSON over
//! HTTP(S) to the three `/auth` endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Response};
use tracing::debug;

use super::service::{IdentityService, LoginResponse, RegisterRequest, TokenStatus};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Identity Service address used when neither the environment nor the
/// config file names one
pub const DEFAULT_API_BASE_URL: &str = "http://54.147.246.169:8000";

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";
const ME_PATH: &str = "/auth/me";

/// Identity Service client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct IdentityClient {
    client: Client,
    base_url: String,
}

impl IdentityClient {
    /// Create a client with the transport's default timeouts
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, None)
    }

    /// Create a client with an optional overall request timeout
    pub fn with_timeout(base_url: &str, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with the parsed
    /// `detail` if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            debug!(
                status = status.as_u16(),
                body = %ApiError::truncate_body(&body),
                "Identity service rejected request"
            );
            Err(ApiError::from_status(status, &body))
        }
    }
}

#[async_trait]
impl IdentityService for IdentityClient {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .basic_auth(email, Some(password))
            .header(header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let login: LoginResponse = response.json().await?;
        debug!(user_id = login.id, "Login accepted");
        Ok(login)
    }

    async fn register(&self, request: &RegisterRequest<'_>) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url(REGISTER_PATH))
            .json(request)
            .send()
            .await?;

        // Any 2xx is enough; the body is not used
        Self::check_response(response).await?;
        Ok(())
    }

    async fn verify(&self, token: &str) -> Result<TokenStatus, ApiError> {
        let response = self
            .client
            .get(self.url(ME_PATH))
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(TokenStatus::Valid)
        } else {
            debug!(status = status.as_u16(), "Token verification rejected");
            Ok(TokenStatus::Rejected(status.as_u16()))
        }
    }
}
