//! REST client module for the evspot Identity Service.
//!
//! This module provides the `IdentityService` trait the session manager talks
//! to, and `IdentityClient`, its HTTP implementation.
//!
//! Login uses HTTP Basic credentials; token verification uses the bearer
//! token returned by login.

pub mod client;
pub mod error;
pub mod service;

pub use client::IdentityClient;
pub use error::ApiError;
pub use service::{IdentityService, LoginResponse, RegisterRequest, TokenStatus};
