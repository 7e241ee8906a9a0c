//! Authentication module owning the client's session lifecycle.
//!
//! This module provides:
//! - `SessionManager`: the single source of truth for who is signed in,
//!   and the only component that performs hydrate, login, register and logout
//! - `AuthError`: failures surfaced to the presentation layer
//!
//! Sessions are restored optimistically at startup and verified against the
//! Identity Service afterwards. Expiry is never enforced client-side.

pub mod error;
pub mod manager;

pub use error::AuthError;
pub use manager::SessionManager;
