//! Data models for authentication state.
//!
//! - `User`: the signed-in account, derived from the login response
//! - `Session`: opaque bearer token plus an advisory expiry
//! - `AuthState`: the snapshot published to the presentation layer

pub mod session;
pub mod state;
pub mod user;

pub use session::Session;
pub use state::AuthState;
pub use user::User;
