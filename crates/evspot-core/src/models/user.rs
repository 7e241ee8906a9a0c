use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl User {
    /// Build a user from login response fields.
    /// A missing or empty `name` falls back to the local-part of `login_email`.
    pub fn from_login(id: i64, name: Option<String>, email: String, login_email: &str) -> Self {
        let name = name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| local_part(login_email).to_string());
        Self { id, name, email }
    }

    /// Name for display, never empty as long as the email is not
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            local_part(&self.email)
        } else {
            &self.name
        }
    }
}

/// Everything before the first `@`, or the whole string if there is none
pub fn local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}
