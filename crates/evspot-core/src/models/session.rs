use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bearer session issued by the Identity Service.
///
/// `expires_at` is advisory. The client never enforces it; an empty value
/// means the expiry is unknown and the session is assumed valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Session {
    pub token: String,
    #[serde(default)]
    pub expires_at: String,
}

impl Session {
    pub fn new(token: impl Into<String>, expires_at: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: expires_at.into(),
        }
    }

    /// A session restored from the credential store. Only the token is
    /// persisted, so the expiry is unknown.
    pub fn restored(token: impl Into<String>) -> Self {
        Self::new(token, "")
    }

    /// Parse `expires_at` for display.
    /// Accepts RFC 3339 and naive ISO 8601 timestamps (read as UTC).
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        let raw = self.expires_at.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Get minutes remaining until the advertised expiry (for display)
    pub fn minutes_until_expiry(&self) -> Option<i64> {
        self.expiry()
            .map(|expiry| (expiry - Utc::now()).num_minutes().max(0))
    }
}
