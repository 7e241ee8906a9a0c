use serde::Serialize;

use super::{Session, User};

/// Snapshot of authentication state as seen by the presentation layer.
///
/// `user` and `session` are always set or cleared together. `is_loading` is
/// orthogonal: it can be true while authenticated (e.g. verifying a restored
/// session) or unauthenticated (e.g. a login in flight).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AuthState {
    pub user: Option<User>,
    pub session: Option<Session>,
    pub is_loading: bool,
}

impl AuthState {
    /// State of a freshly launched process that has not hydrated yet
    pub fn initial() -> Self {
        Self {
            user: None,
            session: None,
            is_loading: true,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.session.is_some()
    }

    pub(crate) fn sign_in(&mut self, user: User, session: Session) {
        self.user = Some(user);
        self.session = Some(session);
    }

    pub(crate) fn sign_out(&mut self) {
        self.user = None;
        self.session = None;
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::initial()
    }
}
