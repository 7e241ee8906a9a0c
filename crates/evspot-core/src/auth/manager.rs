//! Session manager: owns `AuthState` for the lifetime of the process.
//!
//! State changes are published on a `tokio::sync::watch` channel so the
//! presentation layer can react to `is_authenticated` flipping. The loading
//! flag is a single shared boolean; concurrent operations are not serialized
//! and callers are expected to disable their triggers while it is set.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::{IdentityService, RegisterRequest, TokenStatus};
use crate::models::{AuthState, Session, User};
use crate::store::{CredentialStore, StoreError, SESSION_TOKEN_KEY, USER_DATA_KEY};

use super::AuthError;

/// Handle to the process-wide authentication state.
/// Clone is cheap; all clones share the same state and collaborators.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    identity: Arc<dyn IdentityService>,
    store: Arc<dyn CredentialStore>,
    state: watch::Sender<AuthState>,
}

/// Clears the loading flag when dropped, whatever path the operation took
struct LoadingGuard<'a> {
    state: &'a watch::Sender<AuthState>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.send_if_modified(|s| {
            let was_loading = s.is_loading;
            s.is_loading = false;
            was_loading
        });
    }
}

impl SessionManager {
    pub fn new(identity: Arc<dyn IdentityService>, store: Arc<dyn CredentialStore>) -> Self {
        let (state, _) = watch::channel(AuthState::initial());
        Self {
            inner: Arc::new(Inner {
                identity,
                store,
                state,
            }),
        }
    }

    // =========================================================================
    // State access
    // =========================================================================

    /// Current snapshot
    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    /// Receive every published state change
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading
    }

    pub fn user(&self) -> Option<User> {
        self.inner.state.borrow().user.clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.state.borrow().session.clone()
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Restore a persisted session. Call once at startup.
    ///
    /// A stored session is trusted immediately and then checked against the
    /// Identity Service. Only an explicit rejection signs the user out; if
    /// the service cannot be reached the stored session is kept. Never fails,
    /// and loading is always false afterwards.
    pub async fn hydrate(&self) {
        let _loading = self.begin_loading();

        let (token, user) = match self.load_stored().await {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                debug!("No stored session found");
                return;
            }
            Err(e) => {
                error!(error = %e, "Failed to load stored session");
                return;
            }
        };

        let user_id = user.id;
        self.publish(|s| s.sign_in(user, Session::restored(token.clone())));
        debug!(user_id, "Restored stored session, verifying");

        match self.inner.identity.verify(&token).await {
            Ok(TokenStatus::Valid) => {
                info!(user_id, "Stored session verified");
            }
            Ok(TokenStatus::Rejected(status)) => {
                warn!(user_id, status, "Stored session rejected, signing out");
                if let Err(e) = self.clear_storage().await {
                    error!(error = %e, "Failed to clear rejected session from storage");
                }
                self.publish(|s| s.sign_out());
            }
            Err(e) => {
                warn!(user_id, error = %e, "Could not verify stored session, keeping it");
            }
        }
    }

    /// Sign in with email and password.
    ///
    /// Credentials are persisted before the in-memory state changes, so an
    /// observer never sees a signed-in state that is not on disk. On failure
    /// the state is left as it was.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let _loading = self.begin_loading();
        self.authenticate(email, password).await
    }

    /// Create an account, then sign in with the same credentials.
    /// Loading stays set across both requests.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<(), AuthError> {
        let _loading = self.begin_loading();

        let request = RegisterRequest {
            name,
            email,
            password,
        };
        self.inner
            .identity
            .register(&request)
            .await
            .map_err(AuthError::from_register)?;
        info!("Account registered, signing in");

        self.authenticate(email, password).await
    }

    /// Forget the current session. Purely local; no request is made.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let _loading = self.begin_loading();
        self.clear_storage().await?;
        self.publish(|s| s.sign_out());
        info!("Signed out");
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn authenticate(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let response = self
            .inner
            .identity
            .login(email, password)
            .await
            .map_err(AuthError::from_login)?;

        let user_email = response.email.unwrap_or_else(|| email.to_string());
        let user = User::from_login(response.id, response.name, user_email, email);
        let session = response.session;

        self.persist(&session.token, &user).await?;

        let user_id = user.id;
        self.publish(|s| s.sign_in(user, session));
        info!(user_id, "Signed in");
        Ok(())
    }

    /// Read the stored token and user. Both must be present.
    async fn load_stored(&self) -> Result<Option<(String, User)>, StoreError> {
        let token = self.inner.store.get(SESSION_TOKEN_KEY).await?;
        let user_data = self.inner.store.get(USER_DATA_KEY).await?;

        match (token, user_data) {
            (Some(token), Some(user_data)) => {
                let user: User = serde_json::from_str(&user_data)?;
                Ok(Some((token, user)))
            }
            (token, user_data) => {
                if token.is_some() != user_data.is_some() {
                    warn!(
                        has_token = token.is_some(),
                        has_user = user_data.is_some(),
                        "Stored session is incomplete, ignoring it"
                    );
                }
                Ok(None)
            }
        }
    }

    async fn persist(&self, token: &str, user: &User) -> Result<(), StoreError> {
        let user_data = serde_json::to_string(user)?;
        // Drop the previous record first so a failed write never pairs this
        // token with another user's data
        self.inner.store.delete(USER_DATA_KEY).await?;
        self.inner.store.set(SESSION_TOKEN_KEY, token).await?;
        self.inner.store.set(USER_DATA_KEY, &user_data).await?;
        Ok(())
    }

    async fn clear_storage(&self) -> Result<(), StoreError> {
        self.inner.store.delete(SESSION_TOKEN_KEY).await?;
        self.inner.store.delete(USER_DATA_KEY).await?;
        Ok(())
    }

    fn begin_loading(&self) -> LoadingGuard<'_> {
        self.publish(|s| s.is_loading = true);
        LoadingGuard {
            state: &self.inner.state,
        }
    }

    /// Apply `f` and notify subscribers only if the state actually changed
    fn publish(&self, f: impl FnOnce(&mut AuthState)) {
        self.inner.state.send_if_modified(|s| {
            let before = s.clone();
            f(s);
            *s != before
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Mutex, OnceLock};

    use async_trait::async_trait;

    use crate::api::{ApiError, LoginResponse};
    use crate::auth::error::{LOGIN_FAILED, REGISTRATION_FAILED};
    use crate::store::MemoryStore;

    // -------------------------------------------------------------------------
    // Test doubles
    // -------------------------------------------------------------------------

    /// Scripted Identity Service that records every call
    #[derive(Default)]
    struct FakeIdentity {
        logins: Mutex<VecDeque<Result<LoginResponse, ApiError>>>,
        registrations: Mutex<VecDeque<Result<(), ApiError>>>,
        verifications: Mutex<VecDeque<Result<TokenStatus, ApiError>>>,
        calls: Mutex<Vec<String>>,
        seen: Mutex<Vec<AuthState>>,
        observer: OnceLock<watch::Receiver<AuthState>>,
    }

    impl FakeIdentity {
        fn with_login(self, reply: Result<LoginResponse, ApiError>) -> Self {
            self.logins.lock().unwrap().push_back(reply);
            self
        }

        fn with_register(self, reply: Result<(), ApiError>) -> Self {
            self.registrations.lock().unwrap().push_back(reply);
            self
        }

        fn with_verify(self, reply: Result<TokenStatus, ApiError>) -> Self {
            self.verifications.lock().unwrap().push_back(reply);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        /// Loading flag as observed at the start of each call
        fn loading_seen(&self) -> Vec<bool> {
            self.seen.lock().unwrap().iter().map(|s| s.is_loading).collect()
        }

        fn record(&self, call: String) {
            if let Some(rx) = self.observer.get() {
                let snapshot = rx.borrow().clone();
                self.seen.lock().unwrap().push(snapshot);
            }
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl IdentityService for FakeIdentity {
        async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
            self.record(format!("login:{}:{}", email, password));
            self.logins.lock().unwrap().pop_front().expect("unexpected login call")
        }

        async fn register(&self, request: &RegisterRequest<'_>) -> Result<(), ApiError> {
            self.record(format!("register:{}:{}", request.name, request.email));
            self.registrations.lock().unwrap().pop_front().expect("unexpected register call")
        }

        async fn verify(&self, token: &str) -> Result<TokenStatus, ApiError> {
            self.record(format!("verify:{}", token));
            self.verifications.lock().unwrap().pop_front().expect("unexpected verify call")
        }
    }

    /// Memory store with switchable failures
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_reads: bool,
        fail_writes: bool,
        fail_deletes: bool,
        /// Fail writes to this key only
        fail_writes_to: Option<&'static str>,
    }

    #[async_trait]
    impl CredentialStore for FlakyStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            if self.fail_reads {
                return Err(StoreError::Backend("read failed".to_string()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            if self.fail_writes || self.fail_writes_to == Some(key) {
                return Err(StoreError::Backend("write failed".to_string()));
            }
            self.inner.set(key, value).await
        }

        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            if self.fail_deletes {
                return Err(StoreError::Backend("delete failed".to_string()));
            }
            self.inner.delete(key).await
        }
    }

    fn login_ok(id: i64, name: Option<&str>, email: &str, token: &str) -> Result<LoginResponse, ApiError> {
        Ok(LoginResponse {
            id,
            name: name.map(str::to_string),
            email: Some(email.to_string()),
            session: Session::new(token, "2030-01-01T00:00:00Z"),
        })
    }

    fn rejected(status: u16, detail: Option<&str>) -> ApiError {
        ApiError::Rejected {
            status,
            detail: detail.map(str::to_string),
        }
    }

    fn jane() -> User {
        User {
            id: 7,
            name: "Jane".to_string(),
            email: "jane@x.com".to_string(),
        }
    }

    async fn seed<S: CredentialStore>(store: &S, token: &str, user: &User) {
        store.set(SESSION_TOKEN_KEY, token).await.unwrap();
        store
            .set(USER_DATA_KEY, &serde_json::to_string(user).unwrap())
            .await
            .unwrap();
    }

    fn manager<S: CredentialStore + 'static>(
        identity: FakeIdentity,
        store: S,
    ) -> (SessionManager, Arc<FakeIdentity>, Arc<S>) {
        let identity = Arc::new(identity);
        let store = Arc::new(store);
        let manager = SessionManager::new(identity.clone(), store.clone());
        let _ = identity.observer.set(manager.subscribe());
        (manager, identity, store)
    }

    /// Manager that has already hydrated from an empty store
    async fn ready<S: CredentialStore + 'static>(
        identity: FakeIdentity,
        store: S,
    ) -> (SessionManager, Arc<FakeIdentity>, Arc<S>) {
        let (manager, identity, store) = manager(identity, store);
        manager.hydrate().await;
        assert!(!manager.is_authenticated());
        (manager, identity, store)
    }

    // -------------------------------------------------------------------------
    // Hydrate
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_starts_loading_before_hydrate() {
        let (manager, _, _) = manager(FakeIdentity::default(), MemoryStore::new());
        assert!(manager.is_loading());
        assert!(!manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_hydrate_empty_store_makes_no_calls() {
        let (manager, identity, _) = manager(FakeIdentity::default(), MemoryStore::new());

        manager.hydrate().await;
        manager.hydrate().await;

        assert!(!manager.is_authenticated());
        assert!(!manager.is_loading());
        assert!(identity.calls().is_empty());
    }

    #[tokio::test]
    async fn test_hydrate_restores_and_verifies_stored_session() {
        let store = MemoryStore::new();
        seed(&store, "stored-token", &jane()).await;
        let identity = FakeIdentity::default().with_verify(Ok(TokenStatus::Valid));
        let (manager, identity, _) = manager(identity, store);

        manager.hydrate().await;

        let state = manager.state();
        assert!(state.is_authenticated());
        assert!(!state.is_loading);
        assert_eq!(state.user, Some(jane()));
        assert_eq!(state.session, Some(Session::restored("stored-token")));
        assert_eq!(identity.calls(), vec!["verify:stored-token"]);
    }

    #[tokio::test]
    async fn test_hydrate_trusts_before_verifying() {
        let store = MemoryStore::new();
        seed(&store, "stored-token", &jane()).await;
        let identity = FakeIdentity::default().with_verify(Ok(TokenStatus::Valid));
        let (manager, identity, _) = manager(identity, store);

        manager.hydrate().await;

        // The restored session was already visible while verification ran
        let seen = identity.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].is_authenticated());
        assert!(seen[0].is_loading);
        assert_eq!(seen[0].session, Some(Session::restored("stored-token")));
    }

    #[tokio::test]
    async fn test_hydrate_rejected_token_clears_everything() {
        let store = MemoryStore::new();
        seed(&store, "revoked", &jane()).await;
        let identity = FakeIdentity::default().with_verify(Ok(TokenStatus::Rejected(401)));
        let (manager, _, store) = manager(identity, store);

        manager.hydrate().await;

        assert!(!manager.is_authenticated());
        assert!(!manager.is_loading());
        assert_eq!(store.get(SESSION_TOKEN_KEY).await.unwrap(), None);
        assert_eq!(store.get(USER_DATA_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_hydrate_rejected_token_signs_out_even_if_delete_fails() {
        let store = FlakyStore {
            fail_deletes: true,
            ..Default::default()
        };
        seed(&store, "revoked", &jane()).await;
        let identity = FakeIdentity::default().with_verify(Ok(TokenStatus::Rejected(403)));
        let (manager, _, _) = manager(identity, store);

        manager.hydrate().await;

        assert!(!manager.is_authenticated());
        assert!(!manager.is_loading());
    }

    #[tokio::test]
    async fn test_hydrate_keeps_session_when_service_unreachable() {
        let store = MemoryStore::new();
        seed(&store, "stored-token", &jane()).await;
        let identity = FakeIdentity::default()
            .with_verify(Err(ApiError::Network("connection refused".to_string())));
        let (manager, _, store) = manager(identity, store);

        manager.hydrate().await;

        assert!(manager.is_authenticated());
        assert!(!manager.is_loading());
        assert_eq!(manager.user(), Some(jane()));
        assert_eq!(manager.session().map(|s| s.token), Some("stored-token".to_string()));
        assert_eq!(store.get(SESSION_TOKEN_KEY).await.unwrap().as_deref(), Some("stored-token"));
    }

    #[tokio::test]
    async fn test_hydrate_ignores_half_stored_session() {
        let store = MemoryStore::new();
        store.set(SESSION_TOKEN_KEY, "orphan").await.unwrap();
        let (manager, identity, _) = manager(FakeIdentity::default(), store);

        manager.hydrate().await;

        assert!(!manager.is_authenticated());
        assert!(!manager.is_loading());
        assert!(identity.calls().is_empty());
    }

    #[tokio::test]
    async fn test_hydrate_survives_corrupt_user_data() {
        let store = MemoryStore::new();
        store.set(SESSION_TOKEN_KEY, "tok").await.unwrap();
        store.set(USER_DATA_KEY, "{not json").await.unwrap();
        let (manager, identity, _) = manager(FakeIdentity::default(), store);

        manager.hydrate().await;

        assert!(!manager.is_authenticated());
        assert!(!manager.is_loading());
        assert!(identity.calls().is_empty());
    }

    #[tokio::test]
    async fn test_hydrate_survives_storage_read_failure() {
        let store = FlakyStore {
            fail_reads: true,
            ..Default::default()
        };
        let (manager, identity, _) = manager(FakeIdentity::default(), store);

        manager.hydrate().await;

        assert!(!manager.is_authenticated());
        assert!(!manager.is_loading());
        assert!(identity.calls().is_empty());
    }

    // -------------------------------------------------------------------------
    // Login
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_login_persists_then_authenticates() {
        let identity = FakeIdentity::default().with_login(login_ok(7, Some("Jane"), "jane@x.com", "tok-1"));
        let (manager, identity, store) = ready(identity, MemoryStore::new()).await;

        manager.login("jane@x.com", "secret").await.unwrap();

        let state = manager.state();
        assert!(state.is_authenticated());
        assert!(!state.is_loading);
        assert_eq!(state.user, Some(jane()));
        assert_eq!(state.session, Some(Session::new("tok-1", "2030-01-01T00:00:00Z")));

        assert_eq!(store.get(SESSION_TOKEN_KEY).await.unwrap().as_deref(), Some("tok-1"));
        let stored: User = serde_json::from_str(&store.get(USER_DATA_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(stored, jane());

        assert_eq!(identity.calls(), vec!["login:jane@x.com:secret"]);
        assert_eq!(identity.loading_seen(), vec![true]);
    }

    #[tokio::test]
    async fn test_login_name_falls_back_to_email_local_part() {
        let identity = FakeIdentity::default().with_login(login_ok(3, None, "jane@x.com", "tok"));
        let (manager, _, _) = ready(identity, MemoryStore::new()).await;

        manager.login("jane@x.com", "pw").await.unwrap();

        assert_eq!(manager.user().map(|u| u.name), Some("jane".to_string()));
    }

    #[tokio::test]
    async fn test_login_rejection_uses_server_detail() {
        let identity = FakeIdentity::default().with_login(Err(rejected(401, Some("Invalid email or password"))));
        let (manager, _, store) = ready(identity, MemoryStore::new()).await;

        let err = manager.login("jane@x.com", "wrong").await.unwrap_err();

        assert!(matches!(err, AuthError::Authentication(_)));
        assert_eq!(err.to_string(), "Invalid email or password");
        assert!(!manager.is_authenticated());
        assert!(!manager.is_loading());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_login_rejection_without_detail_uses_generic_message() {
        let identity = FakeIdentity::default().with_login(Err(rejected(500, None)));
        let (manager, _, _) = ready(identity, MemoryStore::new()).await;

        let err = manager.login("jane@x.com", "pw").await.unwrap_err();
        assert_eq!(err.to_string(), LOGIN_FAILED);
    }

    #[tokio::test]
    async fn test_failed_login_leaves_existing_session_untouched() {
        let identity = FakeIdentity::default()
            .with_login(login_ok(7, Some("Jane"), "jane@x.com", "tok-1"))
            .with_login(Err(rejected(401, Some("nope"))));
        let (manager, _, store) = ready(identity, MemoryStore::new()).await;

        manager.login("jane@x.com", "secret").await.unwrap();
        let before = manager.state();

        assert!(manager.login("other@x.com", "bad").await.is_err());

        assert_eq!(manager.state(), before);
        assert_eq!(store.get(SESSION_TOKEN_KEY).await.unwrap().as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn test_login_network_failure() {
        let identity = FakeIdentity::default().with_login(Err(ApiError::Network("timed out".to_string())));
        let (manager, _, _) = ready(identity, MemoryStore::new()).await;

        let err = manager.login("jane@x.com", "pw").await.unwrap_err();

        assert!(matches!(err, AuthError::Network(_)));
        assert!(!manager.is_authenticated());
        assert!(!manager.is_loading());
    }

    #[tokio::test]
    async fn test_login_storage_failure_keeps_memory_signed_out() {
        let store = FlakyStore {
            fail_writes: true,
            ..Default::default()
        };
        let identity = FakeIdentity::default().with_login(login_ok(7, Some("Jane"), "jane@x.com", "tok"));
        let (manager, _, _) = ready(identity, store).await;

        let err = manager.login("jane@x.com", "pw").await.unwrap_err();

        assert!(matches!(err, AuthError::Storage(_)));
        assert!(!manager.is_authenticated());
        assert!(!manager.is_loading());
    }

    #[tokio::test]
    async fn test_failed_user_write_never_leaves_mismatched_pair() {
        let store = FlakyStore {
            fail_writes_to: Some(USER_DATA_KEY),
            ..Default::default()
        };
        let identity = FakeIdentity::default().with_login(login_ok(9, Some("Sam"), "sam@x.com", "sam-token"));
        let (manager, _, store) = ready(identity, store).await;
        seed(&store.inner, "jane-token", &jane()).await;

        let err = manager.login("sam@x.com", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));
        assert!(!manager.is_authenticated());

        assert_eq!(store.inner.get(SESSION_TOKEN_KEY).await.unwrap().as_deref(), Some("sam-token"));
        assert_eq!(store.inner.get(USER_DATA_KEY).await.unwrap(), None);

        // Next start finds no complete session and does not restore Jane
        let identity = Arc::new(FakeIdentity::default());
        let restarted = SessionManager::new(identity.clone(), store.clone());
        restarted.hydrate().await;
        assert!(!restarted.is_authenticated());
        assert!(identity.calls().is_empty());
    }

    #[tokio::test]
    async fn test_login_without_email_in_response_uses_login_email() {
        let identity = FakeIdentity::default().with_login(Ok(LoginResponse {
            id: 4,
            name: None,
            email: None,
            session: Session::new("tok", ""),
        }));
        let (manager, _, _) = ready(identity, MemoryStore::new()).await;

        manager.login("sam@charge.io", "pw").await.unwrap();

        let user = manager.user().unwrap();
        assert_eq!(user.email, "sam@charge.io");
        assert_eq!(user.name, "sam");
    }

    // -------------------------------------------------------------------------
    // Register
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_register_then_auto_login() {
        let identity = FakeIdentity::default()
            .with_register(Ok(()))
            .with_login(login_ok(11, Some("Jane From Login"), "jane@x.com", "tok-new"));
        let (manager, identity, store) = ready(identity, MemoryStore::new()).await;

        manager.register("Jane From Form", "jane@x.com", "secret").await.unwrap();

        assert!(manager.is_authenticated());
        assert!(!manager.is_loading());
        let user = manager.user().unwrap();
        assert_eq!(user.id, 11);
        assert_eq!(user.name, "Jane From Login");
        assert_eq!(store.get(SESSION_TOKEN_KEY).await.unwrap().as_deref(), Some("tok-new"));

        assert_eq!(
            identity.calls(),
            vec!["register:Jane From Form:jane@x.com", "login:jane@x.com:secret"]
        );
        // Loading is held across both requests
        assert_eq!(identity.loading_seen(), vec![true, true]);
    }

    #[tokio::test]
    async fn test_register_rejection_skips_login() {
        let identity = FakeIdentity::default().with_register(Err(rejected(400, Some("Email already registered"))));
        let (manager, identity, _) = ready(identity, MemoryStore::new()).await;

        let err = manager.register("Jane", "jane@x.com", "pw").await.unwrap_err();

        assert!(matches!(err, AuthError::Registration(_)));
        assert_eq!(err.to_string(), "Email already registered");
        assert!(!manager.is_authenticated());
        assert!(!manager.is_loading());
        assert_eq!(identity.calls(), vec!["register:Jane:jane@x.com"]);
    }

    #[tokio::test]
    async fn test_register_rejection_without_detail() {
        let identity = FakeIdentity::default().with_register(Err(rejected(422, None)));
        let (manager, _, _) = ready(identity, MemoryStore::new()).await;

        let err = manager.register("Jane", "jane@x.com", "pw").await.unwrap_err();
        assert_eq!(err.to_string(), REGISTRATION_FAILED);
    }

    #[tokio::test]
    async fn test_register_ok_but_login_fails() {
        let identity = FakeIdentity::default()
            .with_register(Ok(()))
            .with_login(Err(rejected(401, None)));
        let (manager, _, store) = ready(identity, MemoryStore::new()).await;

        let err = manager.register("Jane", "jane@x.com", "pw").await.unwrap_err();

        assert!(matches!(err, AuthError::Authentication(_)));
        assert!(!manager.is_authenticated());
        assert!(!manager.is_loading());
        assert!(store.is_empty());
    }

    // -------------------------------------------------------------------------
    // Logout
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_logout_clears_state_and_storage() {
        let identity = FakeIdentity::default().with_login(login_ok(7, Some("Jane"), "jane@x.com", "tok"));
        let (manager, identity, store) = ready(identity, MemoryStore::new()).await;
        manager.login("jane@x.com", "pw").await.unwrap();

        manager.logout().await.unwrap();

        let state = manager.state();
        assert!(state.user.is_none());
        assert!(state.session.is_none());
        assert!(!state.is_loading);
        assert!(store.is_empty());
        // Logout never talks to the server
        assert_eq!(identity.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_logout_when_signed_out() {
        let (manager, _, store) = ready(FakeIdentity::default(), MemoryStore::new()).await;

        manager.logout().await.unwrap();

        assert!(!manager.is_authenticated());
        assert!(!manager.is_loading());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_logout_storage_failure_propagates() {
        let store = FlakyStore {
            fail_deletes: true,
            ..Default::default()
        };
        let (manager, _, _) = ready(FakeIdentity::default(), store).await;

        let err = manager.logout().await.unwrap_err();

        assert!(matches!(err, AuthError::Storage(_)));
        assert!(!manager.is_loading());
    }

    // -------------------------------------------------------------------------
    // Publishing
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_identical_updates_do_not_notify() {
        let (manager, _, _) = ready(FakeIdentity::default(), MemoryStore::new()).await;
        let mut rx = manager.subscribe();
        rx.borrow_and_update();

        manager.publish(|s| s.sign_out());
        assert!(!rx.has_changed().unwrap());

        manager.publish(|s| s.is_loading = true);
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let identity = FakeIdentity::default().with_login(login_ok(7, Some("Jane"), "jane@x.com", "tok"));
        let (manager, _, _) = ready(identity, MemoryStore::new()).await;
        let handle = manager.clone();

        handle.login("jane@x.com", "pw").await.unwrap();

        assert!(manager.is_authenticated());
    }
}
