//! Authentication context
//!
//! Holds `{ user, is_loading }` for the rest of the app. The state starts as
//! loading, the stored session is restored in the background, and backend
//! session-change notifications keep `user` current for as long as the
//! context lives.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::result::{Error, OperationResult};
use crate::domain::{SignUpOutcome, User};
use crate::ports::AuthBackend;

/// Minimum password length accepted by the sign-in/sign-up form
pub const MIN_PASSWORD_LEN: usize = 6;

/// Snapshot of the authentication state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<User>,
    pub is_loading: bool,
    /// Why the stored session could not be checked, when the restore failed
    pub restore_error: Option<String>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            user: None,
            is_loading: true,
            restore_error: None,
        }
    }
}

/// Shared authentication state plus the actions that change it
pub struct AuthContext {
    backend: Arc<dyn AuthBackend>,
    state: Arc<watch::Sender<AuthState>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl AuthContext {
    /// Start the context: restore the stored session and follow backend notifications
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(backend: Arc<dyn AuthBackend>) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        let state = Arc::new(state);

        // Subscribe before the restore so no notification falls in between
        let mut changes = backend.subscribe();

        let listener = tokio::spawn({
            let backend = Arc::clone(&backend);
            let state = Arc::clone(&state);
            async move {
                let restored = restore_user(backend.as_ref()).await;
                state.send_modify(|s| {
                    s.apply_restore(restored);
                    s.is_loading = false;
                });

                loop {
                    match changes.recv().await {
                        Ok(change) => {
                            let user = change.session.map(|session| session.user);
                            state.send_modify(|s| {
                                s.user = user;
                                s.restore_error = None;
                            });
                        }
                        Err(RecvError::Lagged(_)) => {
                            // Missed notifications; ask the backend directly
                            let restored = restore_user(backend.as_ref()).await;
                            state.send_modify(|s| s.apply_restore(restored));
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        });

        Self {
            backend,
            state,
            listener: Mutex::new(Some(listener)),
        }
    }

    /// Current state snapshot
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Signed-in user, if any
    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    /// Receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Wait for the initial session restore and return the settled state
    pub async fn wait_until_ready(&self) -> AuthState {
        let mut rx = self.state.subscribe();
        let settled = rx.wait_for(|s| !s.is_loading).await.map(|s| s.clone());
        settled.unwrap_or_else(|_| self.state())
    }

    /// Name of the backend behind this context
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Sign in; failures come back as a value for inline display
    pub async fn sign_in(&self, email: &str, password: &str) -> OperationResult<User> {
        if let Err(msg) = validate_credentials(email, password) {
            return OperationResult::fail(msg);
        }

        match self.backend.sign_in(email.trim(), password).await {
            Ok(session) => {
                let user = session.user;
                self.set_user(Some(user.clone()));
                OperationResult::ok(user)
            }
            Err(e) => OperationResult::fail(form_message(&e)),
        }
    }

    /// Create an account; the outcome says whether e-mail confirmation is pending
    pub async fn sign_up(&self, email: &str, password: &str) -> OperationResult<SignUpOutcome> {
        if let Err(msg) = validate_credentials(email, password) {
            return OperationResult::fail(msg);
        }

        match self.backend.sign_up(email.trim(), password).await {
            Ok(outcome) => {
                if let SignUpOutcome::SignedIn { user } = &outcome {
                    self.set_user(Some(user.clone()));
                }
                OperationResult::ok(outcome)
            }
            Err(e) => OperationResult::fail(form_message(&e)),
        }
    }

    /// Sign out; the next render is the signed-out view
    pub async fn sign_out(&self) -> OperationResult<()> {
        let result = self.backend.sign_out().await;
        // Local state is cleared even when the backend call fails
        self.set_user(None);
        match result {
            Ok(()) => OperationResult::ok(()),
            Err(e) => OperationResult::fail(form_message(&e)),
        }
    }

    /// Stop following backend notifications
    pub fn shutdown(&self) {
        if let Ok(mut listener) = self.listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
            }
        }
        // A restore that never finished must not leave waiters hanging
        self.state.send_if_modified(|s| {
            let was_loading = s.is_loading;
            s.is_loading = false;
            was_loading
        });
    }

    fn set_user(&self, user: Option<User>) {
        self.state.send_modify(|s| {
            s.user = user;
            s.is_loading = false;
            s.restore_error = None;
        });
    }
}

impl Drop for AuthContext {
    fn drop(&mut self) {
        if let Ok(mut listener) = self.listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
            }
        }
    }
}

impl AuthState {
    fn apply_restore(&mut self, restored: Result<Option<User>, String>) {
        match restored {
            Ok(user) => {
                self.user = user;
                self.restore_error = None;
            }
            Err(msg) => {
                self.user = None;
                self.restore_error = Some(msg);
            }
        }
    }
}

async fn restore_user(backend: &dyn AuthBackend) -> Result<Option<User>, String> {
    match backend.current_session().await {
        Ok(session) => Ok(session.map(|s| s.user)),
        Err(e) => {
            eprintln!("[taskpad] Could not restore session: {}", e);
            Err(e.to_string())
        }
    }
}

/// Form-level checks done before any backend call
pub fn validate_credentials(email: &str, password: &str) -> std::result::Result<(), String> {
    if email.trim().is_empty() {
        return Err("Email is required".to_string());
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    Ok(())
}

/// Message shown on the auth form for a backend failure
fn form_message(error: &Error) -> String {
    match error {
        Error::Auth(msg) => msg.clone(),
        Error::NotConfigured | Error::NotAuthenticated | Error::Network(_) | Error::Backend(_) => {
            error.to_string()
        }
        _ => "Unexpected error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::Result;
    use crate::domain::{AuthChange, Session};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::{broadcast, Notify};

    /// Backend double with a controllable restore and call counting
    struct FakeAuth {
        stored: Mutex<Option<Session>>,
        restore_gate: Option<Arc<Notify>>,
        events: broadcast::Sender<AuthChange>,
        calls: AtomicUsize,
        confirm_sign_up: bool,
        fail_with: Mutex<Option<fn() -> Error>>,
    }

    impl FakeAuth {
        fn new() -> Self {
            let (events, _) = broadcast::channel(8);
            Self {
                stored: Mutex::new(None),
                restore_gate: None,
                events,
                calls: AtomicUsize::new(0),
                confirm_sign_up: false,
                fail_with: Mutex::new(None),
            }
        }

        fn with_session(self, user: User) -> Self {
            *self.stored.lock().unwrap() = Some(session_for(user));
            self
        }

        fn failing(self, make: fn() -> Error) -> Self {
            *self.fail_with.lock().unwrap() = Some(make);
            self
        }

        fn take_failure(&self) -> Option<Error> {
            self.fail_with.lock().unwrap().map(|make| make())
        }
    }

    fn session_for(user: User) -> Session {
        Session {
            access_token: "token".to_string(),
            refresh_token: None,
            expires_at: None,
            user,
        }
    }

    fn alice() -> User {
        User::new("user-1", "alice@example.com")
    }

    #[async_trait]
    impl AuthBackend for FakeAuth {
        fn name(&self) -> &str {
            "fake"
        }

        async fn current_session(&self) -> Result<Option<Session>> {
            if let Some(gate) = &self.restore_gate {
                gate.notified().await;
            }
            Ok(self.stored.lock().unwrap().clone())
        }

        async fn sign_in(&self, email: &str, _password: &str) -> Result<Session> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.take_failure() {
                return Err(err);
            }
            let session = session_for(User::new("user-1", email));
            *self.stored.lock().unwrap() = Some(session.clone());
            let _ = self.events.send(AuthChange::signed_in(session.clone()));
            Ok(session)
        }

        async fn sign_up(&self, email: &str, _password: &str) -> Result<SignUpOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.take_failure() {
                return Err(err);
            }
            if self.confirm_sign_up {
                return Ok(SignUpOutcome::ConfirmationRequired {
                    email: email.to_string(),
                });
            }
            Ok(SignUpOutcome::SignedIn {
                user: User::new("user-2", email),
            })
        }

        async fn sign_out(&self) -> Result<()> {
            *self.stored.lock().unwrap() = None;
            let _ = self.events.send(AuthChange::signed_out());
            Ok(())
        }

        fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
            self.events.subscribe()
        }
    }

    #[tokio::test]
    async fn test_starts_loading_until_restore_finishes() {
        let gate = Arc::new(Notify::new());
        let mut fake = FakeAuth::new().with_session(alice());
        fake.restore_gate = Some(Arc::clone(&gate));

        let ctx = AuthContext::start(Arc::new(fake));
        assert_eq!(ctx.state(), AuthState::default());

        gate.notify_one();
        let state = ctx.wait_until_ready().await;
        assert!(!state.is_loading);
        assert_eq!(state.user, Some(alice()));
    }

    #[tokio::test]
    async fn test_restore_without_session_is_signed_out() {
        let ctx = AuthContext::start(Arc::new(FakeAuth::new()));
        let state = ctx.wait_until_ready().await;
        assert!(state.user.is_none() && !state.is_loading);
        assert!(state.restore_error.is_none());
    }

    #[tokio::test]
    async fn test_notifications_update_user() {
        let fake = Arc::new(FakeAuth::new());
        let ctx = AuthContext::start(fake.clone());
        ctx.wait_until_ready().await;
        let mut rx = ctx.subscribe();

        // A session change from outside the context (e.g. token refresh)
        let _ = fake.events.send(AuthChange::token_refreshed(session_for(alice())));
        rx.wait_for(|s| s.user.is_some()).await.unwrap();
        assert_eq!(ctx.user(), Some(alice()));

        let _ = fake.events.send(AuthChange::signed_out());
        rx.wait_for(|s| s.user.is_none()).await.unwrap();
    }

    #[tokio::test]
    async fn test_sign_in_updates_state_immediately() {
        let ctx = AuthContext::start(Arc::new(FakeAuth::new()));
        ctx.wait_until_ready().await;

        let result = ctx.sign_in(" alice@example.com ", "secret1").await;
        assert!(result.success);
        assert_eq!(ctx.user().unwrap().email, "alice@example.com");

        let out = ctx.sign_out().await;
        assert!(out.success);
        assert!(ctx.user().is_none());
    }

    #[tokio::test]
    async fn test_form_validation_skips_backend() {
        let fake = Arc::new(FakeAuth::new());
        let ctx = AuthContext::start(fake.clone());

        let missing = ctx.sign_in("  ", "secret1").await;
        assert_eq!(missing.error.as_deref(), Some("Email is required"));

        let short = ctx.sign_up("a@example.com", "12345").await;
        assert!(!short.success);
        assert!(short.error.unwrap().contains("at least 6"));

        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_errors_are_values() {
        let fake = FakeAuth::new().failing(|| Error::auth("Invalid login credentials"));
        let ctx = AuthContext::start(Arc::new(fake));

        let result = ctx.sign_in("a@example.com", "secret1").await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Invalid login credentials"));
        assert!(ctx.wait_until_ready().await.user.is_none());
    }

    #[tokio::test]
    async fn test_unexpected_errors_are_generic() {
        let fake = FakeAuth::new().failing(|| Error::Other("boom".to_string()));
        let ctx = AuthContext::start(Arc::new(fake));

        let result = ctx.sign_up("a@example.com", "secret1").await;
        assert_eq!(result.error.as_deref(), Some("Unexpected error"));
    }

    #[tokio::test]
    async fn test_sign_up_confirmation_keeps_user_signed_out() {
        let mut fake = FakeAuth::new();
        fake.confirm_sign_up = true;
        let ctx = AuthContext::start(Arc::new(fake));
        ctx.wait_until_ready().await;

        let result = ctx.sign_up("new@example.com", "secret1").await;
        assert!(matches!(
            result.data,
            Some(SignUpOutcome::ConfirmationRequired { ref email }) if email == "new@example.com"
        ));
        assert!(ctx.user().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_stops_listener_and_releases_waiters() {
        let gate = Arc::new(Notify::new());
        let mut fake = FakeAuth::new();
        fake.restore_gate = Some(Arc::clone(&gate));
        let fake = Arc::new(fake);

        let ctx = AuthContext::start(fake.clone());
        ctx.shutdown();

        let state = tokio::time::timeout(Duration::from_secs(1), ctx.wait_until_ready())
            .await
            .unwrap();
        assert!(!state.is_loading);

        // Notifications after shutdown are ignored
        let _ = fake.events.send(AuthChange::signed_in(session_for(alice())));
        tokio::task::yield_now().await;
        assert!(ctx.user().is_none());
    }

    #[tokio::test]
    async fn test_restore_failure_is_reported() {
        struct Offline(broadcast::Sender<AuthChange>);

        #[async_trait]
        impl AuthBackend for Offline {
            fn name(&self) -> &str {
                "offline"
            }
            async fn current_session(&self) -> Result<Option<Session>> {
                Err(Error::Network("connection refused".to_string()))
            }
            async fn sign_in(&self, _: &str, _: &str) -> Result<Session> {
                Err(Error::Network("connection refused".to_string()))
            }
            async fn sign_up(&self, _: &str, _: &str) -> Result<SignUpOutcome> {
                Err(Error::Network("connection refused".to_string()))
            }
            async fn sign_out(&self) -> Result<()> {
                Ok(())
            }
            fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
                self.0.subscribe()
            }
        }

        let (events, _) = broadcast::channel(4);
        let ctx = AuthContext::start(Arc::new(Offline(events)));
        let state = ctx.wait_until_ready().await;
        assert!(state.user.is_none());
        assert!(state.restore_error.unwrap().contains("connection refused"));
    }
}
