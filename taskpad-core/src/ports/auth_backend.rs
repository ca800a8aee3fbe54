//! Auth backend port - sessions and e-mail/password accounts

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::result::Result;
use crate::domain::{AuthChange, Session, SignUpOutcome};

/// Authentication surface of the hosted backend
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Short backend name for logs (e.g. "supabase", "demo")
    fn name(&self) -> &str;

    /// Current session, refreshing it first if it has expired
    async fn current_session(&self) -> Result<Option<Session>>;

    /// Sign in with e-mail and password
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    /// Create an account
    ///
    /// The backend may hold the session back until the e-mail address is
    /// confirmed, reported as `SignUpOutcome::ConfirmationRequired`.
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome>;

    /// Drop the current session
    async fn sign_out(&self) -> Result<()>;

    /// Session-change notifications (sign-in, sign-out, token refresh)
    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;
}
