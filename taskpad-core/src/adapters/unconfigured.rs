//! Stand-in backend used when connection credentials are missing
//!
//! Lets every view render: reads come back empty, writes fail with
//! `Error::NotConfigured`, and no network call is ever made.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::result::{Error, Result};
use crate::domain::{AuthChange, Session, SignUpOutcome, Task, TaskTitle};
use crate::ports::{AuthBackend, TaskStore};

pub struct UnconfiguredBackend {
    // Never sends; kept so subscribers get a live channel instead of a closed one
    events: broadcast::Sender<AuthChange>,
}

impl UnconfiguredBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(1);
        Self { events }
    }
}

impl Default for UnconfiguredBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for UnconfiguredBackend {
    fn is_configured(&self) -> bool {
        false
    }

    async fn list(&self) -> Result<Vec<Task>> {
        Ok(Vec::new())
    }

    async fn create(&self, _title: &TaskTitle) -> Result<Task> {
        Err(Error::NotConfigured)
    }

    async fn toggle_complete(&self, _id: &str, _completed: bool) -> Result<Task> {
        Err(Error::NotConfigured)
    }

    async fn delete(&self, _id: &str) -> Result<()> {
        Err(Error::NotConfigured)
    }

    async fn delete_completed(&self) -> Result<()> {
        Err(Error::NotConfigured)
    }
}

#[async_trait]
impl AuthBackend for UnconfiguredBackend {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn current_session(&self) -> Result<Option<Session>> {
        Ok(None)
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> Result<Session> {
        Err(Error::NotConfigured)
    }

    async fn sign_up(&self, _email: &str, _password: &str) -> Result<SignUpOutcome> {
        Err(Error::NotConfigured)
    }

    async fn sign_out(&self) -> Result<()> {
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }
}
