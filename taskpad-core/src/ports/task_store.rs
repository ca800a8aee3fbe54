//! Task store port - data access for the tasks collection

use async_trait::async_trait;

use crate::domain::result::Result;
use crate::domain::{Task, TaskTitle};

/// Data operations on the signed-in user's tasks
///
/// Implementations scope every call to the current session's user. When no
/// connection credentials exist, `list` yields an empty collection and every
/// mutating call fails with `Error::NotConfigured` without touching the network.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Whether connection credentials were present at startup
    fn is_configured(&self) -> bool;

    /// All visible tasks, newest first
    async fn list(&self) -> Result<Vec<Task>>;

    /// Insert a new, not yet completed task owned by the current user
    ///
    /// Fails with `Error::NotAuthenticated` when there is no session.
    async fn create(&self, title: &TaskTitle) -> Result<Task>;

    /// Set the `completed` flag of one task and return the updated row
    async fn toggle_complete(&self, id: &str, completed: bool) -> Result<Task>;

    /// Remove one task
    async fn delete(&self, id: &str) -> Result<()>;

    /// Remove every completed task
    async fn delete_completed(&self) -> Result<()>;
}
