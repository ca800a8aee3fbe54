//! Task list controller
//!
//! Owns the local copy of the signed-in user's tasks and keeps it in step with
//! the backend. A controller is created fresh whenever the list is shown and
//! starts by fetching everything; nothing local outlives it.
//!
//! Failures never escape as `Err`: each operation records a short status
//! message (plus the underlying cause for logging) and leaves the collection
//! as it was.

use std::sync::Arc;

use crate::domain::result::Error;
use crate::domain::{display_order, Task, TaskStats, TaskTitle};
use crate::ports::TaskStore;

pub const LOAD_FAILED: &str = "Failed to load tasks";
pub const ADD_FAILED: &str = "Failed to add task";
pub const UPDATE_FAILED: &str = "Failed to update task";
pub const DELETE_FAILED: &str = "Failed to delete task";
pub const CLEAR_FAILED: &str = "Failed to delete completed tasks";

/// Local task collection synchronized with a `TaskStore`
///
/// Operations take `&mut self`, so mutations issued through one controller
/// never overlap.
pub struct TaskListController {
    store: Arc<dyn TaskStore>,
    tasks: Vec<Task>,
    is_loading: bool,
    error: Option<String>,
    error_details: Option<String>,
}

impl TaskListController {
    /// New controller in the loading state; call [`load`](Self::load) next
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            tasks: Vec::new(),
            is_loading: true,
            error: None,
            error_details: None,
        }
    }

    /// Create a controller and run the initial fetch
    pub async fn mount(store: Arc<dyn TaskStore>) -> Self {
        let mut controller = Self::new(store);
        controller.load().await;
        controller
    }

    /// Replace the collection with the backend's current rows
    pub async fn load(&mut self) {
        self.is_loading = true;
        self.clear_error();

        match self.store.list().await {
            Ok(tasks) => self.tasks = tasks,
            Err(e) => self.fail(LOAD_FAILED, e),
        }

        self.is_loading = false;
    }

    /// Create a task and put it at the front of the collection
    pub async fn add(&mut self, title: &TaskTitle) -> Option<Task> {
        self.clear_error();

        match self.store.create(title).await {
            Ok(task) => {
                self.tasks.insert(0, task.clone());
                Some(task)
            }
            Err(e) => {
                self.fail(ADD_FAILED, e);
                None
            }
        }
    }

    /// Flip the completion flag of a task
    ///
    /// Unknown ids are ignored without contacting the backend.
    pub async fn toggle(&mut self, id: &str) -> Option<Task> {
        let completed = self.tasks.iter().find(|t| t.id == id)?.completed;
        self.clear_error();

        match self.store.toggle_complete(id, !completed).await {
            Ok(updated) => {
                if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == id) {
                    *slot = updated.clone();
                }
                Some(updated)
            }
            Err(e) => {
                self.fail(UPDATE_FAILED, e);
                None
            }
        }
    }

    /// Delete a task; returns whether it succeeded
    pub async fn delete(&mut self, id: &str) -> bool {
        self.clear_error();

        match self.store.delete(id).await {
            Ok(()) => {
                self.tasks.retain(|t| t.id != id);
                true
            }
            Err(e) => {
                self.fail(DELETE_FAILED, e);
                false
            }
        }
    }

    /// Delete every completed task; returns whether it succeeded
    pub async fn clear_completed(&mut self) -> bool {
        self.clear_error();

        match self.store.delete_completed().await {
            Ok(()) => {
                self.tasks.retain(|t| !t.completed);
                true
            }
            Err(e) => {
                self.fail(CLEAR_FAILED, e);
                false
            }
        }
    }

    /// Collection in backend order (newest first)
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Collection in display order: pending first, then newest first
    pub fn display_tasks(&self) -> Vec<&Task> {
        display_order(&self.tasks)
    }

    pub fn stats(&self) -> TaskStats {
        TaskStats::from_tasks(&self.tasks)
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Status message of the last failed operation
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Underlying cause of the last failure
    pub fn error_details(&self) -> Option<&str> {
        self.error_details.as_deref()
    }

    /// Nothing to show and nothing went wrong
    pub fn is_empty_state(&self) -> bool {
        !self.is_loading && self.tasks.is_empty() && self.error.is_none()
    }

    fn clear_error(&mut self) {
        self.error = None;
        self.error_details = None;
    }

    fn fail(&mut self, message: &str, cause: Error) {
        self.error = Some(message.to_string());
        self.error_details = Some(cause.to_string());
    }
}
