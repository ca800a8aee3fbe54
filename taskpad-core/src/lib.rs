//! Taskpad Core - Business logic for personal task tracking
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core entities (Task, User, Session)
//! - **ports**: Trait definitions for external dependencies (TaskStore, AuthBackend)
//! - **services**: Auth context, task list controller, view selection, logging
//! - **adapters**: Concrete implementations (Supabase, DuckDB demo, unconfigured)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::BackendHandles;
use config::Config;
use ports::TaskStore;
use services::{AppView, AuthContext, TaskListController};

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult};
pub use domain::{Session, SignUpOutcome, Task, TaskStats, TaskTitle, User};
pub use services::AuthState;

/// Main context for Taskpad operations
///
/// Holds the configuration, the task store and the auth context. Whether a
/// backend is configured is decided once here and never changes afterwards.
pub struct TaskpadContext {
    pub config: Config,
    pub app_dir: PathBuf,
    pub tasks: Arc<dyn TaskStore>,
    pub auth: AuthContext,
    configured: bool,
}

impl TaskpadContext {
    /// Create a context from the settings in `app_dir`
    ///
    /// Starts the session restore in the background, so this must be called
    /// from within a tokio runtime.
    pub fn new(app_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(app_dir)
            .with_context(|| format!("Failed to create {}", app_dir.display()))?;
        let config = Config::load(app_dir)?;
        Self::with_config(app_dir, config)
    }

    /// Create a context from an already loaded configuration
    pub fn with_config(app_dir: &Path, config: Config) -> Result<Self> {
        let handles = adapters::connect(&config.backend_kind(), app_dir)
            .context("Failed to connect to backend")?;
        Ok(Self::from_handles(app_dir, config, handles))
    }

    /// Create a context around existing backend handles
    pub fn from_handles(app_dir: &Path, config: Config, handles: BackendHandles) -> Self {
        let configured = handles.tasks.is_configured();
        let auth = AuthContext::start(handles.auth);

        Self {
            config,
            app_dir: app_dir.to_path_buf(),
            tasks: handles.tasks,
            auth,
            configured,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Backend name for logs ("supabase", "demo", "unconfigured")
    pub fn backend_name(&self) -> &str {
        self.auth.backend_name()
    }

    /// View for the current auth state (may be `Loading`)
    pub fn view(&self) -> AppView {
        AppView::resolve(self.configured, &self.auth.state())
    }

    /// View once the initial session restore has finished
    pub async fn ready_view(&self) -> AppView {
        let state = self.auth.wait_until_ready().await;
        AppView::resolve(self.configured, &state)
    }

    /// Fresh task list controller with its initial fetch done
    pub async fn task_list(&self) -> TaskListController {
        TaskListController::mount(Arc::clone(&self.tasks)).await
    }
}
