//! CLI command implementations

pub mod add;
pub mod auth;
pub mod clear;
pub mod demo;
pub mod list;
pub mod logs;
pub mod remove;
pub mod setup;
pub mod status;
pub mod toggle;

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use taskpad_core::services::{AppView, LogEvent, LoggingService, TaskListController};
use taskpad_core::{Task, TaskpadContext, User};

use crate::output;

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let app_dir = get_app_dir().ok()?;
    std::fs::create_dir_all(&app_dir).ok()?;
    LoggingService::new(&app_dir, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Log the controller's last failure, if there was one
pub fn log_controller_error(
    logger: &Option<LoggingService>,
    ctx: &TaskpadContext,
    event: &str,
    command: &str,
    list: &TaskListController,
) {
    if let Some(message) = list.error() {
        let mut log = LogEvent::new(event)
            .with_backend(ctx.backend_name())
            .with_command(command)
            .with_error(message);
        if let Some(details) = list.error_details() {
            log = log.with_error_details(details);
        }
        log_event(logger, log);
    }
}

/// Get the taskpad directory from environment or default
pub fn get_app_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TASKPAD_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".taskpad"))
        .ok_or_else(|| anyhow!("Could not find home directory; set TASKPAD_DIR"))
}

/// Create the taskpad context
pub fn get_context() -> Result<TaskpadContext> {
    let app_dir = get_app_dir()?;
    TaskpadContext::new(&app_dir).context("Failed to initialize taskpad context")
}

/// Wait for the session restore, showing a spinner while it runs
pub async fn ready_view(ctx: &TaskpadContext) -> AppView {
    let view = ctx.view();
    if view != AppView::Loading {
        return view;
    }

    let spinner = atty::is(atty::Stream::Stderr).then(|| output::spinner("Loading..."));
    let view = ctx.ready_view().await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    view
}

/// The signed-in user, or an error telling the user what to do first
pub async fn require_user(ctx: &TaskpadContext) -> Result<User> {
    match ready_view(ctx).await {
        AppView::SignedIn { user } => Ok(user),
        AppView::SetupRequired => {
            output::setup_guide();
            bail!("Backend not configured")
        }
        AppView::SignedOut => match ctx.auth.state().restore_error {
            Some(reason) => bail!("Could not check your session: {}", reason),
            None => bail!("Not signed in. Run 'tp login' or 'tp signup' first."),
        },
        AppView::Loading => bail!("Session is still loading"),
    }
}

/// Find a task by 1-based position in display order, full id, or unique id prefix
pub fn resolve_task_ref<'a>(tasks: &[&'a Task], reference: &str) -> Result<&'a Task> {
    let reference = reference.trim();
    if reference.is_empty() {
        bail!("Task reference is empty");
    }

    if let Some(task) = tasks.iter().copied().find(|t| t.id == reference) {
        return Ok(task);
    }

    if let Ok(position) = reference.parse::<usize>() {
        if position >= 1 && position <= tasks.len() {
            return Ok(tasks[position - 1]);
        }
    }

    let matches: Vec<&'a Task> = tasks
        .iter()
        .copied()
        .filter(|t| t.id.starts_with(reference))
        .collect();
    match matches.as_slice() {
        [task] => Ok(*task),
        [] => bail!("No task matches '{}'. Run 'tp list' to see your tasks.", reference),
        _ => bail!(
            "'{}' matches {} tasks; use more of the id",
            reference,
            matches.len()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn task(id: &str) -> Task {
        Task::new(id, id, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(), "user-1")
    }

    #[test]
    fn test_resolve_by_position_and_id() {
        let tasks = [task("abc123"), task("abd456"), task("7")];
        let refs: Vec<&Task> = tasks.iter().collect();

        assert_eq!(resolve_task_ref(&refs, "2").unwrap().id, "abd456");
        assert_eq!(resolve_task_ref(&refs, "abc123").unwrap().id, "abc123");
        assert_eq!(resolve_task_ref(&refs, "abd").unwrap().id, "abd456");
        // A full id wins over a position
        assert_eq!(resolve_task_ref(&refs, "7").unwrap().id, "7");
    }

    #[test]
    fn test_resolve_errors() {
        let tasks = [task("abc123"), task("abd456")];
        let refs: Vec<&Task> = tasks.iter().collect();

        assert!(resolve_task_ref(&refs, "ab").unwrap_err().to_string().contains("matches 2"));
        assert!(resolve_task_ref(&refs, "zzz").is_err());
        assert!(resolve_task_ref(&refs, "0").is_err());
        assert!(resolve_task_ref(&refs, " ").is_err());
    }
}
