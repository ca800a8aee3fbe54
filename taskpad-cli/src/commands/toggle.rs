//! Toggle command - flip a task between pending and completed

use anyhow::{bail, Result};
use colored::Colorize;
use taskpad_core::services::LogEvent;

use super::{get_context, get_logger, log_controller_error, log_event, require_user, resolve_task_ref};

pub async fn run(reference: &str) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    require_user(&ctx).await?;

    let mut list = ctx.task_list().await;
    if let Some(error) = list.error() {
        log_controller_error(&logger, &ctx, "load_failed", "toggle", &list);
        bail!(error.to_string());
    }

    let id = resolve_task_ref(&list.display_tasks(), reference)?.id.clone();
    let toggled = list.toggle(&id).await;
    log_controller_error(&logger, &ctx, "toggle_failed", "toggle", &list);

    match toggled {
        Some(task) => {
            log_event(
                &logger,
                LogEvent::new("task_toggled")
                    .with_backend(ctx.backend_name())
                    .with_command("toggle"),
            );
            if task.completed {
                println!("{} Completed \"{}\"", "✓".green(), task.title);
            } else {
                println!("{} Reopened \"{}\"", "○".yellow(), task.title);
            }
            Ok(())
        }
        None => bail!(list.error().unwrap_or("Failed to update task").to_string()),
    }
}
