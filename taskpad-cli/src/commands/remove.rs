//! Remove command - delete a task

use anyhow::{bail, Result};
use colored::Colorize;
use dialoguer::Confirm;
use taskpad_core::services::LogEvent;

use super::{get_context, get_logger, log_controller_error, log_event, require_user, resolve_task_ref};

pub async fn run(reference: &str, force: bool) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    require_user(&ctx).await?;

    let mut list = ctx.task_list().await;
    if let Some(error) = list.error() {
        log_controller_error(&logger, &ctx, "load_failed", "rm", &list);
        bail!(error.to_string());
    }

    let task = resolve_task_ref(&list.display_tasks(), reference)?.clone();

    // Confirm removal unless --force
    if !force
        && !Confirm::new()
            .with_prompt(format!("Delete \"{}\"?", task.title))
            .default(false)
            .interact()?
    {
        println!("{}", "Cancelled".dimmed());
        return Ok(());
    }

    if !list.delete(&task.id).await {
        log_controller_error(&logger, &ctx, "delete_failed", "rm", &list);
        bail!(list.error().unwrap_or("Failed to delete task").to_string());
    }

    log_event(
        &logger,
        LogEvent::new("task_deleted")
            .with_backend(ctx.backend_name())
            .with_command("rm"),
    );
    println!("{} Deleted \"{}\"", "✓".green(), task.title);
    Ok(())
}
