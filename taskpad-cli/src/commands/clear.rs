//! Clear command - delete every completed task

use anyhow::{bail, Result};
use colored::Colorize;
use dialoguer::Confirm;
use taskpad_core::services::LogEvent;

use super::{get_context, get_logger, log_controller_error, log_event, require_user};
use crate::output;

pub async fn run(force: bool) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    require_user(&ctx).await?;

    let mut list = ctx.task_list().await;
    if let Some(error) = list.error() {
        log_controller_error(&logger, &ctx, "load_failed", "clear", &list);
        bail!(error.to_string());
    }

    let completed = list.stats().completed;
    if completed == 0 {
        output::info("No completed tasks to clear");
        return Ok(());
    }

    if !force
        && !Confirm::new()
            .with_prompt(format!("Delete {} completed task(s)?", completed))
            .default(false)
            .interact()?
    {
        println!("{}", "Cancelled".dimmed());
        return Ok(());
    }

    if !list.clear_completed().await {
        log_controller_error(&logger, &ctx, "clear_failed", "clear", &list);
        bail!(list.error().unwrap_or("Failed to delete completed tasks").to_string());
    }

    log_event(
        &logger,
        LogEvent::new("completed_cleared")
            .with_backend(ctx.backend_name())
            .with_command("clear"),
    );
    println!("{} Cleared {} completed task(s)", "✓".green(), completed);
    Ok(())
}
