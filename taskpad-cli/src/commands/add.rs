//! Add command - create a task

use std::io::Read;

use anyhow::{bail, Result};
use colored::Colorize;
use taskpad_core::services::LogEvent;
use taskpad_core::TaskTitle;

use super::{get_context, get_logger, log_controller_error, log_event, require_user};
use crate::output;

pub async fn run(words: Vec<String>) -> Result<()> {
    // Title from arguments, or from stdin when piped
    let raw = if words.is_empty() && atty::isnt(atty::Stream::Stdin) {
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input)?;
        input
    } else {
        words.join(" ")
    };

    // Whitespace-only input never reaches the backend
    let Ok(title) = TaskTitle::parse(&raw) else {
        bail!("Task title cannot be empty");
    };

    let ctx = get_context()?;
    let logger = get_logger();
    require_user(&ctx).await?;

    let mut list = ctx.task_list().await;
    let added = list.add(&title).await;
    log_controller_error(&logger, &ctx, "add_failed", "add", &list);

    match added {
        Some(task) => {
            log_event(
                &logger,
                LogEvent::new("task_added")
                    .with_backend(ctx.backend_name())
                    .with_command("add"),
            );
            println!(
                "{} Added \"{}\" {}",
                "✓".green(),
                task.title,
                output::short_id(&task.id).dimmed()
            );
            Ok(())
        }
        None => bail!(list.error().unwrap_or("Failed to add task").to_string()),
    }
}
