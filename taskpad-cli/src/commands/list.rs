//! List command - show tasks in display order

use anyhow::Result;
use serde_json::json;

use super::{get_context, get_logger, log_controller_error, ready_view, require_user};
use crate::output;
use taskpad_core::services::AppView;

pub async fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    let view = ready_view(&ctx).await;

    match &view {
        AppView::SetupRequired => {
            if json {
                println!("{}", json!({ "view": view, "tasks": [] }));
            } else {
                output::header(&view);
                output::setup_guide();
            }
            return Ok(());
        }
        AppView::SignedOut | AppView::Loading => {
            require_user(&ctx).await?;
        }
        AppView::SignedIn { .. } => {}
    }

    let list = ctx.task_list().await;
    log_controller_error(&logger, &ctx, "load_failed", "list", &list);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "tasks": list.display_tasks(),
                "stats": list.stats(),
                "error": list.error(),
            }))?
        );
        return Ok(());
    }

    output::header(&view);
    if let Some(error) = list.error() {
        output::error(error);
    }
    output::render_task_list(&list.display_tasks(), list.stats());

    Ok(())
}
