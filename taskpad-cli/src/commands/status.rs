//! Status command - show backend, session and task summary

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use super::{get_context, ready_view};
use crate::output;
use taskpad_core::services::AppView;

pub async fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let view = ready_view(&ctx).await;

    let stats = match &view {
        AppView::SignedIn { .. } => {
            let list = ctx.task_list().await;
            list.error().is_none().then(|| list.stats())
        }
        _ => None,
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "backend": ctx.backend_name(),
                "configured": ctx.is_configured(),
                "demo_mode": ctx.config.demo_mode,
                "view": view,
                "stats": stats,
                "app_dir": ctx.app_dir.to_string_lossy(),
            }))?
        );
        return Ok(());
    }

    output::header(&view);

    let mut table = output::create_table();
    table.add_row(vec!["Backend", ctx.backend_name()]);
    table.add_row(vec![
        "Configured",
        if ctx.is_configured() { "yes" } else { "no" },
    ]);
    table.add_row(vec![
        "Demo mode",
        if ctx.config.demo_mode { "on" } else { "off" },
    ]);
    let signed_in_as = view
        .user()
        .map(|u| u.email.clone())
        .unwrap_or_else(|| "-".to_string());
    table.add_row(vec!["Signed in as", signed_in_as.as_str()]);
    if let Some(stats) = stats {
        let pending = stats.pending.to_string();
        let completed = stats.completed.to_string();
        table.add_row(vec!["Pending tasks", pending.as_str()]);
        table.add_row(vec!["Completed tasks", completed.as_str()]);
    }
    println!("{}", table);

    match view {
        AppView::SetupRequired => {
            println!();
            output::setup_guide();
        }
        AppView::SignedOut => {
            println!();
            match ctx.auth.state().restore_error {
                Some(reason) => output::warning(&format!("Could not check your session: {}", reason)),
                None => println!("{}", "Run 'tp login' or 'tp signup' to get started.".dimmed()),
            }
        }
        _ => {}
    }

    Ok(())
}
