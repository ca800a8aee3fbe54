//! Output formatting utilities

use std::time::Duration;

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};

use taskpad_core::config::{ANON_KEY_ENV, URL_ENV};
use taskpad_core::services::AppView;
use taskpad_core::{Task, TaskStats};

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Neutral loading indicator on stderr
pub fn spinner(msg: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(msg.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// App name and the subtitle of the current view
pub fn header(view: &AppView) {
    println!("{}", "Taskpad".bold());
    println!("{}", view.subtitle().dimmed());
    println!();
}

/// Instructions shown when no backend is configured
pub fn setup_guide() {
    println!("{}", "Backend not configured".yellow().bold());
    println!();
    println!("Taskpad stores tasks in a Supabase project. To connect one:");
    println!("  1. Create a project at https://supabase.com");
    println!("  2. Create the tasks table:");
    println!();
    println!("{}", SCHEMA_SQL.dimmed());
    println!();
    println!("  3. Run 'tp setup' with the project URL and anon key, or set");
    println!("     {} and {} in your environment", URL_ENV, ANON_KEY_ENV);
    println!();
    println!("Or try it locally without an account: 'tp demo on'");
}

const SCHEMA_SQL: &str = "\
     create table tasks (
       id uuid primary key default gen_random_uuid(),
       title text not null,
       completed boolean not null default false,
       created_at timestamptz not null default now(),
       user_id uuid not null references auth.users (id)
     );
     alter table tasks enable row level security;
     create policy \"own tasks\" on tasks for all
       using (auth.uid() = user_id) with check (auth.uid() = user_id);";

/// Render the task list in display order with 1-based positions
pub fn render_task_list(tasks: &[&Task], stats: TaskStats) {
    if tasks.is_empty() {
        println!("{}", "No tasks yet. Add one with 'tp add <title>'.".dimmed());
        return;
    }

    println!(
        "{} pending, {} completed",
        stats.pending.to_string().bold(),
        stats.completed.to_string().bold()
    );

    let mut table = create_table();
    table.set_header(vec!["#", "", "Task", "Created", "ID"]);

    for (index, task) in tasks.iter().enumerate() {
        let (mark, title) = if task.completed {
            (Cell::new("✓").fg(Color::Green), Cell::new(&task.title).fg(Color::DarkGrey))
        } else {
            (Cell::new("○"), Cell::new(&task.title))
        };
        table.add_row(vec![
            Cell::new(index + 1),
            mark,
            title,
            Cell::new(task.created_at.format("%Y-%m-%d %H:%M").to_string()),
            Cell::new(short_id(&task.id)),
        ]);
    }

    println!("{}", table);
}

/// First characters of an id, enough to reference it on the command line
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("1234567890abcdef"), "12345678");
        assert_eq!(short_id("42"), "42");
    }
}
