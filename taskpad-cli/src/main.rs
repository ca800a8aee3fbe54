//! Taskpad CLI - personal tasks in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{add, auth, clear, demo, list, logs, remove, setup, status, toggle};
use taskpad_core::config::{ANON_KEY_ENV, URL_ENV};
use taskpad_core::services::LogEvent;

/// Taskpad - personal tasks in your terminal
#[derive(Parser)]
#[command(name = "tp", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show backend, session and task summary
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Store the Supabase project URL and anon key
    Setup {
        /// Project URL (https://<project>.supabase.co)
        #[arg(long, env = URL_ENV)]
        url: Option<String>,
        /// Public anon key of the project
        #[arg(long, env = ANON_KEY_ENV)]
        anon_key: Option<String>,
    },

    /// Sign in with e-mail and password
    Login {
        /// Account e-mail
        email: Option<String>,
        /// Password (prompted when omitted)
        #[arg(long, short)]
        password: Option<String>,
    },

    /// Create an account
    Signup {
        /// Account e-mail
        email: Option<String>,
        /// Password, at least 6 characters (prompted when omitted)
        #[arg(long, short)]
        password: Option<String>,
    },

    /// Sign out
    Logout,

    /// List tasks, pending first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a task (reads the title from stdin when piped)
    Add {
        /// Task title
        title: Vec<String>,
    },

    /// Mark a task completed, or pending again
    Toggle {
        /// Task number from 'tp list', id, or id prefix
        task: String,
    },

    /// Delete a task
    Rm {
        /// Task number from 'tp list', id, or id prefix
        task: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Delete all completed tasks
    Clear {
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Manage demo mode
    Demo {
        #[command(subcommand)]
        command: Option<demo::DemoCommands>,
    },

    /// View and manage the local event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let command_name = cli.command.name();

    let result = run(cli).await;

    // Opened after the command so the log database is never open twice
    let logger = commands::get_logger();
    commands::log_event(&logger, LogEvent::new("command_executed").with_command(command_name));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            commands::log_event(
                &logger,
                LogEvent::new("command_failed")
                    .with_command(command_name)
                    .with_error(e.to_string()),
            );
            output::error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Status { json } => status::run(json).await,
        Commands::Setup { url, anon_key } => setup::run(url, anon_key),
        Commands::Login { email, password } => auth::login(email, password).await,
        Commands::Signup { email, password } => auth::signup(email, password).await,
        Commands::Logout => auth::logout().await,
        Commands::List { json } => list::run(json).await,
        Commands::Add { title } => add::run(title).await,
        Commands::Toggle { task } => toggle::run(&task).await,
        Commands::Rm { task, force } => remove::run(&task, force).await,
        Commands::Clear { force } => clear::run(force).await,
        Commands::Demo { command } => demo::run(command),
        Commands::Logs { command } => logs::run(command),
    }
}

impl Commands {
    /// Command name as typed, for the event log
    fn name(&self) -> &'static str {
        match self {
            Commands::Status { .. } => "status",
            Commands::Setup { .. } => "setup",
            Commands::Login { .. } => "login",
            Commands::Signup { .. } => "signup",
            Commands::Logout => "logout",
            Commands::List { .. } => "list",
            Commands::Add { .. } => "add",
            Commands::Toggle { .. } => "toggle",
            Commands::Rm { .. } => "rm",
            Commands::Clear { .. } => "clear",
            Commands::Demo { .. } => "demo",
            Commands::Logs { .. } => "logs",
        }
    }
}
