//! Demo command - manage demo mode

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::{get_app_dir, get_logger, log_event};
use taskpad_core::adapters::demo::{DEMO_EMAIL, DEMO_PASSWORD};
use taskpad_core::services::{DemoService, LogEvent};

#[derive(Subcommand)]
pub enum DemoCommands {
    /// Enable demo mode
    #[command(name = "on")]
    On,
    /// Disable demo mode
    #[command(name = "off")]
    Off {
        /// Also delete the demo database
        #[arg(long)]
        clean: bool,
    },
    /// Show demo mode status
    Status,
}

pub fn run(command: Option<DemoCommands>) -> Result<()> {
    let app_dir = get_app_dir()?;
    std::fs::create_dir_all(&app_dir)?;
    let demo_service = DemoService::new(&app_dir);
    let logger = get_logger();

    match command {
        Some(DemoCommands::On) => {
            demo_service.enable()?;
            log_event(&logger, LogEvent::new("demo_enabled").with_command("demo"));
            println!("{}", "Demo mode enabled".green());
            println!("Sample tasks have been created for a demo account:");
            println!("  tp login {} --password {}", DEMO_EMAIL, DEMO_PASSWORD);
            Ok(())
        }
        Some(DemoCommands::Off { clean }) => {
            demo_service.disable(clean)?;
            log_event(&logger, LogEvent::new("demo_disabled").with_command("demo"));
            println!("{}", "Demo mode disabled".yellow());
            Ok(())
        }
        Some(DemoCommands::Status) | None => {
            if demo_service.is_enabled()? {
                println!("Demo mode is {}", "ON".green());
            } else {
                println!("Demo mode is {}", "OFF".yellow());
            }
            Ok(())
        }
    }
}
