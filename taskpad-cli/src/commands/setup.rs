//! Setup command - store backend credentials

use anyhow::{bail, Result};
use colored::Colorize;
use dialoguer::Input;

use super::{get_app_dir, get_logger, log_event};
use taskpad_core::adapters::session_store::SessionStore;
use taskpad_core::adapters::supabase::SupabaseClient;
use taskpad_core::config::Config;
use taskpad_core::services::LogEvent;

pub fn run(url: Option<String>, anon_key: Option<String>) -> Result<()> {
    let app_dir = get_app_dir()?;
    std::fs::create_dir_all(&app_dir)?;
    let logger = get_logger();

    let url = match url {
        Some(u) => u,
        None => Input::new()
            .with_prompt("Supabase project URL")
            .interact_text()?,
    };
    let anon_key = match anon_key {
        Some(k) => k,
        None => Input::new()
            .with_prompt("Supabase anon key")
            .interact_text()?,
    };

    let url = url.trim().to_string();
    let anon_key = anon_key.trim().to_string();
    if url.is_empty() || anon_key.is_empty() {
        bail!("Both the project URL and the anon key are required");
    }

    // Validate before saving so a typo never lands in settings.json
    SupabaseClient::new(&url, &anon_key, SessionStore::in_memory())?;

    let mut config = Config::load(&app_dir).unwrap_or_default();
    config.backend_url = Some(url);
    config.anon_key = Some(anon_key);
    let was_demo = config.demo_mode;
    config.save(&app_dir)?;

    log_event(
        &logger,
        LogEvent::new("backend_configured")
            .with_backend("supabase")
            .with_command("setup"),
    );

    println!("{} Backend credentials saved", "Success!".green());
    if was_demo {
        println!(
            "{}",
            "Demo mode is still on. Run 'tp demo off' to use your project.".yellow()
        );
    } else {
        println!("Run 'tp signup' or 'tp login' to continue.");
    }

    Ok(())
}
