//! Login, signup and logout commands

use anyhow::{bail, Result};
use colored::Colorize;
use dialoguer::{Input, Password};

use super::{get_context, get_logger, log_event, ready_view};
use crate::output;
use taskpad_core::services::{AppView, LogEvent};
use taskpad_core::{SignUpOutcome, TaskpadContext};

fn prompt_email(email: Option<String>) -> Result<String> {
    match email {
        Some(e) => Ok(e),
        None => Ok(Input::new().with_prompt("Email").interact_text()?),
    }
}

fn prompt_password(password: Option<String>, confirm: bool) -> Result<String> {
    if let Some(p) = password {
        return Ok(p);
    }
    let prompt = Password::new().with_prompt("Password");
    let prompt = if confirm {
        prompt.with_confirmation("Confirm password", "Passwords do not match")
    } else {
        prompt
    };
    Ok(prompt.interact()?)
}

/// Stop early with the setup guide when there is no backend to talk to
async fn ensure_configured(ctx: &TaskpadContext) -> Result<AppView> {
    let view = ready_view(ctx).await;
    if view == AppView::SetupRequired {
        output::setup_guide();
        bail!("Backend not configured");
    }
    Ok(view)
}

pub async fn login(email: Option<String>, password: Option<String>) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();

    if let AppView::SignedIn { user } = ensure_configured(&ctx).await? {
        output::info(&format!("Already signed in as {}", user.email));
        return Ok(());
    }

    let email = prompt_email(email)?;
    let password = prompt_password(password, false)?;

    let result = ctx.auth.sign_in(&email, &password).await;
    if !result.success {
        let message = result.error.unwrap_or_else(|| "Unexpected error".to_string());
        log_event(
            &logger,
            LogEvent::new("sign_in_failed")
                .with_backend(ctx.backend_name())
                .with_command("login")
                .with_error(&message),
        );
        bail!(message);
    }

    log_event(
        &logger,
        LogEvent::new("signed_in")
            .with_backend(ctx.backend_name())
            .with_command("login"),
    );
    if let Some(user) = result.data {
        println!("{} Signed in as {}", "✓".green(), user.email.bold());
    }
    Ok(())
}

pub async fn signup(email: Option<String>, password: Option<String>) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    ensure_configured(&ctx).await?;

    let email = prompt_email(email)?;
    let password = prompt_password(password, true)?;

    let result = ctx.auth.sign_up(&email, &password).await;
    let outcome = match (result.success, result.data) {
        (true, Some(outcome)) => outcome,
        _ => {
            let message = result.error.unwrap_or_else(|| "Unexpected error".to_string());
            log_event(
                &logger,
                LogEvent::new("sign_up_failed")
                    .with_backend(ctx.backend_name())
                    .with_command("signup")
                    .with_error(&message),
            );
            bail!(message);
        }
    };

    log_event(
        &logger,
        LogEvent::new("signed_up")
            .with_backend(ctx.backend_name())
            .with_command("signup"),
    );
    match outcome {
        SignUpOutcome::SignedIn { user } => {
            println!("{} Account created, signed in as {}", "✓".green(), user.email.bold());
        }
        SignUpOutcome::ConfirmationRequired { email } => {
            output::success("Account created");
            println!("Check {} for a confirmation link, then run 'tp login'.", email.bold());
        }
    }
    Ok(())
}

pub async fn logout() -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();

    if ready_view(&ctx).await.user().is_none() {
        output::info("Not signed in");
        return Ok(());
    }

    let result = ctx.auth.sign_out().await;
    log_event(
        &logger,
        LogEvent::new("signed_out")
            .with_backend(ctx.backend_name())
            .with_command("logout"),
    );
    if let Some(error) = result.error {
        // The local session is gone either way
        output::warning(&format!("Signed out locally; the server reported: {}", error));
    } else {
        output::success("Signed out");
    }
    Ok(())
}
