//! Top-level view selection
//!
//! Loading wins over everything so a stored session never flashes the
//! signed-out screen; missing credentials come next, then the auth state.

use serde::Serialize;

use crate::domain::User;
use crate::services::auth::AuthState;

/// Which screen the front end shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum AppView {
    /// Session restore still running
    Loading,
    /// Backend credentials missing
    SetupRequired,
    /// Sign-in / sign-up form
    SignedOut,
    /// Task list for this user
    SignedIn { user: User },
}

impl AppView {
    pub fn resolve(configured: bool, auth: &AuthState) -> Self {
        if auth.is_loading {
            return AppView::Loading;
        }
        if !configured {
            return AppView::SetupRequired;
        }
        match &auth.user {
            Some(user) => AppView::SignedIn { user: user.clone() },
            None => AppView::SignedOut,
        }
    }

    /// Header line shown under the app name
    pub fn subtitle(&self) -> &'static str {
        match self {
            AppView::Loading => "Loading...",
            AppView::SetupRequired => "Connect a backend to get started",
            AppView::SignedOut => "Sign in to manage your tasks",
            AppView::SignedIn { .. } => "Stay organized and productive",
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            AppView::SignedIn { user } => Some(user),
            _ => None,
        }
    }
}
