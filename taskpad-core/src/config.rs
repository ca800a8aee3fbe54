//! Configuration management
//!
//! Settings live in `settings.json` inside the app directory:
//! ```json
//! {
//!   "app": { "demoMode": false },
//!   "backend": { "url": "https://xyz.supabase.co", "anonKey": "..." }
//! }
//! ```
//! `SUPABASE_URL`, `SUPABASE_ANON_KEY` and `TASKPAD_DEMO_MODE` override the file.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const URL_ENV: &str = "SUPABASE_URL";
pub const ANON_KEY_ENV: &str = "SUPABASE_ANON_KEY";
pub const DEMO_MODE_ENV: &str = "TASKPAD_DEMO_MODE";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    app: AppSettings,
    #[serde(default)]
    backend: BackendSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    #[serde(default)]
    demo_mode: bool,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackendSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    anon_key: Option<String>,
}

/// Which backend the app talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    /// Hosted Supabase project
    Supabase { url: String, anon_key: String },
    /// Local DuckDB database with sample data
    Demo,
    /// Credentials missing; the app shows setup instructions
    Unconfigured,
}

/// Taskpad configuration (simplified view of settings)
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub demo_mode: bool,
    pub backend_url: Option<String>,
    pub anon_key: Option<String>,
}

impl Config {
    /// Load config from the app directory, applying environment overrides
    pub fn load(app_dir: &Path) -> Result<Self> {
        Self::load_with_env(app_dir, |key| std::env::var(key).ok())
    }

    /// Load config with a custom environment lookup
    pub fn load_with_env(app_dir: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw = read_settings(app_dir)?;

        let demo_mode = match env(DEMO_MODE_ENV).as_deref() {
            Some("true" | "1" | "yes" | "TRUE" | "YES") => true,
            Some("false" | "0" | "no" | "FALSE" | "NO") => false,
            _ => raw.app.demo_mode,
        };

        Ok(Self {
            demo_mode,
            backend_url: non_empty(env(URL_ENV)).or_else(|| non_empty(raw.backend.url)),
            anon_key: non_empty(env(ANON_KEY_ENV)).or_else(|| non_empty(raw.backend.anon_key)),
        })
    }

    /// Save config to the app directory
    /// Preserves other settings that the CLI doesn't manage
    pub fn save(&self, app_dir: &Path) -> Result<()> {
        let mut settings = read_settings(app_dir)?;

        settings.app.demo_mode = self.demo_mode;
        settings.backend.url = self.backend_url.clone();
        settings.backend.anon_key = self.anon_key.clone();

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(app_dir.join("settings.json"), content)?;
        Ok(())
    }

    /// Resolve which backend to use; demo mode wins over credentials
    pub fn backend_kind(&self) -> BackendKind {
        if self.demo_mode {
            return BackendKind::Demo;
        }
        match (&self.backend_url, &self.anon_key) {
            (Some(url), Some(anon_key)) => BackendKind::Supabase {
                url: url.clone(),
                anon_key: anon_key.clone(),
            },
            _ => BackendKind::Unconfigured,
        }
    }

    /// Enable demo mode
    pub fn enable_demo_mode(&mut self) {
        self.demo_mode = true;
    }

    /// Disable demo mode
    pub fn disable_demo_mode(&mut self) {
        self.demo_mode = false;
    }
}

fn read_settings(app_dir: &Path) -> Result<SettingsFile> {
    let settings_path = app_dir.join("settings.json");
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)?;
    Ok(serde_json::from_str(&content).unwrap_or_default())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_missing_settings_is_unconfigured() {
        let dir = tempdir().unwrap();
        let config = Config::load_with_env(dir.path(), no_env).unwrap();
        assert_eq!(config.backend_kind(), BackendKind::Unconfigured);
    }

    #[test]
    fn test_env_credentials() {
        let dir = tempdir().unwrap();
        let config = Config::load_with_env(dir.path(), |key| match key {
            URL_ENV => Some("https://abc.supabase.co".to_string()),
            ANON_KEY_ENV => Some("anon".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(
            config.backend_kind(),
            BackendKind::Supabase {
                url: "https://abc.supabase.co".to_string(),
                anon_key: "anon".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_env_counts_as_missing() {
        let dir = tempdir().unwrap();
        let config = Config::load_with_env(dir.path(), |key| match key {
            URL_ENV => Some("https://abc.supabase.co".to_string()),
            ANON_KEY_ENV => Some("   ".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.backend_kind(), BackendKind::Unconfigured);
    }

    #[test]
    fn test_save_and_reload_preserves_unknown_fields() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"app": {"demoMode": false, "theme": "dark"}, "extra": 1}"#,
        )
        .unwrap();

        let mut config = Config::load_with_env(dir.path(), no_env).unwrap();
        config.backend_url = Some("https://abc.supabase.co".to_string());
        config.anon_key = Some("anon".to_string());
        config.save(dir.path()).unwrap();

        let reloaded = Config::load_with_env(dir.path(), no_env).unwrap();
        assert!(matches!(reloaded.backend_kind(), BackendKind::Supabase { .. }));

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("settings.json")).unwrap())
                .unwrap();
        assert_eq!(raw["app"]["theme"], "dark");
        assert_eq!(raw["extra"], 1);
        assert_eq!(raw["backend"]["anonKey"], "anon");
    }

    #[test]
    fn test_demo_mode_env_override() {
        let dir = tempdir().unwrap();
        let config = Config::load_with_env(dir.path(), |key| {
            (key == DEMO_MODE_ENV).then(|| "1".to_string())
        })
        .unwrap();
        assert_eq!(config.backend_kind(), BackendKind::Demo);
    }
}
