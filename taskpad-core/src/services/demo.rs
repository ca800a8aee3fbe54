//! Demo service - manage demo mode
//!
//! Demo mode swaps the hosted backend for a local DuckDB database seeded with
//! a demo account, so the app can be tried without a Supabase project.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;

use crate::adapters::demo::seed_demo_data;
use crate::adapters::duckdb::DuckDbBackend;
use crate::adapters::session_store::SessionStore;
use crate::adapters::{DEMO_DB_FILE, DEMO_SESSION_FILE};
use crate::config::Config;

/// Demo service for managing demo mode
pub struct DemoService {
    app_dir: PathBuf,
}

impl DemoService {
    pub fn new(app_dir: &Path) -> Self {
        Self {
            app_dir: app_dir.to_path_buf(),
        }
    }

    /// Check if demo mode is currently enabled
    pub fn is_enabled(&self) -> Result<bool> {
        let config = Config::load(&self.app_dir)?;
        Ok(config.demo_mode)
    }

    /// Enable demo mode
    ///
    /// This will:
    /// 1. Delete any existing demo database and demo session (fresh start)
    /// 2. Enable demo mode in config
    /// 3. Create the demo database with the demo account and sample tasks
    pub fn enable(&self) -> Result<()> {
        self.remove_demo_files()?;

        let mut config = Config::load(&self.app_dir).unwrap_or_default();
        config.enable_demo_mode();
        config.save(&self.app_dir)?;

        let backend = DuckDbBackend::new(&self.app_dir.join(DEMO_DB_FILE), SessionStore::in_memory())
            .context("Failed to create demo database")?;
        backend.ensure_schema()?;
        seed_demo_data(&backend, Utc::now()).context("Failed to seed demo data")?;

        Ok(())
    }

    /// Disable demo mode
    ///
    /// This will:
    /// 1. Disable demo mode in config
    /// 2. Optionally delete the demo database (if clean = true)
    pub fn disable(&self, clean: bool) -> Result<()> {
        let mut config = Config::load(&self.app_dir).unwrap_or_default();
        config.disable_demo_mode();
        config.save(&self.app_dir)?;

        if clean {
            self.remove_demo_files()?;
        }

        Ok(())
    }

    fn remove_demo_files(&self) -> Result<()> {
        let demo_db = self.app_dir.join(DEMO_DB_FILE);
        let demo_wal = self.app_dir.join(format!("{}.wal", DEMO_DB_FILE));
        let demo_session = self.app_dir.join(DEMO_SESSION_FILE);
        for path in [demo_db, demo_wal, demo_session] {
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_enable_and_disable() {
        let temp_dir = TempDir::new().unwrap();
        let service = DemoService::new(temp_dir.path());
        assert!(!service.is_enabled().unwrap());

        service.enable().unwrap();
        assert!(service.is_enabled().unwrap());
        assert!(temp_dir.path().join(DEMO_DB_FILE).exists());

        service.disable(true).unwrap();
        assert!(!service.is_enabled().unwrap());
        assert!(!temp_dir.path().join(DEMO_DB_FILE).exists());
    }

    #[test]
    fn test_enable_twice_starts_fresh() {
        let temp_dir = TempDir::new().unwrap();
        let service = DemoService::new(temp_dir.path());

        service.enable().unwrap();
        std::fs::write(temp_dir.path().join(DEMO_SESSION_FILE), "{}").unwrap();

        // Seeding the demo account again would fail on the unique e-mail
        // if the old database survived
        service.enable().unwrap();
        assert!(!temp_dir.path().join(DEMO_SESSION_FILE).exists());
    }
}
