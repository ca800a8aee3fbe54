//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - Supabase REST/Auth over HTTP for the hosted backend
//! - DuckDB for the local demo backend
//! - An unconfigured stand-in when credentials are missing

pub mod demo;
pub mod duckdb;
pub mod session_store;
pub mod supabase;
pub mod unconfigured;

use std::path::Path;
use std::sync::Arc;

use crate::config::BackendKind;
use crate::domain::result::Result;
use crate::ports::{AuthBackend, TaskStore};

use self::duckdb::DuckDbBackend;
use self::session_store::SessionStore;
use self::supabase::SupabaseClient;
use self::unconfigured::UnconfiguredBackend;

/// Session file for the hosted backend
pub const SESSION_FILE: &str = "session.json";

/// Demo database file
pub const DEMO_DB_FILE: &str = "demo.duckdb";

/// Session file for the demo backend, kept apart so switching modes never mixes tokens
pub const DEMO_SESSION_FILE: &str = "demo-session.json";

/// Both ports served by one backend instance
#[derive(Clone)]
pub struct BackendHandles {
    pub tasks: Arc<dyn TaskStore>,
    pub auth: Arc<dyn AuthBackend>,
}

impl BackendHandles {
    fn from_backend<B>(backend: B) -> Self
    where
        B: TaskStore + AuthBackend + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            tasks: backend.clone(),
            auth: backend,
        }
    }

    pub fn unconfigured() -> Self {
        Self::from_backend(UnconfiguredBackend::new())
    }
}

/// Build the backend selected by the configuration
pub fn connect(kind: &BackendKind, app_dir: &Path) -> Result<BackendHandles> {
    match kind {
        BackendKind::Supabase { url, anon_key } => {
            let session = SessionStore::persistent(app_dir.join(SESSION_FILE));
            Ok(BackendHandles::from_backend(SupabaseClient::new(
                url, anon_key, session,
            )?))
        }
        BackendKind::Demo => {
            let session = SessionStore::persistent(app_dir.join(DEMO_SESSION_FILE));
            let backend = DuckDbBackend::new(&app_dir.join(DEMO_DB_FILE), session)?;
            backend.ensure_schema()?;
            Ok(BackendHandles::from_backend(backend))
        }
        BackendKind::Unconfigured => Ok(BackendHandles::unconfigured()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_connect_unconfigured() {
        let temp_dir = TempDir::new().unwrap();
        let handles = connect(&BackendKind::Unconfigured, temp_dir.path()).unwrap();

        assert!(!handles.tasks.is_configured());
        assert_eq!(handles.auth.name(), "unconfigured");
    }

    #[tokio::test]
    async fn test_connect_demo_creates_database() {
        let temp_dir = TempDir::new().unwrap();
        let handles = connect(&BackendKind::Demo, temp_dir.path()).unwrap();

        assert!(handles.tasks.is_configured());
        assert_eq!(handles.auth.name(), "demo");
        assert!(temp_dir.path().join(DEMO_DB_FILE).exists());
    }

    #[test]
    fn test_connect_rejects_invalid_url() {
        let temp_dir = TempDir::new().unwrap();
        let kind = BackendKind::Supabase {
            url: "not a url".to_string(),
            anon_key: "key".to_string(),
        };
        assert!(connect(&kind, temp_dir.path()).is_err());
    }
}
