//! Session persistence
//!
//! Keeps the current session in memory and mirrors it to `session.json` so a
//! later process can restore it. Writes take an exclusive advisory lock on the
//! file; two CLI invocations refreshing a token at once must not interleave.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use fs2::FileExt;

use crate::domain::result::{Error, Result};
use crate::domain::Session;

/// In-memory session with optional file backing
#[derive(Debug)]
pub struct SessionStore {
    path: Option<PathBuf>,
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    /// Session that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            path: None,
            current: RwLock::new(None),
        }
    }

    /// Session backed by a file, restoring whatever the file holds
    ///
    /// An unreadable or corrupt file is treated as "no session".
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let restored = read_session(&path).ok().flatten();
        Self {
            path: Some(path),
            current: RwLock::new(restored),
        }
    }

    pub fn get(&self) -> Option<Session> {
        self.current.read().map(|s| s.clone()).unwrap_or(None)
    }

    /// Replace the session and persist it
    pub fn set(&self, session: Session) -> Result<()> {
        if let Some(path) = &self.path {
            write_session(path, &session)?;
        }
        if let Ok(mut current) = self.current.write() {
            *current = Some(session);
        }
        Ok(())
    }

    /// Forget the session, removing the file
    pub fn clear(&self) -> Result<()> {
        if let Ok(mut current) = self.current.write() {
            *current = None;
        }
        if let Some(path) = &self.path {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

fn read_session(path: &Path) -> Result<Option<Session>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut file = File::open(path)?;
    file.lock_shared()?;
    let mut content = String::new();
    let read = file.read_to_string(&mut content);
    let _ = file.unlock();
    read?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&content)?))
}

fn write_session(path: &Path, session: &Session) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(session)?;

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)?;
    // Tokens are readable by the owner only
    #[cfg(unix)]
    {
        let mut perms = file.metadata()?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms)?;
    }
    file.lock_exclusive()
        .map_err(|e| Error::Other(format!("Failed to lock session file: {}", e)))?;
    let written = file
        .set_len(0)
        .and_then(|_| file.write_all(content.as_bytes()))
        .and_then(|_| file.flush());
    let _ = file.unlock();
    written?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::User;
    use tempfile::tempdir;

    fn session(token: &str) -> Session {
        Session {
            access_token: token.to_string(),
            refresh_token: None,
            expires_at: None,
            user: User::new("user-1", "a@example.com"),
        }
    }

    #[test]
    fn test_in_memory_roundtrip() {
        let store = SessionStore::in_memory();
        assert!(store.get().is_none());
        store.set(session("t1")).unwrap();
        assert_eq!(store.get().unwrap().access_token, "t1");
        store.clear().unwrap();
        assert!(store.get().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_private() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");

        SessionStore::persistent(&path).set(session("secret")).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn test_persistent_restores_in_new_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");

        SessionStore::persistent(&path).set(session("t2")).unwrap();

        let restored = SessionStore::persistent(&path);
        assert_eq!(restored.get().unwrap().access_token, "t2");

        restored.clear().unwrap();
        assert!(!path.exists());
        assert!(SessionStore::persistent(&path).get().is_none());
    }

    #[test]
    fn test_corrupt_file_means_no_session() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        assert!(SessionStore::persistent(&path).get().is_none());
    }

    #[test]
    fn test_shorter_session_overwrites_cleanly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = SessionStore::persistent(&path);

        store.set(session("a-very-long-access-token-value")).unwrap();
        store.set(session("short")).unwrap();

        assert_eq!(
            SessionStore::persistent(&path).get().unwrap().access_token,
            "short"
        );
    }
}
