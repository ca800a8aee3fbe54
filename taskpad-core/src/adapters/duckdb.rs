//! DuckDB backend for demo mode
//!
//! A self-contained stand-in for the hosted backend: local accounts with
//! Argon2id password hashes and a `tasks` table. Unlike the hosted backend,
//! row scoping is enforced here in every query rather than by a remote policy.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use duckdb::{params, Connection, OptionalExt};
use rand::Rng;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::adapters::session_store::SessionStore;
use crate::domain::result::{Error, Result};
use crate::domain::{AuthChange, Session, SignUpOutcome, Task, TaskTitle, User};
use crate::migrations::MIGRATIONS;
use crate::ports::{AuthBackend, TaskStore};
use crate::services::auth::MIN_PASSWORD_LEN;
use crate::services::migration::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

// Argon2id cost for local account passwords
#[cfg(not(test))]
const PASSWORD_MEMORY_KIB: u32 = 19 * 1024;
#[cfg(test)]
const PASSWORD_MEMORY_KIB: u32 = 1024;
const PASSWORD_ITERATIONS: u32 = 2;
const PASSWORD_HASH_LEN: usize = 32;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
        || lower.contains("could not set lock on file")
}

/// Local task backend stored in a DuckDB file
pub struct DuckDbBackend {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    session: SessionStore,
    events: broadcast::Sender<AuthChange>,
}

impl DuckDbBackend {
    /// Open (or create) the database file
    ///
    /// Retries with exponential backoff on file locking errors, which show up
    /// when two CLI invocations open the same database at once.
    pub fn new(db_path: &Path, session: SessionStore) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    let (events, _) = broadcast::channel(16);
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: db_path.to_path_buf(),
                        session,
                        events,
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[taskpad] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::database(format!("Failed to open database after {} retries", MAX_RETRIES))
        }))
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Extension autoloading stays off; nothing here needs an extension
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    /// Run pending migrations
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.lock()?;
        MigrationService::new(&conn, MIGRATIONS)
            .run_pending()
            .map_err(|e| Error::database(e.to_string()))
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }

    // === Accounts ===

    /// Register a local account
    pub fn create_account(&self, email: &str, password: &str) -> Result<User> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(Error::auth("Email is required"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::auth(format!(
                "Password should be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let conn = self.lock()?;
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE email = ?",
            [&email],
            |row| row.get(0),
        )?;
        if exists > 0 {
            return Err(Error::auth("User already registered"));
        }

        let salt: [u8; 16] = rand::thread_rng().gen();
        let hash = hash_password(password, &salt)?;
        let user = User::new(Uuid::new_v4().to_string(), email);

        conn.execute(
            "INSERT INTO users (user_id, email, password_salt, password_hash, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                &user.id,
                &user.email,
                hex::encode(salt),
                hex::encode(hash),
                format_timestamp(Utc::now()),
            ],
        )?;

        Ok(user)
    }

    /// Check credentials and return the matching user
    fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        let email = normalize_email(email);
        let invalid = || Error::auth("Invalid login credentials");

        let conn = self.lock()?;
        let row: Option<(String, String, String)> = conn
            .query_row(
                "SELECT user_id, password_salt, password_hash FROM users WHERE email = ?",
                [&email],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let (user_id, salt_hex, hash_hex) = row.ok_or_else(invalid)?;

        let salt = hex::decode(&salt_hex).map_err(|_| Error::database("Corrupt password salt"))?;
        let hash = hash_password(password, &salt)?;
        if hex::encode(hash) != hash_hex {
            return Err(invalid());
        }

        Ok(User::new(user_id, email))
    }

    fn user_exists(&self, user_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE user_id = ?",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn start_session(&self, user: User) -> Result<Session> {
        let token: [u8; 32] = rand::thread_rng().gen();
        let session = Session {
            access_token: hex::encode(token),
            refresh_token: None,
            expires_at: None,
            user,
        };
        self.session.set(session.clone())?;
        let _ = self.events.send(AuthChange::signed_in(session.clone()));
        Ok(session)
    }

    async fn require_session(&self) -> Result<Session> {
        self.current_session().await?.ok_or(Error::NotAuthenticated)
    }

    // === Tasks ===

    /// Insert a task for a user with an explicit timestamp (used to seed demo data)
    pub fn insert_task(
        &self,
        user_id: &str,
        title: &TaskTitle,
        created_at: DateTime<Utc>,
        completed: bool,
    ) -> Result<Task> {
        // Stored at microsecond precision; the returned row must match what a read gives back
        let created_at = created_at.trunc_subsecs(6);
        let task = Task::new(Uuid::new_v4().to_string(), title.as_str(), created_at, user_id)
            .with_completed(completed);

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tasks (id, title, completed, created_at, user_id) VALUES (?, ?, ?, ?, ?)",
            params![
                &task.id,
                &task.title,
                task.completed,
                format_timestamp(task.created_at),
                &task.user_id,
            ],
        )?;

        Ok(task)
    }

    fn get_task(&self, id: &str, user_id: &str) -> Result<Option<Task>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, completed, created_at, user_id FROM tasks
             WHERE id = ? AND user_id = ?",
        )?;
        let mut rows = stmt.query_map([id, user_id], row_to_task)?;
        match rows.next() {
            Some(row) => Ok(Some(row??)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TaskStore for DuckDbBackend {
    fn is_configured(&self) -> bool {
        true
    }

    async fn list(&self) -> Result<Vec<Task>> {
        let Some(session) = self.current_session().await? else {
            return Ok(Vec::new());
        };

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, completed, created_at, user_id FROM tasks
             WHERE user_id = ?
             ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([&session.user.id], row_to_task)?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row??);
        }
        Ok(tasks)
    }

    async fn create(&self, title: &TaskTitle) -> Result<Task> {
        let session = self.require_session().await?;
        self.insert_task(&session.user.id, title, Utc::now(), false)
    }

    async fn toggle_complete(&self, id: &str, completed: bool) -> Result<Task> {
        let session = self.require_session().await?;

        let updated = {
            let conn = self.lock()?;
            conn.execute(
                "UPDATE tasks SET completed = ? WHERE id = ? AND user_id = ?",
                params![completed, id, &session.user.id],
            )?
        };
        if updated == 0 {
            return Err(Error::not_found(format!("Task {}", id)));
        }

        self.get_task(id, &session.user.id)?
            .ok_or_else(|| Error::not_found(format!("Task {}", id)))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let session = self.require_session().await?;
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM tasks WHERE id = ? AND user_id = ?",
            params![id, &session.user.id],
        )?;
        Ok(())
    }

    async fn delete_completed(&self) -> Result<()> {
        let session = self.require_session().await?;
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM tasks WHERE completed AND user_id = ?",
            [&session.user.id],
        )?;
        Ok(())
    }
}

#[async_trait]
impl AuthBackend for DuckDbBackend {
    fn name(&self) -> &str {
        "demo"
    }

    async fn current_session(&self) -> Result<Option<Session>> {
        let Some(session) = self.session.get() else {
            return Ok(None);
        };
        // The account may have been removed by `tp demo on` resetting the database
        if self.user_exists(&session.user.id)? {
            return Ok(Some(session));
        }
        self.session.clear()?;
        let _ = self.events.send(AuthChange::signed_out());
        Ok(None)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let user = self.authenticate(email, password)?;
        self.start_session(user)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        // No mail server locally, so the account is usable straight away
        let user = self.create_account(email, password)?;
        let session = self.start_session(user)?;
        Ok(SignUpOutcome::SignedIn { user: session.user })
    }

    async fn sign_out(&self) -> Result<()> {
        self.session.clear()?;
        let _ = self.events.send(AuthChange::signed_out());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }
}

fn row_to_task(row: &duckdb::Row) -> duckdb::Result<Result<Task>> {
    let id: String = row.get(0)?;
    let title: String = row.get(1)?;
    let completed: bool = row.get(2)?;
    let created_str: String = row.get(3)?;
    let user_id: String = row.get(4)?;

    Ok(parse_timestamp(&created_str).map(|created_at| Task {
        id,
        title,
        completed,
        created_at,
        user_id,
    }))
}

/// Fixed-precision UTC timestamps sort the same as text and as time
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::database(format!("Invalid timestamp '{}': {}", s, e)))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Derive a password hash using Argon2id
fn hash_password(password: &str, salt: &[u8]) -> Result<Vec<u8>> {
    let params = argon2::Params::new(
        PASSWORD_MEMORY_KIB,
        PASSWORD_ITERATIONS,
        1,
        Some(PASSWORD_HASH_LEN),
    )
    .map_err(|e| Error::Other(format!("Failed to create argon2 params: {:?}", e)))?;

    let argon2 = argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut hash = vec![0u8; PASSWORD_HASH_LEN];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut hash)
        .map_err(|e| Error::Other(format!("Failed to hash password: {:?}", e)))?;
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn create_backend(temp_dir: &TempDir) -> DuckDbBackend {
        let backend = DuckDbBackend::new(
            &temp_dir.path().join("test.duckdb"),
            SessionStore::in_memory(),
        )
        .unwrap();
        backend.ensure_schema().unwrap();
        backend
    }

    fn title(raw: &str) -> TaskTitle {
        TaskTitle::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_sign_up_signs_in_immediately() {
        let temp_dir = TempDir::new().unwrap();
        let backend = create_backend(&temp_dir);
        let mut events = backend.subscribe();

        let outcome = backend.sign_up(" Alice@Example.com ", "secret1").await.unwrap();

        let SignUpOutcome::SignedIn { user } = outcome else {
            panic!("expected immediate sign-in");
        };
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(backend.current_session().await.unwrap().unwrap().user, user);
        assert_eq!(events.try_recv().unwrap().event, crate::domain::AuthEvent::SignedIn);
    }

    #[tokio::test]
    async fn test_sign_up_validation() {
        let temp_dir = TempDir::new().unwrap();
        let backend = create_backend(&temp_dir);

        let short = backend.sign_up("a@example.com", "12345").await.unwrap_err();
        assert!(short.to_string().contains("at least 6"));

        backend.sign_up("a@example.com", "secret1").await.unwrap();
        let duplicate = backend.sign_up("A@example.com", "secret2").await.unwrap_err();
        assert!(duplicate.to_string().contains("already registered"));
    }

    #[tokio::test]
    async fn test_sign_in_checks_password() {
        let temp_dir = TempDir::new().unwrap();
        let backend = create_backend(&temp_dir);
        backend.create_account("a@example.com", "secret1").unwrap();

        let err = backend.sign_in("a@example.com", "wrong-pass").await.unwrap_err();
        assert!(matches!(&err, Error::Auth(msg) if msg == "Invalid login credentials"));
        let unknown = backend.sign_in("b@example.com", "secret1").await.unwrap_err();
        assert!(matches!(unknown, Error::Auth(_)));

        let session = backend.sign_in("a@example.com", "secret1").await.unwrap();
        assert_eq!(session.user.email, "a@example.com");
    }

    #[tokio::test]
    async fn test_signed_out_reads_empty_and_writes_fail() {
        let temp_dir = TempDir::new().unwrap();
        let backend = create_backend(&temp_dir);

        assert!(backend.list().await.unwrap().is_empty());
        assert!(matches!(
            backend.create(&title("Buy milk")).await,
            Err(Error::NotAuthenticated)
        ));
        assert!(matches!(backend.delete_completed().await, Err(Error::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let backend = create_backend(&temp_dir);
        let session = backend.sign_up("a@example.com", "secret1").await.unwrap();
        let SignUpOutcome::SignedIn { user } = session else { unreachable!() };

        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        backend.insert_task(&user.id, &title("first"), base, false).unwrap();
        backend
            .insert_task(&user.id, &title("third"), base + chrono::Duration::hours(2), true)
            .unwrap();
        backend
            .insert_task(&user.id, &title("second"), base + chrono::Duration::hours(1), false)
            .unwrap();

        let titles: Vec<String> = backend.list().await.unwrap().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_task_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let backend = create_backend(&temp_dir);
        backend.sign_up("a@example.com", "secret1").await.unwrap();

        let created = backend.create(&title("Buy milk")).await.unwrap();
        assert!(!created.completed);

        let toggled = backend.toggle_complete(&created.id, true).await.unwrap();
        assert!(toggled.completed);
        assert_eq!(toggled.created_at, created.created_at);
        assert_eq!(toggled.title, "Buy milk");

        backend.delete_completed().await.unwrap();
        assert!(backend.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_created_row_matches_stored_row() {
        let temp_dir = TempDir::new().unwrap();
        let backend = create_backend(&temp_dir);
        let user = backend.create_account("a@example.com", "secret1").unwrap();

        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        let inserted = backend.insert_task(&user.id, &title("precise"), at, false).unwrap();
        assert_eq!(inserted.created_at.timestamp_subsec_nanos(), 123_456_000);

        backend.sign_in("a@example.com", "secret1").await.unwrap();
        let created = backend.create(&title("now")).await.unwrap();
        let stored = backend.list().await.unwrap();
        assert!(stored.contains(&inserted));
        assert!(stored.contains(&created));
    }

    #[tokio::test]
    async fn test_rows_are_scoped_to_owner() {
        let temp_dir = TempDir::new().unwrap();
        let backend = create_backend(&temp_dir);

        backend.sign_up("alice@example.com", "secret1").await.unwrap();
        let alice_open = backend.create(&title("alice open")).await.unwrap();
        let alice_done = backend.create(&title("alice done")).await.unwrap();
        backend.toggle_complete(&alice_done.id, true).await.unwrap();

        backend.sign_up("bob@example.com", "secret1").await.unwrap();
        let bob_done = backend.create(&title("bob done")).await.unwrap();
        backend.toggle_complete(&bob_done.id, true).await.unwrap();

        // Bob sees only his own rows and cannot touch Alice's
        assert_eq!(backend.list().await.unwrap().len(), 1);
        assert!(matches!(
            backend.toggle_complete(&alice_open.id, true).await,
            Err(Error::NotFound(_))
        ));
        backend.delete(&alice_open.id).await.unwrap();
        backend.delete_completed().await.unwrap();
        assert!(backend.list().await.unwrap().is_empty());

        backend.sign_in("alice@example.com", "secret1").await.unwrap();
        let alice_tasks = backend.list().await.unwrap();
        assert_eq!(alice_tasks.len(), 2);
        assert!(alice_tasks.iter().any(|t| t.id == alice_done.id && t.completed));
    }

    #[tokio::test]
    async fn test_session_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.duckdb");
        let session_path = temp_dir.path().join("session.json");

        {
            let backend = DuckDbBackend::new(&db_path, SessionStore::persistent(&session_path)).unwrap();
            backend.ensure_schema().unwrap();
            backend.sign_up("a@example.com", "secret1").await.unwrap();
            backend.create(&title("persisted")).await.unwrap();
        }

        let backend = DuckDbBackend::new(&db_path, SessionStore::persistent(&session_path)).unwrap();
        backend.ensure_schema().unwrap();
        let session = backend.current_session().await.unwrap().unwrap();
        assert_eq!(session.user.email, "a@example.com");
        assert_eq!(backend.list().await.unwrap()[0].title, "persisted");
    }

    #[tokio::test]
    async fn test_session_for_missing_user_is_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let backend = create_backend(&temp_dir);
        backend.sign_up("a@example.com", "secret1").await.unwrap();

        backend
            .lock()
            .unwrap()
            .execute("DELETE FROM users", [])
            .unwrap();

        assert!(backend.current_session().await.unwrap().is_none());
    }

    #[test]
    fn test_retryable_error_detection() {
        assert!(is_retryable_error("IO Error: Could not set lock on file"));
        assert!(is_retryable_error("database is locked"));
        assert!(!is_retryable_error("Permission denied"));
    }

    #[test]
    fn test_timestamp_format_roundtrip() {
        let dt = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let formatted = format_timestamp(dt);
        assert_eq!(formatted, "2024-05-01T12:00:00.000000Z");
        assert_eq!(parse_timestamp(&formatted).unwrap(), dt);
    }
}
