//! Supabase API client
//!
//! Talks to a hosted Supabase project: PostgREST (`/rest/v1`) for the `tasks`
//! table and GoTrue (`/auth/v1`) for e-mail/password accounts. Row-level
//! security on the project restricts every query to the caller's rows; the
//! client additionally filters every query by the session's user id.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{broadcast, Mutex};
use url::Url;

use crate::adapters::session_store::SessionStore;
use crate::domain::result::{Error, Result};
use crate::domain::{AuthChange, Session, SignUpOutcome, Task, TaskTitle, User};
use crate::ports::{AuthBackend, TaskStore};

/// Request timeout for every call
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// PostgREST media type that makes the server return one object instead of an array
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Supabase API client
#[derive(Debug)]
pub struct SupabaseClient {
    client: Client,
    rest_url: String,
    auth_url: String,
    anon_key: String,
    session: SessionStore,
    events: broadcast::Sender<AuthChange>,
    // Serializes token refreshes within this process
    refresh_lock: Mutex<()>,
}

/// GoTrue user object (only the fields we read)
#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<AuthUser> for User {
    fn from(user: AuthUser) -> Self {
        User::new(user.id, user.email.unwrap_or_default())
    }
}

/// GoTrue token response (sign-in, refresh, auto-confirmed sign-up)
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| Utc::now().timestamp() + secs));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user.into(),
        }
    }
}

/// Error body shapes used by PostgREST and GoTrue
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiErrorBody {
    fn into_message(self, status: StatusCode) -> String {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
    }
}

impl SupabaseClient {
    /// Create a client for a project URL and its public anon key
    ///
    /// The URL must use HTTPS, except for a local development stack on
    /// `localhost` / `127.0.0.1`.
    pub fn new(project_url: &str, anon_key: &str, session: SessionStore) -> Result<Self> {
        let parsed = Url::parse(project_url)
            .map_err(|_| Error::Config(format!("Invalid backend URL: {}", project_url)))?;

        let host = parsed.host_str().unwrap_or("");
        let is_local = matches!(host, "localhost" | "127.0.0.1");
        match parsed.scheme() {
            "https" => {}
            "http" if is_local => {}
            _ => {
                return Err(Error::Config(
                    "Backend URL must use HTTPS".to_string(),
                ))
            }
        }

        if anon_key.trim().is_empty() {
            return Err(Error::Config("Backend access key is empty".to_string()));
        }

        let base_url = parsed.as_str().trim_end_matches('/').to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        let (events, _) = broadcast::channel(16);

        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", base_url),
            auth_url: format!("{}/auth/v1", base_url),
            anon_key: anon_key.to_string(),
            session,
            events,
            refresh_lock: Mutex::new(()),
        })
    }

    fn tasks_url(&self) -> String {
        format!("{}/tasks", self.rest_url)
    }

    /// Attach the API key and the bearer token (session token, or the anon key)
    fn authorized(&self, builder: RequestBuilder, session: Option<&Session>) -> RequestBuilder {
        let token = session
            .map(|s| s.access_token.as_str())
            .unwrap_or(&self.anon_key);
        builder.header("apikey", &self.anon_key).bearer_auth(token)
    }

    /// Ask PostgREST to return the affected row as a single object
    fn returning_row(builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Prefer", "return=representation")
            .header(ACCEPT, HeaderValue::from_static(SINGLE_OBJECT))
    }

    async fn require_session(&self) -> Result<Session> {
        self.current_session().await?.ok_or(Error::NotAuthenticated)
    }

    fn emit(&self, change: AuthChange) {
        // No subscribers is fine
        let _ = self.events.send(change);
    }

    fn store_session(&self, session: &Session) -> Result<()> {
        self.session.set(session.clone())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session> {
        let response = self
            .client
            .post(format!("{}/token", self.auth_url))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(map_request_error)?;

        let response = check_auth_response(response).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::auth(format!("Failed to parse token response: {}", e)))?;
        Ok(token.into_session())
    }

    /// Drop the stored session after the backend rejected it
    fn expire_session(&self) -> Result<()> {
        self.session.clear()?;
        self.emit(AuthChange::signed_out());
        Ok(())
    }
}

#[async_trait]
impl TaskStore for SupabaseClient {
    fn is_configured(&self) -> bool {
        true
    }

    async fn list(&self) -> Result<Vec<Task>> {
        let session = self.current_session().await?;

        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
        ];
        if let Some(s) = &session {
            query.push(("user_id", format!("eq.{}", s.user.id)));
        }

        let response = self
            .authorized(self.client.get(self.tasks_url()), session.as_ref())
            .query(&query)
            .send()
            .await
            .map_err(map_request_error)?;

        check_data_response(response)
            .await?
            .json::<Vec<Task>>()
            .await
            .map_err(|e| Error::backend(format!("Failed to parse tasks: {}", e)))
    }

    async fn create(&self, title: &TaskTitle) -> Result<Task> {
        let session = self.require_session().await?;

        let request = self
            .authorized(self.client.post(self.tasks_url()), Some(&session))
            .json(&json!({
                "title": title.as_str(),
                "completed": false,
                "user_id": session.user.id,
            }));

        let response = Self::returning_row(request)
            .send()
            .await
            .map_err(map_request_error)?;

        check_data_response(response)
            .await?
            .json::<Task>()
            .await
            .map_err(|e| Error::backend(format!("Failed to parse created task: {}", e)))
    }

    async fn toggle_complete(&self, id: &str, completed: bool) -> Result<Task> {
        let session = self.require_session().await?;

        let request = self
            .authorized(self.client.patch(self.tasks_url()), Some(&session))
            .query(&[
                ("id", format!("eq.{}", id)),
                ("user_id", format!("eq.{}", session.user.id)),
            ])
            .json(&json!({ "completed": completed }));

        let response = Self::returning_row(request)
            .send()
            .await
            .map_err(map_request_error)?;

        // A single-object request matching no row comes back as 406
        if response.status() == StatusCode::NOT_ACCEPTABLE {
            return Err(Error::not_found(format!("Task {}", id)));
        }

        check_data_response(response)
            .await?
            .json::<Task>()
            .await
            .map_err(|e| Error::backend(format!("Failed to parse updated task: {}", e)))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let session = self.require_session().await?;

        let response = self
            .authorized(self.client.delete(self.tasks_url()), Some(&session))
            .query(&[
                ("id", format!("eq.{}", id)),
                ("user_id", format!("eq.{}", session.user.id)),
            ])
            .send()
            .await
            .map_err(map_request_error)?;

        check_data_response(response).await?;
        Ok(())
    }

    async fn delete_completed(&self) -> Result<()> {
        let session = self.require_session().await?;

        let response = self
            .authorized(self.client.delete(self.tasks_url()), Some(&session))
            .query(&[
                ("completed", "eq.true".to_string()),
                ("user_id", format!("eq.{}", session.user.id)),
            ])
            .send()
            .await
            .map_err(map_request_error)?;

        check_data_response(response).await?;
        Ok(())
    }
}

#[async_trait]
impl AuthBackend for SupabaseClient {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn current_session(&self) -> Result<Option<Session>> {
        let Some(session) = self.session.get() else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed or signed out while we waited
        let current = match self.session.get() {
            Some(current) if !current.is_expired() => return Ok(Some(current)),
            None => return Ok(None),
            Some(current) => current,
        };

        let Some(refresh_token) = current.refresh_token.as_deref() else {
            self.expire_session()?;
            return Ok(None);
        };

        match self.refresh(refresh_token).await {
            Ok(refreshed) => {
                self.store_session(&refreshed)?;
                self.emit(AuthChange::token_refreshed(refreshed.clone()));
                Ok(Some(refreshed))
            }
            // Keep the session when the backend was unreachable; it may still be valid later
            Err(e @ Error::Network(_)) => Err(e),
            Err(_) => {
                self.expire_session()?;
                Ok(None)
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let response = self
            .client
            .post(format!("{}/token", self.auth_url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(map_request_error)?;

        let response = check_auth_response(response).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::auth(format!("Failed to parse token response: {}", e)))?;

        let session = token.into_session();
        self.store_session(&session)?;
        self.emit(AuthChange::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        let response = self
            .client
            .post(format!("{}/signup", self.auth_url))
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(map_request_error)?;

        let response = check_auth_response(response).await?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::auth(format!("Failed to parse sign-up response: {}", e)))?;

        // Projects with auto-confirm return a full session; others return only the user
        if body.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(body)?;
            let session = token.into_session();
            self.store_session(&session)?;
            self.emit(AuthChange::signed_in(session.clone()));
            return Ok(SignUpOutcome::SignedIn { user: session.user });
        }

        let user: AuthUser = serde_json::from_value(body)?;
        Ok(SignUpOutcome::ConfirmationRequired {
            email: user.email.unwrap_or_else(|| email.to_string()),
        })
    }

    async fn sign_out(&self) -> Result<()> {
        if let Some(session) = self.session.get() {
            // Server-side revocation is best effort; the local session goes regardless
            let _ = self
                .client
                .post(format!("{}/logout", self.auth_url))
                .header("apikey", &self.anon_key)
                .bearer_auth(&session.access_token)
                .send()
                .await;
        }
        self.session.clear()?;
        self.emit(AuthChange::signed_out());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }
}

/// Map request errors to user-friendly messages
fn map_request_error(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Network(format!(
            "Connection timed out after {} seconds",
            REQUEST_TIMEOUT_SECS
        ))
    } else if error.is_connect() {
        Error::Network("Unable to connect to the backend".to_string())
    } else {
        Error::Network(format!("Request failed: {}", error))
    }
}

async fn error_message(response: Response) -> (StatusCode, String) {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let parsed: ApiErrorBody = serde_json::from_str(&body).unwrap_or_default();
    (status, parsed.into_message(status))
}

/// Data endpoints: 401/403 are auth failures, everything else a backend error
async fn check_data_response(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let (status, message) = error_message(response).await;
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Auth(message)),
        _ => Err(Error::Backend(format!("HTTP {}: {}", status.as_u16(), message))),
    }
}

/// Auth endpoints: any client error is reported as an auth error
async fn check_auth_response(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let (status, message) = error_message(response).await;
    if status.is_client_error() {
        Err(Error::Auth(message))
    } else {
        Err(Error::Backend(format!("HTTP {}: {}", status.as_u16(), message)))
    }
}
