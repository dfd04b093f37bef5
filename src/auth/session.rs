//! Cookie-backed server-side sessions.
//!
//! Used instead of tokens when the server runs with `AUTH_MODE=session`.
//! The client only ever holds an opaque session id; the user id lives in
//! the [`SessionStore`].
use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use axum::http::{header::COOKIE, HeaderMap};
use cookie::{Cookie, SameSite};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use serde_json::Value;
use sqlx::{types::Json, FromRow, PgPool};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Key under which the authenticated user id is stored.
pub const USER_ID_KEY: &str = "user_id";

const SESSION_ID_LEN: usize = 48;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no active session")]
    NoSession,
    #[error("session does not hold a valid user id")]
    InvalidSessionValue,
    #[error("session store failure: {0}")]
    Persist(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub values: HashMap<String, Value>,
    pub expires_at: OffsetDateTime,
}

impl Session {
    fn new(expires_at: OffsetDateTime) -> Self {
        Self {
            id: new_session_id(),
            values: HashMap::new(),
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

fn new_session_id() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

/// Persistence for sessions. Expiry is the store's business: a store must
/// not hand back a session past its `expires_at`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> anyhow::Result<Option<Session>>;
    async fn save(&self, session: &Session) -> anyhow::Result<()>;
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> anyhow::Result<Option<Session>> {
        let now = OffsetDateTime::now_utc();
        Ok(self
            .sessions
            .read()
            .await
            .get(id)
            .filter(|s| !s.is_expired_at(now))
            .cloned())
    }

    async fn save(&self, session: &Session) -> anyhow::Result<()> {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| !s.is_expired_at(now));
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }
}

/// Sessions kept in the `sessions` table.
#[derive(Clone)]
pub struct PgSessionStore {
    db: PgPool,
}

impl PgSessionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: String,
    data: Json<HashMap<String, Value>>,
    expires_at: OffsetDateTime,
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(&self, id: &str) -> anyhow::Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, data, expires_at
            FROM sessions
            WHERE id = $1 AND expires_at > now()
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(|r| Session {
            id: r.id,
            values: r.data.0,
            expires_at: r.expires_at,
        }))
    }

    async fn save(&self, session: &Session) -> anyhow::Result<()> {
        let pruned = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
            .execute(&self.db)
            .await?
            .rows_affected();
        if pruned > 0 {
            debug!(pruned, "expired sessions removed");
        }

        sqlx::query(
            r#"
            INSERT INTO sessions (id, data, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET data = EXCLUDED.data, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&session.id)
        .bind(Json(&session.values))
        .bind(session.expires_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

/// Issues and reads the session cookie on top of a [`SessionStore`].
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    cookie_name: String,
    ttl: Duration,
    secure: bool,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        cookie_name: impl Into<String>,
        ttl: Duration,
        secure: bool,
    ) -> Self {
        Self {
            store,
            cookie_name: cookie_name.into(),
            ttl,
            secure,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Session id carried by the request's `Cookie` headers, if any.
    pub fn session_id(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(Result::ok)
            .find(|c| c.name() == self.cookie_name)
            .map(|c| c.value().to_string())
    }

    /// Binds `user_id` to a session and returns the cookie to set.
    ///
    /// Values of a live session named by the request are carried over,
    /// but the session is always saved under a fresh id so an id handed
    /// out before sign-in never becomes authenticated.
    pub async fn create_session(
        &self,
        headers: &HeaderMap,
        user_id: i64,
    ) -> Result<Cookie<'static>, SessionError> {
        let expires_at = OffsetDateTime::now_utc() + self.ttl;
        let mut session = Session::new(expires_at);

        if let Some(id) = self.session_id(headers) {
            let existing = self.store.load(&id).await.map_err(persist)?;
            if let Some(existing) = existing {
                session.values = existing.values;
            }
        }

        session
            .values
            .insert(USER_ID_KEY.to_string(), Value::from(user_id));
        self.store.save(&session).await.map_err(persist)?;
        debug!(user_id, "session created");

        Ok(self.cookie(session.id))
    }

    /// Resolves the user id bound to the request's session.
    pub async fn read_session(&self, headers: &HeaderMap) -> Result<i64, SessionError> {
        let id = self.session_id(headers).ok_or(SessionError::NoSession)?;
        let session = self
            .store
            .load(&id)
            .await
            .map_err(persist)?
            .ok_or(SessionError::NoSession)?;
        if session.is_expired_at(OffsetDateTime::now_utc()) {
            return Err(SessionError::NoSession);
        }
        let value = session
            .values
            .get(USER_ID_KEY)
            .ok_or(SessionError::NoSession)?;
        value.as_i64().ok_or(SessionError::InvalidSessionValue)
    }

    fn cookie(&self, id: String) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), id))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(cookie::time::Duration::seconds(self.ttl.whole_seconds()))
            .build()
    }
}

fn persist(e: anyhow::Error) -> SessionError {
    error!(error = ?e, "session store failure");
    SessionError::Persist(e)
}
