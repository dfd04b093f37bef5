use std::sync::Arc;

use axum::extract::FromRef;
use time::Duration;

use crate::{
    auth::{
        session::{MemorySessionStore, PgSessionStore, SessionManager, SessionStore},
        token::TokenService,
    },
    config::{AppConfig, AuthMode, SessionBackend, MAX_SESSION_TTL_MINUTES},
    db,
    users::{MemoryUserDirectory, PgUserDirectory, UserDirectory},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserDirectory>,
    pub tokens: TokenService,
    /// Present only when running in session mode.
    pub sessions: Option<SessionManager>,
}

impl AppState {
    /// Connects to Postgres, applies migrations and wires the directory
    /// and session store selected by `config`.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let pool = db::connect(&config).await?;
        db::migrate(&pool).await;

        let users = Arc::new(PgUserDirectory::new(pool.clone())) as Arc<dyn UserDirectory>;
        let store = match config.session.backend {
            SessionBackend::Postgres => Arc::new(PgSessionStore::new(pool)) as Arc<dyn SessionStore>,
            SessionBackend::Memory => Arc::new(MemorySessionStore::new()) as Arc<dyn SessionStore>,
        };
        Ok(Self::from_parts(config, users, store))
    }

    /// Directory and sessions held in process memory.
    pub fn in_memory(config: AppConfig) -> Self {
        Self::from_parts(
            config,
            Arc::new(MemoryUserDirectory::new()),
            Arc::new(MemorySessionStore::new()),
        )
    }

    pub fn from_parts(
        config: AppConfig,
        users: Arc<dyn UserDirectory>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let tokens = TokenService::new(config.jwt.secret.as_bytes());
        let sessions = (config.auth_mode == AuthMode::Session).then(|| {
            SessionManager::new(
                store,
                config.session.cookie_name.clone(),
                Duration::minutes(config.session.ttl_minutes.clamp(1, MAX_SESSION_TTL_MINUTES)),
                config.session.secure,
            )
        });
        Self {
            config: Arc::new(config),
            users,
            tokens,
            sessions,
        }
    }
}

impl FromRef<AppState> for TokenService {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}
