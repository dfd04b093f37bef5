use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;

/// Which proof of identity the server hands out on sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    Token,
    Session,
}

/// Where server-side sessions live in session mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub ttl_minutes: i64,
    pub secure: bool,
    pub backend: SessionBackend,
}

/// Longest session lifetime accepted from the environment (one year).
pub const MAX_SESSION_TTL_MINUTES: i64 = 60 * 24 * 365;

impl SessionConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=MAX_SESSION_TTL_MINUTES).contains(&self.ttl_minutes) {
            bail!(
                "SESSION_TTL_MINUTES must be between 1 and {MAX_SESSION_TTL_MINUTES}, got {}",
                self.ttl_minutes
            );
        }
        if self.cookie_name.trim().is_empty() {
            bail!("SESSION_COOKIE_NAME must not be empty");
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "authgate_session".into(),
            ttl_minutes: 60 * 24,
            secure: false,
            backend: SessionBackend::Postgres,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub auth_mode: AuthMode,
    pub jwt: JwtConfig,
    pub session: SessionConfig,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if secret.is_empty() {
            bail!("JWT_SECRET must not be empty");
        }

        let auth_mode = match std::env::var("AUTH_MODE").as_deref() {
            Ok("session") => AuthMode::Session,
            Ok("token") | Err(_) => AuthMode::Token,
            Ok(other) => bail!("unknown AUTH_MODE {other:?}, expected token or session"),
        };
        let backend = match std::env::var("SESSION_BACKEND").as_deref() {
            Ok("memory") => SessionBackend::Memory,
            Ok("postgres") | Err(_) => SessionBackend::Postgres,
            Ok(other) => bail!("unknown SESSION_BACKEND {other:?}, expected memory or postgres"),
        };

        let defaults = SessionConfig::default();
        let session = SessionConfig {
            cookie_name: std::env::var("SESSION_COOKIE_NAME").unwrap_or(defaults.cookie_name),
            ttl_minutes: parse_var("SESSION_TTL_MINUTES").unwrap_or(defaults.ttl_minutes),
            secure: parse_var("SESSION_COOKIE_SECURE").unwrap_or(defaults.secure),
            backend,
        };
        session.validate()?;

        Ok(Self {
            database_url,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS").unwrap_or(10),
            auth_mode,
            jwt: JwtConfig { secret },
            session,
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS").unwrap_or(10),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_defaults() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.cookie_name, "authgate_session");
        assert_eq!(cfg.ttl_minutes, 1440);
        assert!(!cfg.secure);
        assert_eq!(cfg.backend, SessionBackend::Postgres);
    }

    #[test]
    fn session_ttl_must_be_in_range() {
        assert!(SessionConfig::default().validate().is_ok());
        for ttl_minutes in [0, -5, MAX_SESSION_TTL_MINUTES + 1, i64::MAX] {
            let cfg = SessionConfig {
                ttl_minutes,
                ..SessionConfig::default()
            };
            let err = cfg.validate().unwrap_err();
            assert!(err.to_string().contains("SESSION_TTL_MINUTES"), "{err}");
        }
        let longest = SessionConfig {
            ttl_minutes: MAX_SESSION_TTL_MINUTES,
            ..SessionConfig::default()
        };
        assert!(longest.validate().is_ok());
    }

    #[test]
    fn blank_cookie_name_is_rejected() {
        let cfg = SessionConfig {
            cookie_name: "  ".into(),
            ..SessionConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parse_var_ignores_garbage() {
        std::env::set_var("AUTHGATE_TEST_PARSE_VAR", "not-a-number");
        assert_eq!(parse_var::<u64>("AUTHGATE_TEST_PARSE_VAR"), None);
        std::env::set_var("AUTHGATE_TEST_PARSE_VAR", "42");
        assert_eq!(parse_var::<u64>("AUTHGATE_TEST_PARSE_VAR"), Some(42));
        std::env::remove_var("AUTHGATE_TEST_PARSE_VAR");
    }
}
