use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::users::repo_types::{NewUser, User};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("record not found")]
    NotFound,
    #[error("email has already been taken")]
    DuplicateEmail,
    #[error("user directory failure: {0}")]
    Storage(anyhow::Error),
}

/// Lookup and creation of users, independent of where they are kept.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User, DirectoryError>;
    async fn find_by_email(&self, email: &str) -> Result<User, DirectoryError>;
    async fn find_by_id(&self, id: i64) -> Result<User, DirectoryError>;
}

/// Postgres-backed directory.
#[derive(Clone)]
pub struct PgUserDirectory {
    db: PgPool,
}

impl PgUserDirectory {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn storage(e: sqlx::Error) -> DirectoryError {
    match e {
        sqlx::Error::RowNotFound => DirectoryError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => DirectoryError::DuplicateEmail,
        other => DirectoryError::Storage(other.into()),
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn create(&self, user: NewUser) -> Result<User, DirectoryError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, encrypted_password)
            VALUES ($1, $2)
            RETURNING id, email, encrypted_password, created_at
            "#,
        )
        .bind(&user.email)
        .bind(&user.encrypted_password)
        .fetch_one(&self.db)
        .await
        .map_err(storage)
    }

    async fn find_by_email(&self, email: &str) -> Result<User, DirectoryError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, encrypted_password, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_one(&self.db)
        .await
        .map_err(storage)
    }

    async fn find_by_id(&self, id: i64) -> Result<User, DirectoryError> {
        sqlx::query_as::<_, User>(
            r#"SELECT id, email, encrypted_password, created_at FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_one(&self.db)
        .await
        .map_err(storage)
    }
}
