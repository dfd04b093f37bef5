use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::users::{
    repo::{DirectoryError, UserDirectory},
    repo_types::{NewUser, User},
};

/// In-process directory used by tests and local runs without Postgres.
#[derive(Default)]
pub struct MemoryUserDirectory {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<i64, User>,
    next_id: i64,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.users.len()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn create(&self, user: NewUser) -> Result<User, DirectoryError> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(DirectoryError::DuplicateEmail);
        }
        inner.next_id += 1;
        let record = User {
            id: inner.next_id,
            email: user.email,
            encrypted_password: user.encrypted_password,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_email(&self, email: &str) -> Result<User, DirectoryError> {
        self.inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }

    async fn find_by_id(&self, id: i64) -> Result<User, DirectoryError> {
        self.inner
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }
}
