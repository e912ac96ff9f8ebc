//! In-process `UserRepo` used by unit tests in place of Postgres.

use std::{collections::BTreeMap, sync::Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::{
    repo::UserRepo,
    repo_types::{User, UserSummary},
    roles::Role,
};

#[derive(Debug, Default)]
pub struct MemoryUserRepo {
    users: Mutex<BTreeMap<String, User>>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a row directly, bypassing validation and hashing.
    pub fn insert_raw(&self, username: &str, password_hash: &str, role: Role) {
        self.users.lock().unwrap().insert(
            username.to_string(),
            User {
                id: Uuid::new_v4(),
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                role,
                created_at: OffsetDateTime::now_utc(),
            },
        );
    }

    pub fn stored_hash(&self, username: &str) -> Option<String> {
        self.users
            .lock()
            .unwrap()
            .get(username)
            .map(|u| u.password_hash.clone())
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        Ok(self.users.lock().unwrap().get(username).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.id == id)
            .cloned())
    }

    async fn create(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> anyhow::Result<Option<User>> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(username) {
            return Ok(None);
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(username.to_string(), user.clone());
        Ok(Some(user))
    }

    async fn update_password_hash(
        &self,
        username: &str,
        password_hash: &str,
    ) -> anyhow::Result<bool> {
        Ok(match self.users.lock().unwrap().get_mut(username) {
            Some(u) => {
                u.password_hash = password_hash.to_string();
                true
            }
            None => false,
        })
    }

    async fn update_role(&self, username: &str, role: Role) -> anyhow::Result<bool> {
        Ok(match self.users.lock().unwrap().get_mut(username) {
            Some(u) => {
                u.role = role;
                true
            }
            None => false,
        })
    }

    async fn list(&self) -> anyhow::Result<Vec<UserSummary>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .map(UserSummary::from)
            .collect())
    }
}
