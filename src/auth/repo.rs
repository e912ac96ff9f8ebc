use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{
    repo_types::{User, UserSummary},
    roles::Role,
};

/// Persistence for credential records.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    /// Inserts a user; `None` means the username is already taken.
    async fn create(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> anyhow::Result<Option<User>>;
    /// Returns false when no such user exists.
    async fn update_password_hash(&self, username: &str, password_hash: &str)
        -> anyhow::Result<bool>;
    /// Returns false when no such user exists.
    async fn update_role(&self, username: &str, role: Role) -> anyhow::Result<bool>;
    async fn list(&self) -> anyhow::Result<Vec<UserSummary>>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, role, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, username, password_hash, role, created_at FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> anyhow::Result<Option<User>> {
        // The unique index decides races between concurrent registrations.
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (username) DO NOTHING
            RETURNING id, username, password_hash, role, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_password_hash(
        &self,
        username: &str,
        password_hash: &str,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(r#"UPDATE users SET password_hash = $2 WHERE username = $1"#)
            .bind(username)
            .bind(password_hash)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn update_role(&self, username: &str, role: Role) -> anyhow::Result<bool> {
        let res = sqlx::query(r#"UPDATE users SET role = $2 WHERE username = $1"#)
            .bind(username)
            .bind(role.as_str())
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list(&self) -> anyhow::Result<Vec<UserSummary>> {
        let rows = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT username, role, created_at
            FROM users
            ORDER BY username
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}
