use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::roles::Role;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,                   // unique user ID
    pub username: String,           // unique login name
    #[serde(skip_serializing)]
    pub password_hash: String,      // PHC string (argon2) or legacy bcrypt, never exposed
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub created_at: OffsetDateTime, // creation timestamp
}

/// Row returned by the admin listing; carries no hash.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserSummary {
    pub username: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Failed-login bookkeeping for one username.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct LoginAttemptState {
    pub failed_count: i32,
    pub last_failure_at: OffsetDateTime,
}

impl From<&User> for UserSummary {
    fn from(u: &User) -> Self {
        Self {
            username: u.username.clone(),
            role: u.role,
            created_at: u.created_at,
        }
    }
}
