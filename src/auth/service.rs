//! Credential store and authenticator.
//!
//! Registration, login with lockout, password change and role administration
//! over the [`UserRepo`] and [`AttemptStore`] seams. Plaintext passwords stop
//! here; only hashes reach storage.

use std::{path::Path, sync::Arc};

use anyhow::Context;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        legacy,
        lockout::{AttemptStore, LockoutPolicy},
        password::{hash_password, needs_rehash, verify_password},
        repo::UserRepo,
        repo_types::{User, UserSummary},
        roles::Role,
        validation::{validate_password, validate_username},
    },
    clock::Clock,
    error::{AuthError, CredentialFailure},
};

// Verified against when the username is unknown so both paths cost one hash.
const DUMMY_PASSWORD: &str = "Dummy-Password-1!";

pub struct Authenticator {
    users: Arc<dyn UserRepo>,
    attempts: Arc<dyn AttemptStore>,
    policy: LockoutPolicy,
    clock: Arc<dyn Clock>,
    dummy_hash: String,
}

impl Authenticator {
    pub fn new(
        users: Arc<dyn UserRepo>,
        attempts: Arc<dyn AttemptStore>,
        policy: LockoutPolicy,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let dummy_hash = hash_password(DUMMY_PASSWORD).context("prepare dummy hash")?;
        Ok(Self {
            users,
            attempts,
            policy,
            clock,
            dummy_hash,
        })
    }

    pub fn policy(&self) -> LockoutPolicy {
        self.policy
    }

    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<User, AuthError> {
        let username = username.trim();
        validate_username(username).map_err(AuthError::InvalidInput)?;
        validate_password(password).map_err(AuthError::InvalidInput)?;

        if self.users.find_by_username(username).await?.is_some() {
            warn!(username, "username already registered");
            return Err(AuthError::UsernameTaken);
        }

        let hash = hash_password(password)?;
        let Some(user) = self.users.create(username, &hash, role).await? else {
            warn!(username, "username taken during insert");
            return Err(AuthError::UsernameTaken);
        };

        info!(user_id = %user.id, username = %user.username, role = %user.role, "user registered");
        Ok(user)
    }

    /// Verifies a username/password pair under the lockout policy.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let username = username.trim();
        if validate_username(username).is_err() {
            return Err(AuthError::InvalidCredentials(CredentialFailure::UnknownUser));
        }

        let now = self.clock.now();
        let state = self.attempts.get(username).await?;
        if let Some(remaining_secs) = self.policy.remaining_lockout(state.as_ref(), now) {
            warn!(username, remaining_secs, "login rejected, account locked");
            return Err(AuthError::LockedOut { remaining_secs });
        }

        let found = self.users.find_by_username(username).await?;
        let verified = match &found {
            Some(user) => verify_password(password, &user.password_hash)
                .with_context(|| format!("verify stored hash for {}", user.id))?,
            None => {
                let _ = verify_password(password, &self.dummy_hash);
                false
            }
        };

        match found {
            Some(user) if verified => {
                self.attempts.clear(username).await?;
                self.upgrade_legacy_hash(&user, password).await;
                info!(user_id = %user.id, username, "user logged in");
                Ok(user)
            }
            found => {
                let failure = if found.is_some() {
                    CredentialFailure::WrongPassword
                } else {
                    CredentialFailure::UnknownUser
                };
                let state = self
                    .attempts
                    .record_failure(username, now, self.policy.window_start(now))
                    .await?;
                warn!(
                    username,
                    ?failure,
                    failed_count = state.failed_count,
                    "login failed"
                );
                Err(AuthError::InvalidCredentials(failure))
            }
        }
    }

    async fn upgrade_legacy_hash(&self, user: &User, password: &str) {
        if !needs_rehash(&user.password_hash) {
            return;
        }
        let result = match hash_password(password) {
            Ok(hash) => self.users.update_password_hash(&user.username, &hash).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(true) => info!(user_id = %user.id, "legacy password hash upgraded"),
            Ok(false) => warn!(user_id = %user.id, "legacy hash upgrade skipped, user no longer exists"),
            Err(e) => warn!(user_id = %user.id, error = %e, "legacy hash upgrade failed"),
        }
    }

    /// Re-authenticates with the old password (subject to lockout) before
    /// storing a hash of the new one.
    #[instrument(skip(self, old_password, new_password))]
    pub async fn change_password(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_password(new_password).map_err(AuthError::InvalidInput)?;
        if old_password == new_password {
            return Err(AuthError::invalid(
                "New password must differ from the current password.",
            ));
        }
        let user = self.login(username, old_password).await?;

        let hash = hash_password(new_password)?;
        if !self.users.update_password_hash(&user.username, &hash).await? {
            return Err(AuthError::UserNotFound);
        }
        info!(user_id = %user.id, "password changed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_role(&self, username: &str, role: Role) -> Result<(), AuthError> {
        if !self.users.update_role(username.trim(), role).await? {
            return Err(AuthError::UserNotFound);
        }
        info!(username, %role, "role updated");
        Ok(())
    }

    pub async fn get_user(&self, username: &str) -> Result<User, AuthError> {
        self.users
            .find_by_username(username.trim())
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> Result<User, AuthError> {
        self.users.find_by_id(id).await?.ok_or(AuthError::UserNotFound)
    }

    pub async fn list_users(&self) -> Result<Vec<UserSummary>, AuthError> {
        Ok(self.users.list().await?)
    }

    /// Copies users from a legacy `users.txt` into the store with role
    /// `user`. Existing usernames are left untouched. Returns rows inserted.
    #[instrument(skip(self))]
    pub async fn import_legacy_users(&self, path: &Path) -> anyhow::Result<usize> {
        let mut imported = 0;
        for entry in legacy::read_file(path).await? {
            match self
                .users
                .create(&entry.username, &entry.password_hash, Role::User)
                .await?
            {
                Some(user) => {
                    debug!(user_id = %user.id, username = %user.username, "legacy user imported");
                    imported += 1;
                }
                None => debug!(username = %entry.username, "legacy user already present"),
            }
        }
        info!(imported, path = %path.display(), "legacy users imported");
        Ok(imported)
    }

    pub async fn purge_expired_attempts(&self) -> anyhow::Result<u64> {
        let cutoff = self.policy.window_start(self.clock.now());
        let purged = self.attempts.purge_before(cutoff).await?;
        if purged > 0 {
            debug!(purged, "expired login attempt records purged");
        }
        Ok(purged)
    }
}
