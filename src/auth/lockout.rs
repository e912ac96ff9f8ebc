//! Failed-login bookkeeping and the lockout window.
//!
//! State is kept per username behind [`AttemptStore`]: either a row in
//! `login_attempts` or an in-process map whose entries are evicted once the
//! window has passed since their last failure.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};

use crate::{auth::repo_types::LoginAttemptState, config::LockoutConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub window: Duration,
}

impl LockoutPolicy {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
        }
    }

    /// Seconds left on an active lockout, rounded up. `None` when the
    /// username may attempt a login.
    pub fn remaining_lockout(
        &self,
        state: Option<&LoginAttemptState>,
        now: OffsetDateTime,
    ) -> Option<u64> {
        let state = state?;
        if state.failed_count < 0 || (state.failed_count as u32) < self.max_attempts {
            return None;
        }
        let elapsed = now - state.last_failure_at;
        if elapsed >= self.window {
            return None;
        }
        let left = self.window - elapsed;
        let mut secs = left.whole_seconds().max(0) as u64;
        if left.subsec_nanoseconds() > 0 {
            secs += 1;
        }
        Some(secs.max(1))
    }

    /// Failures at or before this instant no longer count toward a lockout.
    pub fn window_start(&self, now: OffsetDateTime) -> OffsetDateTime {
        now - self.window
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::from(&LockoutConfig::default())
    }
}

impl From<&LockoutConfig> for LockoutPolicy {
    fn from(cfg: &LockoutConfig) -> Self {
        Self::new(cfg.max_attempts, Duration::seconds(cfg.window_secs as i64))
    }
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn get(&self, username: &str) -> anyhow::Result<Option<LoginAttemptState>>;
    /// Counts one more failure at `now`. A previous failure at or before
    /// `window_start` is forgotten and the count restarts at 1.
    async fn record_failure(
        &self,
        username: &str,
        now: OffsetDateTime,
        window_start: OffsetDateTime,
    ) -> anyhow::Result<LoginAttemptState>;
    async fn clear(&self, username: &str) -> anyhow::Result<()>;
    /// Drops every record whose last failure is at or before `cutoff`.
    async fn purge_before(&self, cutoff: OffsetDateTime) -> anyhow::Result<u64>;
}

#[derive(Clone)]
pub struct PgAttemptStore {
    db: PgPool,
}

impl PgAttemptStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn get(&self, username: &str) -> anyhow::Result<Option<LoginAttemptState>> {
        let row = sqlx::query_as::<_, LoginAttemptState>(
            r#"SELECT failed_count, last_failure_at FROM login_attempts WHERE username = $1"#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn record_failure(
        &self,
        username: &str,
        now: OffsetDateTime,
        window_start: OffsetDateTime,
    ) -> anyhow::Result<LoginAttemptState> {
        let row = sqlx::query_as::<_, LoginAttemptState>(
            r#"
            INSERT INTO login_attempts (username, failed_count, last_failure_at)
            VALUES ($1, 1, $2)
            ON CONFLICT (username) DO UPDATE SET
                failed_count = CASE
                    WHEN login_attempts.last_failure_at <= $3 THEN 1
                    ELSE login_attempts.failed_count + 1
                END,
                last_failure_at = EXCLUDED.last_failure_at
            RETURNING failed_count, last_failure_at
            "#,
        )
        .bind(username)
        .bind(now)
        .bind(window_start)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn clear(&self, username: &str) -> anyhow::Result<()> {
        sqlx::query(r#"DELETE FROM login_attempts WHERE username = $1"#)
            .bind(username)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn purge_before(&self, cutoff: OffsetDateTime) -> anyhow::Result<u64> {
        let res = sqlx::query(r#"DELETE FROM login_attempts WHERE last_failure_at <= $1"#)
            .bind(cutoff)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected())
    }
}

/// Process-local attempt store. Entries live until cleared by a successful
/// login or purged once their last failure falls out of the window.
#[derive(Debug, Default)]
pub struct MemoryAttemptStore {
    entries: Mutex<HashMap<String, LoginAttemptState>>,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, HashMap<String, LoginAttemptState>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("attempt store lock poisoned"))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().map(|m| m.len()).unwrap_or(0)
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn get(&self, username: &str) -> anyhow::Result<Option<LoginAttemptState>> {
        Ok(self.lock()?.get(username).copied())
    }

    async fn record_failure(
        &self,
        username: &str,
        now: OffsetDateTime,
        window_start: OffsetDateTime,
    ) -> anyhow::Result<LoginAttemptState> {
        let mut entries = self.lock()?;
        let state = entries
            .entry(username.to_string())
            .and_modify(|s| {
                s.failed_count = if s.last_failure_at <= window_start {
                    1
                } else {
                    s.failed_count + 1
                };
                s.last_failure_at = now;
            })
            .or_insert(LoginAttemptState {
                failed_count: 1,
                last_failure_at: now,
            });
        Ok(*state)
    }

    async fn clear(&self, username: &str) -> anyhow::Result<()> {
        self.lock()?.remove(username);
        Ok(())
    }

    async fn purge_before(&self, cutoff: OffsetDateTime) -> anyhow::Result<u64> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|_, s| s.last_failure_at > cutoff);
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2024-11-05 09:00 UTC);

    fn state(count: i32, at: OffsetDateTime) -> LoginAttemptState {
        LoginAttemptState {
            failed_count: count,
            last_failure_at: at,
        }
    }

    #[test]
    fn no_state_means_no_lockout() {
        assert_eq!(LockoutPolicy::default().remaining_lockout(None, T0), None);
    }

    #[test]
    fn below_threshold_is_not_locked() {
        let p = LockoutPolicy::default();
        assert_eq!(p.remaining_lockout(Some(&state(2, T0)), T0), None);
    }

    #[test]
    fn at_threshold_reports_remaining_seconds() {
        let p = LockoutPolicy::default();
        let s = state(3, T0);
        assert_eq!(p.remaining_lockout(Some(&s), T0), Some(300));
        assert_eq!(
            p.remaining_lockout(Some(&s), T0 + Duration::seconds(120)),
            Some(180)
        );
        assert_eq!(
            p.remaining_lockout(Some(&s), T0 + Duration::milliseconds(299_500)),
            Some(1)
        );
    }

    #[test]
    fn lockout_ends_when_window_elapses() {
        let p = LockoutPolicy::default();
        let s = state(5, T0);
        assert_eq!(p.remaining_lockout(Some(&s), T0 + Duration::seconds(300)), None);
    }

    #[tokio::test]
    async fn memory_store_counts_consecutive_failures() {
        let store = MemoryAttemptStore::new();
        let p = LockoutPolicy::default();
        for i in 1..=3 {
            let now = T0 + Duration::seconds(i);
            let s = store
                .record_failure("alice", now, p.window_start(now))
                .await
                .unwrap();
            assert_eq!(s.failed_count, i as i32);
            assert_eq!(s.last_failure_at, now);
        }
    }

    #[tokio::test]
    async fn memory_store_restarts_count_after_window() {
        let store = MemoryAttemptStore::new();
        let p = LockoutPolicy::default();
        store.record_failure("bob", T0, p.window_start(T0)).await.unwrap();
        store.record_failure("bob", T0, p.window_start(T0)).await.unwrap();

        let later = T0 + Duration::seconds(301);
        let s = store
            .record_failure("bob", later, p.window_start(later))
            .await
            .unwrap();
        assert_eq!(s.failed_count, 1);
    }

    #[tokio::test]
    async fn memory_store_restarts_count_exactly_at_window_edge() {
        let store = MemoryAttemptStore::new();
        let p = LockoutPolicy::default();
        for _ in 0..3 {
            store.record_failure("carol", T0, p.window_start(T0)).await.unwrap();
        }
        let edge = T0 + Duration::seconds(300);
        assert_eq!(p.remaining_lockout(store.get("carol").await.unwrap().as_ref(), edge), None);

        let s = store
            .record_failure("carol", edge, p.window_start(edge))
            .await
            .unwrap();
        assert_eq!(s.failed_count, 1);
        assert_eq!(p.remaining_lockout(Some(&s), edge), None);
    }

    #[tokio::test]
    async fn memory_store_purges_records_at_cutoff() {
        let store = MemoryAttemptStore::new();
        let p = LockoutPolicy::default();
        store.record_failure("dave", T0, p.window_start(T0)).await.unwrap();
        let edge = T0 + Duration::seconds(300);
        assert_eq!(store.purge_before(p.window_start(edge)).await.unwrap(), 1);
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn memory_store_clear_and_purge() {
        let store = MemoryAttemptStore::new();
        let p = LockoutPolicy::default();
        store.record_failure("old", T0, p.window_start(T0)).await.unwrap();
        let fresh = T0 + Duration::seconds(400);
        store
            .record_failure("fresh", fresh, p.window_start(fresh))
            .await
            .unwrap();
        store
            .record_failure("gone", fresh, p.window_start(fresh))
            .await
            .unwrap();

        store.clear("gone").await.unwrap();
        assert!(store.get("gone").await.unwrap().is_none());

        let purged = store.purge_before(p.window_start(fresh)).await.unwrap();
        assert_eq!(purged, 1);
        assert!(store.get("old").await.unwrap().is_none());
        assert!(store.get("fresh").await.unwrap().is_some());
        assert_eq!(store.len(), 1);
    }
}
