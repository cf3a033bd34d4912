//! Login attempt log.
//!
//! Attempt rows are immutable once written; they are only ever deleted by
//! the tracker's purge policies. Lockout state is always derived from this
//! log, never stored.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::db::Database;
use crate::Result;

/// One recorded login attempt, success or failure.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LoginAttempt {
    /// Unique attempt ID.
    pub id: i64,
    /// Account ID when the identity resolved to a known account.
    pub user_id: Option<i64>,
    /// Login identity the attempt was made against.
    pub email: String,
    /// Whether the attempt succeeded.
    pub succeeded: bool,
    /// Failure reason for failed attempts.
    pub failure_reason: Option<String>,
    /// Source address.
    pub ip_address: String,
    /// Client agent string.
    pub user_agent: String,
    /// When the attempt happened.
    pub occurred_at: DateTime<Utc>,
}

/// Data for appending an attempt row.
#[derive(Debug, Clone)]
pub struct NewLoginAttempt {
    /// Account ID, if known.
    pub user_id: Option<i64>,
    /// Login identity.
    pub email: String,
    /// Whether the attempt succeeded.
    pub succeeded: bool,
    /// Failure reason for failed attempts.
    pub failure_reason: Option<String>,
    /// Source address.
    pub ip_address: String,
    /// Client agent string.
    pub user_agent: String,
    /// Attempt timestamp.
    pub occurred_at: DateTime<Utc>,
}

impl NewLoginAttempt {
    /// Build a successful attempt record timestamped now.
    pub fn success(email: impl Into<String>, user_id: Option<i64>) -> Self {
        Self {
            user_id,
            email: email.into(),
            succeeded: true,
            failure_reason: None,
            ip_address: String::new(),
            user_agent: String::new(),
            occurred_at: Utc::now(),
        }
    }

    /// Build a failed attempt record timestamped now.
    pub fn failure(email: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            user_id: None,
            email: email.into(),
            succeeded: false,
            failure_reason: Some(reason.into()),
            ip_address: String::new(),
            user_agent: String::new(),
            occurred_at: Utc::now(),
        }
    }

    /// Set the source address and client agent.
    pub fn from_client(mut self, ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        self.ip_address = ip_address.into();
        self.user_agent = user_agent.into();
        self
    }

    /// Override the attempt timestamp.
    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }
}

/// Repository for the attempt log.
#[derive(Debug, Clone)]
pub struct AttemptRepository {
    pool: SqlitePool,
}

impl AttemptRepository {
    /// Create a repository bound to the given database.
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Append an attempt row.
    pub async fn insert(&self, attempt: &NewLoginAttempt) -> Result<()> {
        sqlx::query(
            "INSERT INTO login_attempts
                (user_id, email, succeeded, failure_reason, ip_address, user_agent, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(attempt.user_id)
        .bind(&attempt.email)
        .bind(attempt.succeeded)
        .bind(&attempt.failure_reason)
        .bind(&attempt.ip_address)
        .bind(&attempt.user_agent)
        .bind(attempt.occurred_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Failed attempts for an identity newer than `since`, newest first.
    pub async fn failures_since(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LoginAttempt>> {
        let attempts = sqlx::query_as::<_, LoginAttempt>(
            "SELECT * FROM login_attempts
             WHERE email = ? AND succeeded = 0 AND occurred_at > ?
             ORDER BY occurred_at DESC",
        )
        .bind(email)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }

    /// Delete every failed attempt for an identity, regardless of age.
    pub async fn clear_failures(&self, email: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE email = ? AND succeeded = 0")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete failed attempts for an identity at or before `cutoff`.
    pub async fn purge_stale_failures(&self, email: &str, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM login_attempts
             WHERE email = ? AND succeeded = 0 AND occurred_at <= ?",
        )
        .bind(email)
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Total attempt rows for an identity (successes included).
    pub async fn count_for(&self, email: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM login_attempts WHERE email = ?")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn repo() -> AttemptRepository {
        let db = Database::open_in_memory().await.unwrap();
        AttemptRepository::new(&db)
    }

    #[tokio::test]
    async fn test_insert_and_query_failures() {
        let repo = repo().await;
        let since = Utc::now() - Duration::minutes(5);

        repo.insert(&NewLoginAttempt::failure("a@example.test", "invalid credentials"))
            .await
            .unwrap();
        repo.insert(&NewLoginAttempt::success("a@example.test", Some(1)))
            .await
            .unwrap();

        let failures = repo.failures_since("a@example.test", since).await.unwrap();
        assert_eq!(failures.len(), 1);
        assert!(!failures[0].succeeded);
        assert_eq!(
            failures[0].failure_reason.as_deref(),
            Some("invalid credentials")
        );
    }

    #[tokio::test]
    async fn test_failures_ordered_newest_first() {
        let repo = repo().await;
        let now = Utc::now();

        repo.insert(&NewLoginAttempt::failure("a@example.test", "one").at(now - Duration::minutes(2)))
            .await
            .unwrap();
        repo.insert(&NewLoginAttempt::failure("a@example.test", "two").at(now - Duration::minutes(1)))
            .await
            .unwrap();

        let failures = repo
            .failures_since("a@example.test", now - Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].failure_reason.as_deref(), Some("two"));
        assert!(failures[0].occurred_at > failures[1].occurred_at);
    }

    #[tokio::test]
    async fn test_window_excludes_old_failures() {
        let repo = repo().await;
        let now = Utc::now();

        repo.insert(&NewLoginAttempt::failure("a@example.test", "old").at(now - Duration::minutes(10)))
            .await
            .unwrap();
        repo.insert(&NewLoginAttempt::failure("a@example.test", "recent"))
            .await
            .unwrap();

        let failures = repo
            .failures_since("a@example.test", now - Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].failure_reason.as_deref(), Some("recent"));
    }

    #[tokio::test]
    async fn test_clear_failures_keeps_successes() {
        let repo = repo().await;

        repo.insert(&NewLoginAttempt::failure("a@example.test", "x"))
            .await
            .unwrap();
        repo.insert(&NewLoginAttempt::failure("a@example.test", "y"))
            .await
            .unwrap();
        repo.insert(&NewLoginAttempt::success("a@example.test", Some(1)))
            .await
            .unwrap();

        let cleared = repo.clear_failures("a@example.test").await.unwrap();
        assert_eq!(cleared, 2);
        assert_eq!(repo.count_for("a@example.test").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear_failures_scoped_to_identity() {
        let repo = repo().await;

        repo.insert(&NewLoginAttempt::failure("a@example.test", "x"))
            .await
            .unwrap();
        repo.insert(&NewLoginAttempt::failure("b@example.test", "x"))
            .await
            .unwrap();

        repo.clear_failures("a@example.test").await.unwrap();
        assert_eq!(repo.count_for("a@example.test").await.unwrap(), 0);
        assert_eq!(repo.count_for("b@example.test").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_stale_failures() {
        let repo = repo().await;
        let now = Utc::now();

        repo.insert(&NewLoginAttempt::failure("a@example.test", "old").at(now - Duration::minutes(10)))
            .await
            .unwrap();
        repo.insert(&NewLoginAttempt::failure("a@example.test", "recent"))
            .await
            .unwrap();

        let purged = repo
            .purge_stale_failures("a@example.test", now - Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert_eq!(repo.count_for("a@example.test").await.unwrap(), 1);
    }
}
