//! Server-side session store.
//!
//! Sessions track a bearer token's validity independently of the token's
//! own embedded expiry; both must pass for a request to be accepted.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::db::Database;
use crate::Result;

/// A persisted session row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    /// Unique session ID.
    pub id: i64,
    /// Owning account.
    pub user_id: i64,
    /// The issued signed token.
    pub token: String,
    /// Source address at login.
    pub ip_address: String,
    /// Client agent at login.
    pub user_agent: String,
    /// When the session was opened.
    pub created_at: DateTime<Utc>,
    /// Absolute expiry; never auto-extended.
    pub expires_at: DateTime<Utc>,
    /// Advanced on explicit validate/extend calls only.
    pub last_activity_at: DateTime<Utc>,
    /// Cleared on revocation.
    pub is_active: bool,
}

impl Session {
    /// Whether the absolute expiry has passed. A session past expiry is
    /// dead regardless of `is_active`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Data for opening a session.
#[derive(Debug, Clone)]
pub struct NewSession {
    /// Owning account.
    pub user_id: i64,
    /// The issued signed token.
    pub token: String,
    /// Source address.
    pub ip_address: String,
    /// Client agent.
    pub user_agent: String,
    /// Open timestamp.
    pub created_at: DateTime<Utc>,
    /// Absolute expiry.
    pub expires_at: DateTime<Utc>,
}

/// Repository for session rows.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    /// Create a repository bound to the given database.
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Persist a session row.
    pub async fn insert(&self, session: &NewSession) -> Result<Session> {
        let result = sqlx::query(
            "INSERT INTO sessions
                (user_id, token, ip_address, user_agent, created_at, expires_at, last_activity_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(session.user_id)
        .bind(&session.token)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        let row = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    /// Find the active session row matching principal and token.
    pub async fn find_active(&self, user_id: i64, token: &str) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE user_id = ? AND token = ? AND is_active = 1",
        )
        .bind(user_id)
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    /// Advance a session's activity marker. Expiry is untouched.
    pub async fn touch(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE sessions SET last_activity_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Deactivate every session belonging to an account.
    pub async fn deactivate_for_user(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query("UPDATE sessions SET is_active = 0 WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Count active session rows for an account.
    pub async fn count_active_for_user(&self, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sessions WHERE user_id = ? AND is_active = 1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewUser;
    use crate::db::UserRepository;
    use chrono::Duration;

    async fn setup() -> (SessionRepository, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let users = UserRepository::new(&db);
        let user = users
            .create(&NewUser::new("a@example.test", "hash"))
            .await
            .unwrap();
        (SessionRepository::new(&db), user.id)
    }

    fn new_session(user_id: i64, token: &str) -> NewSession {
        let now = Utc::now();
        NewSession {
            user_id,
            token: token.to_string(),
            ip_address: "198.51.100.7".to_string(),
            user_agent: "test-agent".to_string(),
            created_at: now,
            expires_at: now + Duration::hours(2),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let (repo, user_id) = setup().await;
        let session = repo.insert(&new_session(user_id, "tok-1")).await.unwrap();

        assert!(session.is_active);
        assert_eq!(session.last_activity_at, session.created_at);

        let found = repo.find_active(user_id, "tok-1").await.unwrap();
        assert_eq!(found.unwrap().id, session.id);

        assert!(repo.find_active(user_id, "tok-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expiry_window() {
        let (repo, user_id) = setup().await;
        let session = repo.insert(&new_session(user_id, "tok-1")).await.unwrap();

        assert_eq!(session.expires_at, session.created_at + Duration::hours(2));
        assert!(!session.is_expired(Utc::now()));
        assert!(session.is_expired(Utc::now() + Duration::hours(3)));
    }

    #[tokio::test]
    async fn test_touch_advances_activity_only() {
        let (repo, user_id) = setup().await;
        let session = repo.insert(&new_session(user_id, "tok-1")).await.unwrap();

        repo.touch(session.id).await.unwrap();
        let touched = repo.find_active(user_id, "tok-1").await.unwrap().unwrap();
        assert!(touched.last_activity_at >= session.last_activity_at);
        assert_eq!(touched.expires_at, session.expires_at);
    }

    #[tokio::test]
    async fn test_deactivate_for_user() {
        let (repo, user_id) = setup().await;
        repo.insert(&new_session(user_id, "tok-1")).await.unwrap();
        repo.insert(&new_session(user_id, "tok-2")).await.unwrap();

        assert_eq!(repo.count_active_for_user(user_id).await.unwrap(), 2);
        assert_eq!(repo.deactivate_for_user(user_id).await.unwrap(), 2);
        assert_eq!(repo.count_active_for_user(user_id).await.unwrap(), 0);
        assert!(repo.find_active(user_id, "tok-1").await.unwrap().is_none());
    }
}
