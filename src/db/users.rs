//! User repository.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::{Database, NewUser, User};
use crate::Result;

/// Repository for account records, including the two-factor secret fields
/// and role assignments.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a repository bound to the given database.
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Create a new account.
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        let result = sqlx::query(
            "INSERT INTO users (email, password_hash, first_name, last_name, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        let user = self.get_by_id(id).await?;
        user.ok_or(crate::AuthError::UserNotFound)
    }

    /// Get an account by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Get an account by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Check whether an email is already registered.
    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Record a successful login: last-login time, source address, and
    /// activity marker.
    pub async fn record_login(&self, id: i64, ip_address: &str) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE users SET last_login_at = ?, last_login_ip = ?, last_activity_at = ?
             WHERE id = ?",
        )
        .bind(now)
        .bind(ip_address)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Advance the account-level activity marker.
    pub async fn touch_activity(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET last_activity_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Store a freshly generated two-factor secret. Leaves the enabled flag
    /// untouched so re-enrollment replaces the secret without disabling an
    /// already-enabled account mid-setup.
    pub async fn set_two_factor_secret(&self, id: i64, secret: &str) -> Result<()> {
        sqlx::query("UPDATE users SET two_factor_secret = ? WHERE id = ?")
            .bind(secret)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Flip the two-factor enabled flag. The secret must already be stored.
    pub async fn set_two_factor_enabled(&self, id: i64, enabled: bool) -> Result<()> {
        sqlx::query("UPDATE users SET two_factor_enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Disable two-factor auth and discard the secret.
    pub async fn clear_two_factor(&self, id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE users SET two_factor_enabled = 0, two_factor_secret = NULL WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Activate or deactivate an account.
    pub async fn set_active(&self, id: i64, active: bool) -> Result<()> {
        sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Assign a role to an account. Assigning an already-held role is a
    /// no-op.
    pub async fn assign_role(&self, id: i64, role: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?, ?)")
            .bind(id)
            .bind(role)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// List the roles held by an account.
    pub async fn roles_of(&self, id: i64) -> Result<Vec<String>> {
        let roles: Vec<String> =
            sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = ? ORDER BY role")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;
        Ok(roles)
    }
}
