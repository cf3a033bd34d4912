//! User account model.

use chrono::{DateTime, Utc};

/// A registered account.
///
/// The two-factor fields hold the invariant that `two_factor_enabled` is
/// true only when a secret is stored and at least one valid code was
/// presented at enable time.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Login identity (unique, case-insensitive).
    pub email: String,
    /// Argon2id password hash.
    pub password_hash: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Whether the account may log in.
    pub is_active: bool,
    /// Whether a valid code must be presented after the password.
    pub two_factor_enabled: bool,
    /// Base32 TOTP secret; present iff 2FA was ever set up.
    pub two_factor_secret: Option<String>,
    /// Account creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last successful login.
    pub last_login_at: Option<DateTime<Utc>>,
    /// Source address of the last successful login.
    pub last_login_ip: Option<String>,
    /// Account-level activity marker, advanced on explicit extend calls.
    pub last_activity_at: Option<DateTime<Utc>>,
}

impl User {
    /// Full display name.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Data for creating a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Login identity.
    pub email: String,
    /// Pre-hashed password (Argon2id PHC string).
    pub password_hash: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
}

impl NewUser {
    /// Create a new-user record with minimal required fields.
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password_hash: password_hash.into(),
            first_name: String::new(),
            last_name: String::new(),
        }
    }

    /// Set the display name parts.
    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = first.into();
        self.last_name = last.into();
        self
    }
}
