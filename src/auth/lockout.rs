//! Brute-force lockout tracking.
//!
//! Lockout state is derived from the attempt log on every query rather
//! than stored, so there is no unlock bookkeeping. An identity is locked
//! while its failure count inside the rolling window has reached the
//! configured maximum and the window anchored at the newest failure has
//! not yet elapsed.

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::config::SecurityConfig;
use crate::db::{AttemptRepository, Database, LoginAttempt, NewLoginAttempt};
use crate::Result;

/// Derived lockout state for one login identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutState {
    /// Whether logins are currently refused.
    pub is_locked: bool,
    /// When the lock lifts, if locked.
    pub lockout_ends_at: Option<DateTime<Utc>>,
    /// Failed attempts inside the rolling window.
    pub recent_failure_count: usize,
}

impl LockoutState {
    fn clear(recent_failure_count: usize) -> Self {
        Self {
            is_locked: false,
            lockout_ends_at: None,
            recent_failure_count,
        }
    }
}

/// Client details attached to recorded attempts.
#[derive(Debug, Clone, Default)]
pub struct AttemptMeta {
    /// Account ID when the identity resolved to a known account.
    pub user_id: Option<i64>,
    /// Source address.
    pub ip_address: String,
    /// Client agent string.
    pub user_agent: String,
}

/// Tracks login attempts and answers lockout queries.
#[derive(Debug, Clone)]
pub struct AttemptTracker {
    attempts: AttemptRepository,
    max_attempts: u32,
    window: Duration,
}

impl AttemptTracker {
    /// Build a tracker from the security policy.
    pub fn new(db: &Database, security: &SecurityConfig) -> Self {
        Self {
            attempts: AttemptRepository::new(db),
            max_attempts: security.max_login_attempts,
            window: Duration::minutes(security.lockout_window_minutes),
        }
    }

    /// Record a successful login and wipe the identity's failure history.
    ///
    /// The wipe is best-effort: the success row is the authoritative
    /// record, and a failed cleanup must not fail the login.
    pub async fn record_success(&self, email: &str, meta: &AttemptMeta) -> Result<()> {
        self.attempts
            .insert(
                &NewLoginAttempt::success(email, meta.user_id)
                    .from_client(&meta.ip_address, &meta.user_agent),
            )
            .await?;

        if let Err(err) = self.attempts.clear_failures(email).await {
            warn!(email, error = %err, "failed to clear login failures after success");
        }
        Ok(())
    }

    /// Record a failed login.
    pub async fn record_failure(&self, email: &str, reason: &str, meta: &AttemptMeta) -> Result<()> {
        let mut attempt =
            NewLoginAttempt::failure(email, reason).from_client(&meta.ip_address, &meta.user_agent);
        attempt.user_id = meta.user_id;
        self.attempts.insert(&attempt).await
    }

    /// Failed attempts inside the rolling window, newest first.
    pub async fn recent_failures(&self, email: &str) -> Result<Vec<LoginAttempt>> {
        let since = Utc::now() - self.window;
        self.attempts.failures_since(email, since).await
    }

    /// Derive the current lockout state for an identity.
    ///
    /// Rows that have fallen out of the window can no longer influence any
    /// decision and are garbage-collected here, best-effort.
    pub async fn lockout_state(&self, email: &str) -> Result<LockoutState> {
        let now = Utc::now();
        let cutoff = now - self.window;

        if let Err(err) = self.attempts.purge_stale_failures(email, cutoff).await {
            warn!(email, error = %err, "failed to purge out-of-window login failures");
        }

        let failures = self.attempts.failures_since(email, cutoff).await?;

        if failures.len() < self.max_attempts as usize {
            return Ok(LockoutState::clear(failures.len()));
        }

        // failures_since returns newest first.
        let newest = failures[0].occurred_at;
        let ends_at = newest + self.window;
        if ends_at <= now {
            // The lock has already lapsed; drop the stale rows so the
            // identity starts from a clean slate.
            if let Err(err) = self.attempts.purge_stale_failures(email, newest).await {
                warn!(email, error = %err, "failed to purge stale login failures");
            }
            return Ok(LockoutState::clear(failures.len()));
        }

        Ok(LockoutState {
            is_locked: true,
            lockout_ends_at: Some(ends_at),
            recent_failure_count: failures.len(),
        })
    }
}
