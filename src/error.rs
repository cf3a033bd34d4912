//! Error types for the authentication engine.
//!
//! Every failure a caller can act on is a dedicated variant; storage and
//! network failures from collaborators are folded into
//! [`AuthError::CollaboratorUnavailable`] so the orchestrator boundary never
//! leaks backend-specific errors.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Common error type for authentication operations.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Wrong email or password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Account is locked until the given time due to repeated failures.
    #[error("account is locked until {0}")]
    AccountLocked(DateTime<Utc>),

    /// Account exists but has been deactivated.
    #[error("account is deactivated")]
    AccountDeactivated,

    /// CAPTCHA verification failed or timed out.
    #[error("CAPTCHA verification failed")]
    CaptchaRejected,

    /// The submitted one-time code did not match any accepted time step.
    #[error("invalid two-factor authentication code")]
    InvalidTwoFactorCode,

    /// Two-factor auth was requested but no secret is stored for the account.
    #[error("two-factor authentication is not configured")]
    SecretNotConfigured,

    /// Session exists but its absolute expiry has passed.
    #[error("session expired")]
    SessionExpired,

    /// No active session matches the principal and token.
    #[error("session not found")]
    SessionNotFound,

    /// Token failed signature or structural validation.
    #[error("invalid token")]
    InvalidToken,

    /// Stored or submitted TOTP secret is not valid Base32.
    #[error("malformed two-factor secret")]
    MalformedSecret,

    /// Registration attempted with an email that is already taken.
    #[error("email is already registered")]
    EmailAlreadyRegistered,

    /// Password rejected by the length policy.
    #[error("password policy violation: {0}")]
    WeakPassword(String),

    /// No account with the given identifier.
    #[error("user not found")]
    UserNotFound,

    /// Configuration error at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// A backing store or external service could not be reached.
    #[error("collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        AuthError::CollaboratorUnavailable(e.to_string())
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_credentials_display() {
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "invalid email or password"
        );
    }

    #[test]
    fn test_account_locked_display() {
        let until = Utc::now();
        let err = AuthError::AccountLocked(until);
        assert!(err.to_string().starts_with("account is locked until"));
    }

    #[test]
    fn test_collaborator_unavailable_from_sqlx() {
        let err: AuthError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, AuthError::CollaboratorUnavailable(_)));
    }

    #[test]
    fn test_session_errors_distinct() {
        assert_ne!(
            AuthError::SessionExpired.to_string(),
            AuthError::SessionNotFound.to_string()
        );
    }

    #[test]
    fn test_result_alias() {
        fn sample() -> Result<u8> {
            Err(AuthError::UserNotFound)
        }
        assert!(sample().is_err());
    }
}
