//! Authentication engine: login orchestration, brute-force lockout,
//! TOTP two-factor auth, and signed-session issuance.

pub mod audit;
pub mod captcha;
pub mod issuer;
pub mod lockout;
pub mod orchestrator;
pub mod password;
pub mod totp;

pub use audit::{AuditEvent, AuditSink, NullAuditSink, RecordingAuditSink};
pub use captcha::{CaptchaVerifier, HttpCaptchaVerifier, StaticCaptchaVerifier};
pub use issuer::{SessionIssuer, TokenClaims};
pub use lockout::{AttemptMeta, AttemptTracker, LockoutState};
pub use orchestrator::{
    Authenticator, CredentialVerifier, LoginOutcome, LoginRequest, RegisterRequest,
    TwoFactorSetup, UserProfile,
};
pub use password::PasswordError;
pub use totp::TotpError;
