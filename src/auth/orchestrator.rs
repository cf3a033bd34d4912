//! Login orchestration.
//!
//! `Authenticator` drives the full protocol: lockout gate, CAPTCHA gate,
//! credential check, account-state check, two-factor gate, then token and
//! session issuance. Collaborators sit behind traits so the protocol can
//! be exercised with deterministic fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::audit::{AuditEvent, AuditSink};
use crate::auth::captcha::CaptchaVerifier;
use crate::auth::issuer::SessionIssuer;
use crate::auth::lockout::{AttemptMeta, AttemptTracker, LockoutState};
use crate::auth::{password, totp};
use crate::config::{Config, SecurityConfig};
use crate::db::{Database, NewUser, Session, User, UserRepository};
use crate::{AuthError, Result};

/// A login submission.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    /// Login identity.
    pub email: String,
    /// Plaintext password.
    pub password: String,
    /// CAPTCHA token, when the client solved one.
    pub captcha_token: Option<String>,
}

/// A registration submission.
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    /// Login identity.
    pub email: String,
    /// Plaintext password.
    pub password: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// CAPTCHA token; always required for registration.
    pub captcha_token: String,
}

/// Public view of an account.
#[derive(Debug, Clone)]
pub struct UserProfile {
    /// Account ID.
    pub id: i64,
    /// Login identity.
    pub email: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Roles held.
    pub roles: Vec<String>,
    /// Whether two-factor auth is enabled.
    pub two_factor_enabled: bool,
    /// Last successful login.
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    fn from_user(user: &User, roles: Vec<String>) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            roles,
            two_factor_enabled: user.two_factor_enabled,
            last_login_at: user.last_login_at,
        }
    }
}

/// Terminal result of a successful credential check.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// Fully authenticated; a token was issued and a session opened.
    Authenticated {
        /// The signed bearer token.
        token: String,
        /// Profile of the authenticated account.
        profile: UserProfile,
    },
    /// Password accepted but a two-factor code must be submitted next.
    /// No token was issued and no session opened.
    RequiresTwoFactor {
        /// Account to submit the code for.
        user_id: i64,
    },
}

/// Result of a two-factor enrollment call.
#[derive(Debug, Clone)]
pub struct TwoFactorSetup {
    /// The freshly generated Base32 secret.
    pub secret: String,
    /// Provisioning URI for authenticator apps.
    pub otpauth_uri: String,
}

/// Credential lookup and verification.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Resolve a login identity to an account, if one exists.
    async fn find_by_identity(&self, email: &str) -> Result<Option<User>>;

    /// Check a plaintext password against the account's stored hash.
    async fn verify(&self, user: &User, password: &str) -> Result<bool>;
}

#[async_trait]
impl CredentialVerifier for UserRepository {
    async fn find_by_identity(&self, email: &str) -> Result<Option<User>> {
        self.get_by_email(email).await
    }

    async fn verify(&self, user: &User, password: &str) -> Result<bool> {
        match password::verify_password(password, &user.password_hash) {
            Ok(()) => Ok(true),
            Err(password::PasswordError::VerificationFailed) => Ok(false),
            Err(err) => {
                warn!(user_id = user.id, error = %err, "stored password hash unusable");
                Ok(false)
            }
        }
    }
}

/// The login protocol state machine.
pub struct Authenticator {
    users: UserRepository,
    verifier: Arc<dyn CredentialVerifier>,
    tracker: AttemptTracker,
    issuer: SessionIssuer,
    captcha: Arc<dyn CaptchaVerifier>,
    audit: Arc<dyn AuditSink>,
    security: SecurityConfig,
}

impl Authenticator {
    /// Assemble the engine over a database with the given collaborators.
    pub fn new(
        db: &Database,
        config: &Config,
        captcha: Arc<dyn CaptchaVerifier>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let users = UserRepository::new(db);
        Self {
            verifier: Arc::new(users.clone()),
            tracker: AttemptTracker::new(db, &config.security),
            issuer: SessionIssuer::new(db, &config.jwt, &config.security),
            captcha,
            audit,
            security: config.security.clone(),
            users,
        }
    }

    /// Swap in a different credential verifier.
    pub fn with_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Run the login protocol for a submission.
    ///
    /// Gate order is fixed: lockout, CAPTCHA, credentials, account state.
    /// A locked identity never reaches the credential verifier, so the
    /// response cannot leak password validity for locked accounts.
    pub async fn login(
        &self,
        request: &LoginRequest,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<LoginOutcome> {
        let email = &request.email;
        let meta = AttemptMeta {
            user_id: None,
            ip_address: ip_address.to_string(),
            user_agent: user_agent.to_string(),
        };

        let state = self.tracker.lockout_state(email).await?;
        if state.is_locked {
            if let Some(until) = state.lockout_ends_at {
                info!(%email, %until, "login refused: identity locked out");
                return Err(AuthError::AccountLocked(until));
            }
        }

        // CAPTCHA is only checked once the identity has drawn attention
        // and the client actually submitted a token.
        let captcha_token = request
            .captcha_token
            .as_deref()
            .filter(|token| !token.is_empty());
        if state.recent_failure_count >= self.security.captcha_failure_threshold as usize {
            if let Some(token) = captcha_token {
                if !self.captcha.verify(token).await? {
                    self.tracker.record_failure(email, "captcha", &meta).await?;
                    self.emit(
                        AuditEvent::on_user("login_failed", None)
                            .from_client(ip_address, user_agent)
                            .describe(format!("captcha rejected for {email}")),
                    )
                    .await;
                    return Err(AuthError::CaptchaRejected);
                }
            }
        }

        let user = match self.verifier.find_by_identity(email).await? {
            Some(user) => user,
            None => {
                self.tracker
                    .record_failure(email, "invalid credentials", &meta)
                    .await?;
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !self.verifier.verify(&user, &request.password).await? {
            let meta = AttemptMeta {
                user_id: Some(user.id),
                ..meta
            };
            self.tracker
                .record_failure(email, "invalid credentials", &meta)
                .await?;
            self.emit(
                AuditEvent::on_user("login_failed", Some(user.id))
                    .from_client(ip_address, user_agent)
                    .describe("wrong password"),
            )
            .await;
            return Err(AuthError::InvalidCredentials);
        }

        // Account-state rejection is not a brute-force signal; the
        // password was correct, so nothing is recorded against lockout.
        if !user.is_active {
            info!(user_id = user.id, "login refused: account deactivated");
            return Err(AuthError::AccountDeactivated);
        }

        let meta = AttemptMeta {
            user_id: Some(user.id),
            ..meta
        };
        self.tracker.record_success(email, &meta).await?;
        self.users.record_login(user.id, ip_address).await?;

        if user.two_factor_enabled {
            info!(user_id = user.id, "password accepted, awaiting two-factor code");
            return Ok(LoginOutcome::RequiresTwoFactor { user_id: user.id });
        }

        self.finish_login(&user, ip_address, user_agent, "login").await
    }

    /// Complete a two-factor login with a submitted code.
    pub async fn verify_two_factor(
        &self,
        user_id: i64,
        code: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<LoginOutcome> {
        let user = self.require_user(user_id).await?;
        let secret = user
            .two_factor_secret
            .as_deref()
            .ok_or(AuthError::SecretNotConfigured)?;
        totp::decode_secret(secret).map_err(|_| AuthError::MalformedSecret)?;

        if !totp::validate_code(secret, code) {
            self.emit(
                AuditEvent::on_user("login_failed", Some(user_id))
                    .from_client(ip_address, user_agent)
                    .describe("invalid two-factor code"),
            )
            .await;
            return Err(AuthError::InvalidTwoFactorCode);
        }

        self.finish_login(&user, ip_address, user_agent, "login_2fa")
            .await
    }

    /// Register a new account and immediately authenticate it.
    ///
    /// Registration always requires a CAPTCHA; there are no grace
    /// attempts. A fresh account cannot have two-factor enabled yet, so
    /// there is no 2FA gate here.
    pub async fn register(
        &self,
        request: &RegisterRequest,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<LoginOutcome> {
        if !self.captcha.verify(&request.captcha_token).await? {
            return Err(AuthError::CaptchaRejected);
        }

        password::validate_password(&request.password)
            .map_err(|e| AuthError::WeakPassword(e.to_string()))?;

        if self.users.email_exists(&request.email).await? {
            return Err(AuthError::EmailAlreadyRegistered);
        }

        let hash = password::hash_password(&request.password)
            .map_err(|e| AuthError::CollaboratorUnavailable(e.to_string()))?;
        let user = self
            .users
            .create(
                &NewUser::new(&request.email, hash)
                    .with_name(&request.first_name, &request.last_name),
            )
            .await?;
        self.users
            .assign_role(user.id, &self.security.default_role)
            .await?;
        self.users.record_login(user.id, ip_address).await?;

        info!(user_id = user.id, email = %user.email, "account registered");
        self.finish_login(&user, ip_address, user_agent, "register")
            .await
    }

    /// Profile for an authenticated account, advancing its activity marker.
    pub async fn get_current_user(&self, user_id: i64) -> Result<UserProfile> {
        let user = self.require_user(user_id).await?;
        self.users.touch_activity(user_id).await?;
        let roles = self.users.roles_of(user_id).await?;
        Ok(UserProfile::from_user(&user, roles))
    }

    /// Keep an account's idle-timeout marker alive. Session expiry is
    /// absolute and does not move.
    pub async fn extend_session(&self, user_id: i64) -> Result<()> {
        self.require_user(user_id).await?;
        self.users.touch_activity(user_id).await
    }

    /// Check that a bearer token is still backed by a live session.
    pub async fn validate_session(&self, user_id: i64, token: &str) -> Result<Session> {
        self.issuer.validate_session(user_id, token).await
    }

    /// Revoke every session for an account.
    pub async fn logout(&self, user_id: i64, ip_address: &str, user_agent: &str) -> Result<u64> {
        let revoked = self.issuer.revoke_sessions(user_id).await?;
        self.emit(
            AuditEvent::on_user("logout", Some(user_id)).from_client(ip_address, user_agent),
        )
        .await;
        Ok(revoked)
    }

    /// Begin two-factor enrollment: generate and store a fresh secret.
    ///
    /// The enabled flag stays off until a valid code confirms the
    /// authenticator app holds the secret. Re-running replaces the secret.
    pub async fn setup_two_factor(&self, user_id: i64) -> Result<TwoFactorSetup> {
        let user = self.require_user(user_id).await?;
        let secret = totp::generate_secret();
        self.users.set_two_factor_secret(user_id, &secret).await?;

        let otpauth_uri =
            totp::provisioning_uri(&secret, &user.email, &self.security.totp_issuer);
        self.emit(AuditEvent::on_user("2fa_setup", Some(user_id))).await;
        Ok(TwoFactorSetup { secret, otpauth_uri })
    }

    /// Turn two-factor auth on after a valid code proves enrollment.
    pub async fn enable_two_factor(&self, user_id: i64, code: &str) -> Result<()> {
        let user = self.require_user(user_id).await?;
        let secret = user
            .two_factor_secret
            .as_deref()
            .ok_or(AuthError::SecretNotConfigured)?;
        totp::decode_secret(secret).map_err(|_| AuthError::MalformedSecret)?;

        if !totp::validate_code(secret, code) {
            return Err(AuthError::InvalidTwoFactorCode);
        }

        self.users.set_two_factor_enabled(user_id, true).await?;
        info!(user_id, "two-factor auth enabled");
        self.emit(AuditEvent::on_user("2fa_enabled", Some(user_id))).await;
        Ok(())
    }

    /// Turn two-factor auth off; requires a valid code and clears the
    /// stored secret.
    pub async fn disable_two_factor(&self, user_id: i64, code: &str) -> Result<()> {
        let user = self.require_user(user_id).await?;
        if !user.two_factor_enabled {
            return Err(AuthError::SecretNotConfigured);
        }
        let secret = user
            .two_factor_secret
            .as_deref()
            .ok_or(AuthError::SecretNotConfigured)?;

        if !totp::validate_code(secret, code) {
            return Err(AuthError::InvalidTwoFactorCode);
        }

        self.users.clear_two_factor(user_id).await?;
        info!(user_id, "two-factor auth disabled");
        self.emit(AuditEvent::on_user("2fa_disabled", Some(user_id))).await;
        Ok(())
    }

    /// Current lockout state for a login identity.
    pub async fn lockout_info(&self, email: &str) -> Result<LockoutState> {
        self.tracker.lockout_state(email).await
    }

    async fn require_user(&self, user_id: i64) -> Result<User> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn finish_login(
        &self,
        user: &User,
        ip_address: &str,
        user_agent: &str,
        action: &str,
    ) -> Result<LoginOutcome> {
        let roles = self.users.roles_of(user.id).await?;
        let token = self.issuer.issue_token(user, &roles)?;
        self.issuer
            .open_session(user.id, &token, ip_address, user_agent)
            .await?;

        info!(user_id = user.id, email = %user.email, "login complete");
        self.emit(
            AuditEvent::on_user(action, Some(user.id)).from_client(ip_address, user_agent),
        )
        .await;

        Ok(LoginOutcome::Authenticated {
            token,
            profile: UserProfile::from_user(user, roles),
        })
    }

    /// Audit emission never fails the operation that triggered it.
    async fn emit(&self, event: AuditEvent) {
        if let Err(err) = self.audit.record(event).await {
            warn!(error = %err, "audit sink rejected event");
        }
    }
}
