//! Token minting and server-side session records.
//!
//! A login produces two artifacts with independent lifetimes: a signed
//! bearer token carrying its own expiry, and a session row with an
//! absolute expiry that is never auto-extended. Both must pass for a
//! request to be accepted, so a revoked or expired session kills a token
//! that is otherwise still cryptographically valid.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{JwtConfig, SecurityConfig};
use crate::db::{Database, NewSession, Session, SessionRepository, User};
use crate::{AuthError, Result};

/// Claims carried by an issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Principal's account ID.
    pub sub: i64,
    /// Principal's login identity.
    pub email: String,
    /// Principal's display name.
    pub name: String,
    /// Roles held at issue time.
    pub roles: Vec<String>,
    /// Issuing service.
    pub iss: String,
    /// Intended audience.
    pub aud: String,
    /// Issued-at (Unix seconds).
    pub iat: u64,
    /// Expiry (Unix seconds).
    pub exp: u64,
    /// Unique token ID.
    pub jti: String,
}

/// Mints signed tokens and manages the session rows backing them.
#[derive(Clone)]
pub struct SessionIssuer {
    sessions: SessionRepository,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    token_lifetime: Duration,
    session_timeout: Duration,
}

impl SessionIssuer {
    /// Build an issuer from the signing and session policies.
    pub fn new(db: &Database, jwt: &JwtConfig, security: &SecurityConfig) -> Self {
        Self {
            sessions: SessionRepository::new(db),
            encoding_key: EncodingKey::from_secret(jwt.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt.secret.as_bytes()),
            issuer: jwt.issuer.clone(),
            audience: jwt.audience.clone(),
            token_lifetime: Duration::hours(jwt.expiration_hours),
            session_timeout: Duration::hours(security.session_timeout_hours),
        }
    }

    /// Mint a signed token for a principal.
    pub fn issue_token(&self, user: &User, roles: &[String]) -> Result<String> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user.id,
            email: user.email.clone(),
            name: user.display_name(),
            roles: roles.to_vec(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp() as u64,
            exp: (now + self.token_lifetime).timestamp() as u64,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|_| AuthError::InvalidToken)?;
        debug!(user_id = user.id, "issued token");
        Ok(token)
    }

    /// Decode and verify a token's signature, expiry, issuer, and audience.
    pub fn decode_token(&self, token: &str) -> Result<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::SessionExpired,
                _ => AuthError::InvalidToken,
            })
    }

    /// Open a session row for a freshly issued token.
    pub async fn open_session(
        &self,
        user_id: i64,
        token: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<Session> {
        let now = Utc::now();
        let session = self
            .sessions
            .insert(&NewSession {
                user_id,
                token: token.to_string(),
                ip_address: ip_address.to_string(),
                user_agent: user_agent.to_string(),
                created_at: now,
                expires_at: now + self.session_timeout,
            })
            .await?;
        info!(user_id, session_id = session.id, "session opened");
        Ok(session)
    }

    /// Check that a token still has a live session row behind it.
    ///
    /// A missing or revoked row yields `SessionNotFound`; a row past its
    /// absolute expiry yields `SessionExpired`. On success the session's
    /// activity marker is advanced. The expiry itself never moves.
    pub async fn validate_session(&self, user_id: i64, token: &str) -> Result<Session> {
        let session = self
            .sessions
            .find_active(user_id, token)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if session.is_expired(Utc::now()) {
            return Err(AuthError::SessionExpired);
        }

        self.sessions.touch(session.id).await?;
        Ok(session)
    }

    /// Revoke every session belonging to an account.
    pub async fn revoke_sessions(&self, user_id: i64) -> Result<u64> {
        let revoked = self.sessions.deactivate_for_user(user_id).await?;
        if revoked > 0 {
            info!(user_id, revoked, "sessions revoked");
        }
        Ok(revoked)
    }

    /// The configured session lifetime.
    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{NewUser, UserRepository};

    async fn setup() -> (SessionIssuer, User) {
        let db = Database::open_in_memory().await.unwrap();
        let config = Config::for_tests();
        let issuer = SessionIssuer::new(&db, &config.jwt, &config.security);
        let users = UserRepository::new(&db);
        let user = users
            .create(&NewUser::new("ada@example.test", "hash").with_name("Ada", "Lovelace"))
            .await
            .unwrap();
        (issuer, user)
    }

    #[tokio::test]
    async fn test_issue_and_decode() {
        let (issuer, user) = setup().await;
        let roles = vec!["user".to_string()];

        let token = issuer.issue_token(&user, &roles).unwrap();
        let claims = issuer.decode_token(&token).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "ada@example.test");
        assert_eq!(claims.name, "Ada Lovelace");
        assert_eq!(claims.roles, roles);
        assert!(claims.exp > claims.iat);
        assert!(!claims.jti.is_empty());
    }

    #[tokio::test]
    async fn test_tokens_are_unique() {
        let (issuer, user) = setup().await;
        let a = issuer.issue_token(&user, &[]).unwrap();
        let b = issuer.issue_token(&user, &[]).unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_tampered_token_rejected() {
        let (issuer, user) = setup().await;
        let token = issuer.issue_token(&user, &[]).unwrap();

        let mut tampered = token.clone();
        tampered.pop();
        tampered.push('A');
        assert!(matches!(
            issuer.decode_token(&tampered),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            issuer.decode_token("not-a-token"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (issuer, user) = setup().await;
        let token = issuer.issue_token(&user, &[]).unwrap();

        let session = issuer
            .open_session(user.id, &token, "203.0.113.9", "test-agent")
            .await
            .unwrap();
        assert_eq!(
            session.expires_at,
            session.created_at + issuer.session_timeout()
        );

        let validated = issuer.validate_session(user.id, &token).await.unwrap();
        assert_eq!(validated.id, session.id);

        issuer.revoke_sessions(user.id).await.unwrap();
        assert!(matches!(
            issuer.validate_session(user.id, &token).await,
            Err(AuthError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_session_past_expiry_rejected() {
        let db = Database::open_in_memory().await.unwrap();
        let config = Config::for_tests();
        let issuer = SessionIssuer::new(&db, &config.jwt, &config.security);
        let users = UserRepository::new(&db);
        let user = users
            .create(&NewUser::new("ada@example.test", "hash"))
            .await
            .unwrap();

        // A row that is still active but whose absolute expiry has passed.
        let sessions = SessionRepository::new(&db);
        let opened = Utc::now() - Duration::hours(3);
        sessions
            .insert(&NewSession {
                user_id: user.id,
                token: "stale-token".to_string(),
                ip_address: "203.0.113.9".to_string(),
                user_agent: "test-agent".to_string(),
                created_at: opened,
                expires_at: opened + Duration::hours(2),
            })
            .await
            .unwrap();

        assert!(matches!(
            issuer.validate_session(user.id, "stale-token").await,
            Err(AuthError::SessionExpired)
        ));
    }

    #[tokio::test]
    async fn test_unknown_token_has_no_session() {
        let (issuer, user) = setup().await;
        assert!(matches!(
            issuer.validate_session(user.id, "never-issued").await,
            Err(AuthError::SessionNotFound)
        ));
    }
}
