//! Configuration for the authentication engine.
//!
//! All thresholds, timeouts, and the token signing key live here and are
//! read once at startup. Components receive the relevant section at
//! construction time, so tests can instantiate the engine with different
//! thresholds.

use serde::Deserialize;
use std::path::Path;

use crate::{AuthError, Result};

/// Brute-force defense and session policy.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Failed attempts within the window before an identity is locked out.
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: u32,
    /// Sliding window (and lockout duration) in minutes.
    #[serde(default = "default_lockout_window_minutes")]
    pub lockout_window_minutes: i64,
    /// Server-side session lifetime in hours, independent of token expiry.
    #[serde(default = "default_session_timeout_hours")]
    pub session_timeout_hours: i64,
    /// Recent-failure count at which a CAPTCHA token is checked on login.
    #[serde(default = "default_captcha_failure_threshold")]
    pub captcha_failure_threshold: u32,
    /// Role assigned to newly registered accounts.
    #[serde(default = "default_role")]
    pub default_role: String,
    /// Issuer label embedded in otpauth provisioning URIs.
    #[serde(default = "default_totp_issuer")]
    pub totp_issuer: String,
}

fn default_max_login_attempts() -> u32 {
    3
}

fn default_lockout_window_minutes() -> i64 {
    5
}

fn default_session_timeout_hours() -> i64 {
    2
}

fn default_captcha_failure_threshold() -> u32 {
    2
}

fn default_role() -> String {
    "user".to_string()
}

fn default_totp_issuer() -> String {
    "Gatehouse".to_string()
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_login_attempts: default_max_login_attempts(),
            lockout_window_minutes: default_lockout_window_minutes(),
            session_timeout_hours: default_session_timeout_hours(),
            captcha_failure_threshold: default_captcha_failure_threshold(),
            default_role: default_role(),
            totp_issuer: default_totp_issuer(),
        }
    }
}

/// Token signing configuration.
///
/// The secret is supplied out of band (config file or environment), never
/// hard-coded. Signing uses HS256.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// Symmetric signing key.
    #[serde(default)]
    pub secret: String,
    /// `iss` claim.
    #[serde(default = "default_jwt_issuer")]
    pub issuer: String,
    /// `aud` claim.
    #[serde(default = "default_jwt_audience")]
    pub audience: String,
    /// Token lifetime in hours.
    #[serde(default = "default_jwt_expiration_hours")]
    pub expiration_hours: i64,
}

fn default_jwt_issuer() -> String {
    "gatehouse".to_string()
}

fn default_jwt_audience() -> String {
    "gatehouse-admin".to_string()
}

fn default_jwt_expiration_hours() -> i64 {
    24
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: default_jwt_issuer(),
            audience: default_jwt_audience(),
            expiration_hours: default_jwt_expiration_hours(),
        }
    }
}

/// CAPTCHA verification endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptchaConfig {
    /// Verification endpoint URL.
    #[serde(default = "default_captcha_verify_url")]
    pub verify_url: String,
    /// Server-side secret key for the CAPTCHA provider.
    #[serde(default)]
    pub secret_key: String,
    /// Bound on the verification network call, in seconds.
    #[serde(default = "default_captcha_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_captcha_verify_url() -> String {
    "https://www.google.com/recaptcha/api/siteverify".to_string()
}

fn default_captcha_timeout_secs() -> u64 {
    5
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            verify_url: default_captcha_verify_url(),
            secret_key: String::new(),
            timeout_secs: default_captcha_timeout_secs(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/gatehouse.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace / debug / info / warn / error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file path; console-only when absent.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Security thresholds.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Token signing.
    #[serde(default)]
    pub jwt: JwtConfig,
    /// CAPTCHA endpoint.
    #[serde(default)]
    pub captcha: CaptchaConfig,
    /// Database location.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AuthError::Config(format!("cannot read config file: {e}")))?;
        Self::parse(&text)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| AuthError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration with defaults and a fixed signing key, for tests.
    pub fn for_tests() -> Self {
        Self {
            jwt: JwtConfig {
                secret: "unit-test-signing-key".to_string(),
                ..JwtConfig::default()
            },
            ..Self::default()
        }
    }

    /// Reject configurations that cannot produce verifiable tokens.
    fn validate(&self) -> Result<()> {
        if self.jwt.secret.is_empty() {
            return Err(AuthError::Config(
                "jwt.secret must be set; tokens cannot be signed without a key".to_string(),
            ));
        }
        if self.security.max_login_attempts == 0 {
            return Err(AuthError::Config(
                "security.max_login_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_security_defaults() {
        let security = SecurityConfig::default();
        assert_eq!(security.max_login_attempts, 3);
        assert_eq!(security.lockout_window_minutes, 5);
        assert_eq!(security.session_timeout_hours, 2);
        assert_eq!(security.captcha_failure_threshold, 2);
        assert_eq!(security.default_role, "user");
    }

    #[test]
    fn test_parse_minimal() {
        let config = Config::parse(
            r#"
            [jwt]
            secret = "unit-test-signing-key"
            "#,
        )
        .unwrap();

        assert_eq!(config.jwt.secret, "unit-test-signing-key");
        assert_eq!(config.jwt.expiration_hours, 24);
        assert_eq!(config.security.max_login_attempts, 3);
        assert_eq!(config.captcha.timeout_secs, 5);
    }

    #[test]
    fn test_parse_overrides() {
        let config = Config::parse(
            r#"
            [security]
            max_login_attempts = 5
            lockout_window_minutes = 15
            session_timeout_hours = 8

            [jwt]
            secret = "k"
            expiration_hours = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.security.max_login_attempts, 5);
        assert_eq!(config.security.lockout_window_minutes, 15);
        assert_eq!(config.security.session_timeout_hours, 8);
        assert_eq!(config.jwt.expiration_hours, 1);
    }

    #[test]
    fn test_missing_jwt_secret_rejected() {
        let result = Config::parse("[security]\nmax_login_attempts = 3\n");
        assert!(matches!(result, Err(AuthError::Config(_))));
    }

    #[test]
    fn test_zero_max_attempts_rejected() {
        let result = Config::parse(
            r#"
            [security]
            max_login_attempts = 0

            [jwt]
            secret = "k"
            "#,
        );
        assert!(matches!(result, Err(AuthError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[jwt]\nsecret = \"file-key\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.jwt.secret, "file-key");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/gatehouse.toml");
        assert!(matches!(result, Err(AuthError::Config(_))));
    }
}
