//! CAPTCHA verification.
//!
//! The provider is an opaque collaborator behind [`CaptchaVerifier`]; the
//! orchestrator only cares about accept/reject. The HTTP implementation
//! treats provider outages as a rejection rather than an error, so a
//! provider incident cannot open a captcha-free path.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::config::CaptchaConfig;
use crate::{AuthError, Result};

/// Verdict provider for submitted CAPTCHA tokens.
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// Check a client-submitted token with the provider.
    async fn verify(&self, token: &str) -> Result<bool>;
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    success: bool,
}

/// Verifier backed by an HTTP siteverify endpoint.
pub struct HttpCaptchaVerifier {
    client: reqwest::Client,
    verify_url: String,
    secret_key: String,
}

impl HttpCaptchaVerifier {
    /// Build a verifier from the endpoint configuration.
    pub fn new(config: &CaptchaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AuthError::Config(format!("cannot build captcha client: {e}")))?;
        Ok(Self {
            client,
            verify_url: config.verify_url.clone(),
            secret_key: config.secret_key.clone(),
        })
    }
}

#[async_trait]
impl CaptchaVerifier for HttpCaptchaVerifier {
    async fn verify(&self, token: &str) -> Result<bool> {
        if token.is_empty() {
            return Ok(false);
        }

        let response = self
            .client
            .post(&self.verify_url)
            .form(&[("secret", self.secret_key.as_str()), ("response", token)])
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "captcha verification request failed");
                return Ok(false);
            }
        };

        match response.json::<VerifyResponse>().await {
            Ok(body) => Ok(body.success),
            Err(err) => {
                warn!(error = %err, "captcha verification response unreadable");
                Ok(false)
            }
        }
    }
}

/// Fixed-verdict verifier for tests.
pub struct StaticCaptchaVerifier {
    verdict: bool,
}

impl StaticCaptchaVerifier {
    /// A verifier that accepts every token.
    pub fn allow() -> Self {
        Self { verdict: true }
    }

    /// A verifier that rejects every token.
    pub fn deny() -> Self {
        Self { verdict: false }
    }
}

#[async_trait]
impl CaptchaVerifier for StaticCaptchaVerifier {
    async fn verify(&self, _token: &str) -> Result<bool> {
        Ok(self.verdict)
    }
}
