//! Gatehouse is an authentication and session engine: login orchestration
//! with brute-force lockout, CAPTCHA gating, TOTP two-factor auth, and
//! signed bearer tokens backed by server-side session records.
//!
//! The engine is transport-agnostic. Callers construct an
//! [`auth::Authenticator`] over a [`db::Database`] and drive the protocol
//! directly; HTTP routing, if any, lives outside this crate.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;

pub use auth::{Authenticator, LoginOutcome, LoginRequest, RegisterRequest};
pub use config::Config;
pub use db::Database;
pub use error::{AuthError, Result};
