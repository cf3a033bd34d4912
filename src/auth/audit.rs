//! Audit event emission.
//!
//! Events are fire-and-forget from the orchestrator's perspective; a sink
//! failure is logged and never fails the triggering operation.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::Result;

/// One security-relevant event.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Acting account, when known.
    pub actor_id: Option<i64>,
    /// What happened (e.g. "login", "register", "2fa_enabled").
    pub action: String,
    /// Kind of entity acted on.
    pub entity_type: String,
    /// ID of the entity acted on, when known.
    pub entity_id: Option<i64>,
    /// Source address.
    pub ip_address: String,
    /// Client agent string.
    pub user_agent: String,
    /// Human-readable detail.
    pub description: String,
}

impl AuditEvent {
    /// Build an event on a user entity.
    pub fn on_user(action: impl Into<String>, user_id: Option<i64>) -> Self {
        Self {
            actor_id: user_id,
            action: action.into(),
            entity_type: "user".to_string(),
            entity_id: user_id,
            ip_address: String::new(),
            user_agent: String::new(),
            description: String::new(),
        }
    }

    /// Set the source address and client agent.
    pub fn from_client(mut self, ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        self.ip_address = ip_address.into();
        self.user_agent = user_agent.into();
        self
    }

    /// Set the detail text.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Destination for audit events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist one event.
    async fn record(&self, event: AuditEvent) -> Result<()>;
}

/// Sink that discards every event.
pub struct NullAuditSink;

#[async_trait]
impl AuditSink for NullAuditSink {
    async fn record(&self, _event: AuditEvent) -> Result<()> {
        Ok(())
    }
}

/// Sink that keeps events in memory, for tests.
#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the recorded events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
        Ok(())
    }
}
