//! Crash event types.
//!
//! Events are what renderers forward to the main process and what the main
//! process persists in its queue until a transport accepts them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::role::ProcessRole;

/// Severity of a captured event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Fatal,
    Error,
    Warning,
    Info,
    Debug,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Fatal => "fatal",
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Info => "info",
            Level::Debug => "debug",
        }
    }
}

/// A captured crash or message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashEvent {
    /// Event ID (computed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,

    /// Unix timestamp in seconds
    pub timestamp: i64,

    pub level: Level,

    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,

    /// Process the event was captured in
    pub process: ProcessRole,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

impl CrashEvent {
    /// Creates an event stamped with the current time.
    pub fn new(process: ProcessRole, level: Level, message: impl Into<String>) -> Self {
        Self {
            event_id: None,
            timestamp: chrono::Utc::now().timestamp(),
            level,
            message: message.into(),
            stack: None,
            process,
            release: None,
            environment: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Computes the event ID.
    ///
    /// ID = SHA256([timestamp, process, level, message, stack])
    pub fn compute_id(&self) -> String {
        let serialized = serde_json::json!([
            self.timestamp,
            self.process.as_str(),
            self.level.as_str(),
            self.message,
            self.stack
        ]);

        let hash = Sha256::digest(serialized.to_string().as_bytes());
        hex::encode(hash)
    }

    /// Returns a copy with the computed ID field set, keeping an existing one.
    pub fn with_id(mut self) -> Self {
        if self.event_id.is_none() {
            self.event_id = Some(self.compute_id());
        }
        self
    }

    /// Fills release and environment from configuration when the event has none.
    pub fn stamp(mut self, release: Option<&str>, environment: Option<&str>) -> Self {
        if self.release.is_none() {
            self.release = release.map(String::from);
        }
        if self.environment.is_none() {
            self.environment = environment.map(String::from);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(message: &str) -> CrashEvent {
        CrashEvent {
            timestamp: 1234567890,
            ..CrashEvent::new(ProcessRole::Main, Level::Error, message)
        }
    }

    #[test]
    fn compute_id_returns_valid_hex() {
        let id = event("boom").compute_id();

        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn compute_id_is_deterministic() {
        let event = event("boom").with_stack("at main.rs:1");
        assert_eq!(event.compute_id(), event.compute_id());
    }

    #[test]
    fn compute_id_changes_with_content() {
        assert_ne!(event("hello").compute_id(), event("world").compute_id());
    }

    #[test]
    fn with_id_keeps_existing_id() {
        let mut e = event("boom");
        e.event_id = Some("fixed".into());

        assert_eq!(e.with_id().event_id.as_deref(), Some("fixed"));
    }

    #[test]
    fn stamp_only_fills_missing_fields() {
        let mut e = event("boom");
        e.release = Some("app@2.0.0".into());

        let e = e.stamp(Some("app@1.0.0"), Some("production"));

        assert_eq!(e.release.as_deref(), Some("app@2.0.0"));
        assert_eq!(e.environment.as_deref(), Some("production"));
    }

    #[test]
    fn json_omits_empty_optionals() {
        let json = serde_json::to_value(event("boom")).unwrap();

        assert_eq!(json["level"], "error");
        assert_eq!(json["process"], "main");
        assert!(json.get("stack").is_none());
        assert!(json.get("event_id").is_none());
    }
}
