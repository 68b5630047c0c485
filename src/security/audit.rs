//! Security event log.
//!
//! Events are enqueued on an unbounded channel and written by a separate drain task, so
//! the request path (including the CORS preflight) never waits on logging.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;

/// Field names whose values are never logged.
const SENSITIVE_FIELDS: [&str; 5] = ["password", "token", "secret", "key", "apikey"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityEvent {
    pub event: &'static str,
    pub level: SecurityLevel,
    pub fields: Vec<(&'static str, String)>,
    pub timestamp_ms: u64,
}

impl SecurityEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Fields rendered as `k=v` pairs, with sensitive values redacted.
    pub fn redacted(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, redact(k, v)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn write(&self) {
        let data = self.redacted();
        match self.level {
            SecurityLevel::Info => {
                tracing::info!(target: "security", event = self.event, data = %data, "Security event")
            }
            SecurityLevel::Warn => {
                tracing::warn!(target: "security", event = self.event, data = %data, "Security event")
            }
            SecurityLevel::Error => {
                tracing::error!(target: "security", event = self.event, data = %data, "Security event")
            }
        }
    }
}

/// Redact a single field value. Secrets are hidden entirely; identifiers are cut to
/// eight characters.
pub fn redact(field: &str, value: &str) -> String {
    let lowered = field.to_ascii_lowercase();
    if SENSITIVE_FIELDS.iter().any(|s| lowered.contains(s)) {
        return "[REDACTED]".to_string();
    }
    if lowered.contains("id") && value.chars().count() > 8 {
        let head: String = value.chars().take(8).collect();
        return format!("{head}...");
    }
    value.to_string()
}

/// Enqueue-only handle. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct SecurityLog {
    tx: Option<mpsc::UnboundedSender<SecurityEvent>>,
}

impl SecurityLog {
    /// A log handle plus the receiver a drain task should consume.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SecurityEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A handle that drops every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Enqueue an event. Never blocks and never fails the caller.
    pub fn emit(&self, event: &'static str, level: SecurityLevel, fields: Vec<(&'static str, String)>) {
        let Some(tx) = &self.tx else {
            return;
        };
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        // A closed channel means the drain task is gone; the event is dropped.
        let _ = tx.send(SecurityEvent {
            event,
            level,
            fields,
            timestamp_ms,
        });
    }
}

/// Write queued events until every `SecurityLog` handle is dropped.
pub async fn drain(mut rx: mpsc::UnboundedReceiver<SecurityEvent>) {
    while let Some(event) = rx.recv().await {
        event.write();
    }
}
