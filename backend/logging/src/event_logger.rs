//! Dispatch Event Logger
//!
//! One structured record per dispatch lifecycle transition, emitted under the
//! `dispatch_events` target so it can be routed to its own sink.

use chrono::{DateTime, Utc};
use serde::Serialize;
use slashforge_core::ErrorKind;
use tracing::{info, warn};

use crate::redact::{redact_sensitive_data, redact_token};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    Received { command: String },
    Resolved { command: String },
    ArgsBound { arguments: usize },
    Checked { checks: usize },
    Invoked,
    Acked { elapsed_ms: u64, deferred: bool },
    TimedOut { elapsed_ms: u64, deferred: bool },
    Failed { kind: ErrorKind, message: String },
    Suggested { command: String, option: String, suggestions: usize },
}

#[derive(Debug, Serialize)]
pub struct DispatchLogEntry {
    /// Redacted interaction token.
    pub token: String,
    pub timestamp: DateTime<Utc>,
    pub event: DispatchEvent,
}

pub struct DispatchLogger;

impl DispatchLogger {
    /// Record a lifecycle transition for the interaction identified by `token`.
    pub fn log_event(token: &str, event: DispatchEvent) {
        let entry = Self::entry(token, event);
        match &entry.event {
            DispatchEvent::TimedOut { .. } | DispatchEvent::Failed { .. } => {
                warn!(target: "dispatch_events", event = ?entry, "Dispatch event");
            }
            _ => info!(target: "dispatch_events", event = ?entry, "Dispatch event"),
        }
    }

    /// Build the redacted log entry without emitting it.
    pub fn entry(token: &str, mut event: DispatchEvent) -> DispatchLogEntry {
        if let DispatchEvent::Failed { message, .. } = &mut event {
            *message = redact_sensitive_data(message);
        }
        DispatchLogEntry {
            token: redact_token(token),
            timestamp: Utc::now(),
            event,
        }
    }
}
