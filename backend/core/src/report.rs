use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::types::UserId;

/// Detached, serializable snapshot of an error event.
///
/// This is what leaves the process: observability sinks never see the live
/// invocation context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub kind: ErrorKind,
    /// Qualified command name, when the failure could be tied to one.
    pub command: Option<String>,
    pub invoker: Option<UserId>,
    /// Interaction token, already redacted by the producer.
    pub token: Option<String>,
    pub message: String,
    /// `source()` chain of the underlying error, outermost first.
    pub chain: Vec<String>,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            kind,
            command: None,
            invoker: None,
            token: None,
            message: message.into(),
            chain: Vec::new(),
        }
    }

    /// Render the chain the way a traceback would read.
    pub fn traceback(&self) -> String {
        let mut out = self.message.clone();
        for (depth, cause) in self.chain.iter().enumerate() {
            out.push_str(&format!("\n  {depth}: {cause}"));
        }
        out
    }
}
