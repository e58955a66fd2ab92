//! Structured logging for SlashForge.
//!
//! Handles subscriber setup, interaction-token redaction, dispatch lifecycle
//! event records, and a tracing-backed observability sink.

pub mod event_logger;
pub mod logger;
pub mod observability;
pub mod redact;

pub use event_logger::{DispatchEvent, DispatchLogEntry, DispatchLogger};
pub use logger::init_logger;
pub use observability::TracingObservabilitySink;
pub use redact::{redact_sensitive_data, redact_token};
