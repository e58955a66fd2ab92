//! The process-wide default error listener.
//!
//! User-facing kinds get a templated message. Internal kinds get a generic
//! message (with the formatted chain when `tracebacksToUser` is on) and are
//! forwarded to every observability sink. Nothing is sent once the
//! interaction has been answered or its window has closed.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use slashforge_config::ErrorsConfig;
use slashforge_core::{CommandError, ErrorKind, ObservabilitySink, Reply};
use tracing::{debug, warn};

use crate::events::{ErrorEvent, ErrorListener};

pub struct DefaultErrorHandler {
    errors: ErrorsConfig,
    observability: Vec<Arc<dyn ObservabilitySink>>,
}

impl DefaultErrorHandler {
    pub fn new(errors: ErrorsConfig) -> Self {
        Self { errors, observability: Vec::new() }
    }

    pub fn with_observability(mut self, sink: Arc<dyn ObservabilitySink>) -> Self {
        self.observability.push(sink);
        self
    }

    /// Message for the invoker, or `None` when this kind is never shown.
    pub fn user_message(&self, event: &ErrorEvent) -> Option<String> {
        let messages = self.errors.messages();
        let command = event.source.as_ref().map(|s| s.qualified_name()).unwrap_or("");
        match &event.error {
            CommandError::CheckFailed { .. } => Some(messages.check_failed().to_string()),
            CommandError::OnCooldown { retry_after } => Some(
                messages
                    .on_cooldown()
                    .replace("{retry_after}", &format!("{:.2}", retry_after.as_secs_f64())),
            ),
            CommandError::ArgumentValidation { option, reason } => Some(
                messages
                    .invalid_argument()
                    .replace("{option}", option)
                    .replace("{reason}", reason),
            ),
            CommandError::UnknownCommand { .. } => {
                Some(messages.unknown_command().replace("{command}", command))
            }
            CommandError::AlreadyResponded | CommandError::AlreadyExpired => None,
            CommandError::InvalidShape { .. } | CommandError::DuplicateCommand { .. } => None,
            CommandError::EntityResolution { .. } | CommandError::Internal { .. } | CommandError::Transport(_) => {
                let mut message = messages.internal().to_string();
                if self.errors.tracebacks_to_user() {
                    message.push_str("\n```\n");
                    message.push_str(&event.report().traceback());
                    message.push_str("\n```");
                }
                Some(message)
            }
        }
    }

    fn forward(&self, event: &ErrorEvent) {
        if self.observability.is_empty() {
            return;
        }
        let report = event.report();
        for sink in &self.observability {
            debug!(sink = sink.name(), id = %report.id, "[Events] Forwarding error report");
            sink.report(&report);
        }
    }

    /// Kinds that need a human to look at them.
    fn is_reportable(kind: ErrorKind) -> bool {
        !kind.is_user_facing()
    }
}

#[async_trait]
impl ErrorListener for DefaultErrorHandler {
    fn name(&self) -> &str {
        "default"
    }

    async fn on_error(&self, event: &ErrorEvent) -> Result<()> {
        if Self::is_reportable(event.kind) {
            self.forward(event);
        }
        if event.kind.is_lifecycle() {
            warn!(kind = %event.kind, "[Commands] Response lifecycle misuse: {}", event.error);
        }

        let Some(source) = &event.source else {
            return Ok(());
        };
        let Some(message) = self.user_message(event) else {
            return Ok(());
        };
        if !source.responder.can_respond().await {
            debug!(kind = %event.kind, "[Commands] Interaction already answered, skipping error message");
            return Ok(());
        }

        let reply = Reply { content: message, ephemeral: self.errors.ephemeral() };
        if let Err(err) = source.responder.send(reply).await {
            // Lost the race with the command's own response, or the window closed.
            debug!(kind = %event.kind, "[Commands] Error message not delivered: {err}");
        }
        Ok(())
    }
}
