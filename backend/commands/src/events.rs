//! Error events and the listener registry.
//!
//! The bus is owned by the hosting application: built at startup with the
//! default handler, injected into the dispatcher, shut down with the session.

use std::error::Error as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use slashforge_core::{CommandError, ErrorKind, ErrorReport, Invoker};
use slashforge_logging::{redact_sensitive_data, redact_token};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::{InvocationContext, Responder};
use crate::tree::ResolvedCommand;

/// Where a failed invocation came from.
#[derive(Clone)]
pub struct ErrorSource {
    /// Path as the invoker typed it.
    pub command_path: String,
    /// Set once resolution succeeded.
    pub command: Option<ResolvedCommand>,
    pub invoker: Invoker,
    pub responder: Responder,
    /// Set once arguments were bound.
    pub context: Option<Arc<InvocationContext>>,
}

impl ErrorSource {
    pub fn qualified_name(&self) -> &str {
        self.command
            .as_ref()
            .map(|c| c.qualified_name.as_str())
            .unwrap_or(self.command_path.as_str())
    }
}

pub struct ErrorEvent {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub kind: ErrorKind,
    pub error: CommandError,
    /// `None` for failures not tied to a command invocation.
    pub source: Option<ErrorSource>,
}

impl ErrorEvent {
    pub fn new(error: CommandError, source: Option<ErrorSource>) -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            kind: error.kind(),
            error,
            source,
        }
    }

    /// `source()` chain of the error, outermost first, excluding the error itself.
    pub fn chain(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut cause = self.error.source();
        while let Some(err) = cause {
            chain.push(redact_sensitive_data(&err.to_string()));
            cause = err.source();
        }
        chain
    }

    /// Detached, redacted snapshot for observability sinks.
    pub fn report(&self) -> ErrorReport {
        let mut report = ErrorReport::new(self.kind, redact_sensitive_data(&self.error.to_string()));
        report.id = self.id;
        report.occurred_at = self.occurred_at;
        report.chain = self.chain();
        if let Some(source) = &self.source {
            report.command = Some(source.qualified_name().to_string());
            report.invoker = Some(source.invoker.user_id);
            report.token = Some(redact_token(source.responder.token().as_str()));
        }
        report
    }
}

#[async_trait]
pub trait ErrorListener: Send + Sync {
    fn name(&self) -> &str;

    async fn on_error(&self, event: &ErrorEvent) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

pub struct EventBus {
    default_handler: Arc<dyn ErrorListener>,
    listeners: RwLock<Vec<Arc<dyn ErrorListener>>>,
    open: AtomicBool,
}

impl EventBus {
    pub fn new(default_handler: Arc<dyn ErrorListener>) -> Self {
        Self {
            default_handler,
            listeners: RwLock::new(Vec::new()),
            open: AtomicBool::new(true),
        }
    }

    /// Add a listener after the default handler and any earlier subscribers.
    pub async fn subscribe(&self, listener: Arc<dyn ErrorListener>) {
        debug!("[Events] Subscribed {}", listener.name());
        self.listeners.write().await.push(listener);
    }

    pub async fn listener_count(&self) -> usize {
        self.listeners.read().await.len() + 1
    }

    /// Deliver `event` to the default handler, or to the command's own handler
    /// in its place, then to every subscriber in subscription order.
    ///
    /// Listener failures are logged and never stop delivery.
    pub async fn publish(&self, event: ErrorEvent) {
        if !self.open.load(Ordering::SeqCst) {
            debug!(kind = %event.kind, "[Events] Bus closed, dropping event");
            return;
        }

        let handler = event
            .source
            .as_ref()
            .and_then(|s| s.command.as_ref())
            .and_then(|c| c.error_handler.clone())
            .unwrap_or_else(|| Arc::clone(&self.default_handler));

        let subscribers = self.listeners.read().await.clone();
        for listener in std::iter::once(handler).chain(subscribers) {
            if let Err(err) = listener.on_error(&event).await {
                warn!(
                    listener = listener.name(),
                    kind = %event.kind,
                    "[Events] Listener failed (non-fatal): {}",
                    redact_sensitive_data(&err.to_string())
                );
            }
        }
    }

    /// Stop delivering events and drop all subscribers.
    pub async fn shutdown(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.listeners.write().await.clear();
        debug!("[Events] Bus shut down");
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use slashforge_core::InteractionToken;
    use tokio::time::Instant;

    use crate::builder::CommandBuilder;
    use crate::context::ResponseWindows;
    use crate::testing::{RecordingListener, RecordingSink};
    use crate::tree::CommandTree;

    struct Failing;

    #[async_trait]
    impl ErrorListener for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn on_error(&self, _event: &ErrorEvent) -> Result<()> {
            anyhow::bail!("listener exploded")
        }
    }

    fn responder() -> Responder {
        Responder::new(
            InteractionToken::new("aW50ZXJhY3Rpb246secret-token"),
            Arc::new(RecordingSink::default()),
            Instant::now(),
            ResponseWindows::default(),
            Arc::new(AtomicBool::new(true)),
        )
    }

    async fn resolved_with_handler(handler: Arc<dyn ErrorListener>) -> ResolvedCommand {
        let tree = CommandTree::new();
        let node = CommandBuilder::new("tag", "Tags")
            .error_handler(handler)
            .subcommand(CommandBuilder::new("get", "Get a tag").handler(|_| async { Ok(()) }))
            .build()
            .unwrap();
        tree.register(node).await.unwrap();
        tree.resolve("tag get", None).await.unwrap()
    }

    #[tokio::test]
    async fn publishes_in_subscription_order_despite_failures() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bus = EventBus::new(Arc::new(RecordingListener::shared("default", log.clone())));
        bus.subscribe(Arc::new(Failing)).await;
        bus.subscribe(Arc::new(RecordingListener::shared("first", log.clone()))).await;
        bus.subscribe(Arc::new(RecordingListener::shared("second", log.clone()))).await;
        assert_eq!(bus.listener_count().await, 4);

        bus.publish(ErrorEvent::new(CommandError::AlreadyExpired, None)).await;

        let seen: Vec<String> = log.lock().unwrap().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(seen, vec!["default", "first", "second"]);
    }

    #[tokio::test]
    async fn command_handler_replaces_default_only() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bus = EventBus::new(Arc::new(RecordingListener::shared("default", log.clone())));
        bus.subscribe(Arc::new(RecordingListener::shared("audit", log.clone()))).await;

        let command = resolved_with_handler(Arc::new(RecordingListener::shared("tag_handler", log.clone()))).await;
        let source = ErrorSource {
            command_path: "tag get".into(),
            command: Some(command),
            invoker: Invoker::new(1u64),
            responder: responder(),
            context: None,
        };
        bus.publish(ErrorEvent::new(CommandError::AlreadyResponded, Some(source))).await;

        let seen = log.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                ("tag_handler".to_string(), ErrorKind::AlreadyResponded),
                ("audit".to_string(), ErrorKind::AlreadyResponded),
            ]
        );
    }

    #[tokio::test]
    async fn closed_bus_drops_events() {
        let listener = Arc::new(RecordingListener::new("default"));
        let bus = EventBus::new(listener.clone());
        bus.shutdown().await;
        assert!(!bus.is_open());
        bus.publish(ErrorEvent::new(CommandError::AlreadyExpired, None)).await;
        assert!(listener.kinds().is_empty());
    }

    #[tokio::test]
    async fn report_redacts_token_and_keeps_chain() {
        let cause = anyhow::anyhow!("connection reset").context("query failed");
        let source = ErrorSource {
            command_path: "tag get".into(),
            command: None,
            invoker: Invoker::new(42u64),
            responder: responder(),
            context: None,
        };
        let event = ErrorEvent::new(CommandError::Internal { command: "tag get".into(), source: cause }, Some(source));
        let report = event.report();
        assert_eq!(report.kind, ErrorKind::Internal);
        assert_eq!(report.command.as_deref(), Some("tag get"));
        assert_eq!(report.invoker, Some(slashforge_core::Snowflake(42)));
        assert_eq!(report.token.as_deref(), Some("aW50ZX***"));
        assert_eq!(report.chain, vec!["query failed", "connection reset"]);
    }
}
