//! Interaction dispatch.
//!
//! Each interaction runs `Received → Resolved → ArgsBound → Checked →
//! Invoked → {Acked, TimedOut}`. A failed transition publishes exactly one
//! [`ErrorEvent`] on the bus and ends the dispatch.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use serde::Serialize;
use serde_json::Value;
use slashforge_config::DispatchConfig;
use slashforge_core::{
    AutocompleteRequest, Choice, CommandError, CommandInvocation, ErrorKind, Interaction, InteractionToken,
    PlatformDirectory, ResponseSink,
};
use slashforge_logging::{DispatchEvent, DispatchLogger, redact_sensitive_data};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, sleep_until, timeout_at};
use tracing::{debug, info, warn};

use crate::autocomplete::{AutocompleteContext, AutocompleteOutcome};
use crate::checks::CheckPipeline;
use crate::context::{InvocationContext, Responder, ResponseStatus, ResponseWindows};
use crate::events::{ErrorEvent, ErrorSource, EventBus};
use crate::resolver;
use crate::tree::CommandTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Received,
    Resolved,
    ArgsBound,
    Checked,
    Invoked,
    Acked,
    TimedOut,
}

impl DispatchState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DispatchState::Acked | DispatchState::TimedOut)
    }
}

/// How one command invocation ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchOutcome {
    /// Qualified name when resolution succeeded, otherwise the path as typed.
    pub command: String,
    /// Last state reached.
    pub state: DispatchState,
    /// Kind of the published error, if any.
    pub error: Option<ErrorKind>,
    /// Responder status once dispatch and error handling finished.
    pub response: ResponseStatus,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "interaction", rename_all = "snake_case")]
pub enum InteractionOutcome {
    Command(DispatchOutcome),
    Autocomplete(AutocompleteOutcome),
}

pub struct Dispatcher {
    tree: CommandTree,
    directory: Arc<dyn PlatformDirectory>,
    sink: Arc<dyn ResponseSink>,
    bus: Arc<EventBus>,
    config: DispatchConfig,
    session_open: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(
        tree: CommandTree,
        directory: Arc<dyn PlatformDirectory>,
        sink: Arc<dyn ResponseSink>,
        bus: Arc<EventBus>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            tree,
            directory,
            sink,
            bus,
            config,
            session_open: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn is_open(&self) -> bool {
        self.session_open.load(Ordering::SeqCst)
    }

    /// Close the session. In-flight invocations keep running, but every
    /// response attempt from now on fails with `AlreadyExpired`.
    pub fn shutdown(&self) {
        if self.session_open.swap(false, Ordering::SeqCst) {
            info!("[Commands] Dispatcher shut down");
        }
    }

    /// Run `interaction` as its own task.
    pub fn spawn(self: &Arc<Self>, interaction: Interaction) -> Result<JoinHandle<InteractionOutcome>, CommandError> {
        if !self.is_open() {
            return Err(CommandError::AlreadyExpired);
        }
        let dispatcher = Arc::clone(self);
        Ok(tokio::spawn(async move { dispatcher.handle(interaction).await }))
    }

    pub async fn handle(&self, interaction: Interaction) -> InteractionOutcome {
        match interaction {
            Interaction::Command(invocation) => InteractionOutcome::Command(self.dispatch(invocation).await),
            Interaction::Autocomplete(request) => InteractionOutcome::Autocomplete(self.autocomplete(request).await),
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    pub async fn dispatch(&self, invocation: CommandInvocation) -> DispatchOutcome {
        let received_at = Instant::now();
        let token = invocation.token.clone();
        DispatchLogger::log_event(token.as_str(), DispatchEvent::Received { command: invocation.command.clone() });

        let responder = Responder::new(
            token.clone(),
            Arc::clone(&self.sink),
            received_at,
            ResponseWindows::from(&self.config),
            Arc::clone(&self.session_open),
        );
        let mut source = ErrorSource {
            command_path: invocation.command.trim().to_string(),
            command: None,
            invoker: invocation.invoker.clone(),
            responder: responder.clone(),
            context: None,
        };
        let mut state = DispatchState::Received;

        let result = self.run(&invocation, &mut source, &mut state).await;
        let command = source.qualified_name().to_string();
        let error = match result {
            Ok(()) => None,
            Err(err) => Some(self.fail(&token, err, source).await),
        };

        DispatchOutcome {
            command,
            state,
            error,
            response: responder.status().await,
            elapsed_ms: elapsed_ms(received_at.elapsed()),
        }
    }

    async fn run(
        &self,
        invocation: &CommandInvocation,
        source: &mut ErrorSource,
        state: &mut DispatchState,
    ) -> Result<(), CommandError> {
        let token = invocation.token.as_str();
        if !self.is_open() {
            return Err(CommandError::AlreadyExpired);
        }

        let resolved = self.tree.resolve(&invocation.command, invocation.invoker.guild_id).await?;
        source.command = Some(resolved.clone());
        *state = DispatchState::Resolved;
        DispatchLogger::log_event(token, DispatchEvent::Resolved { command: resolved.qualified_name.clone() });

        let args = resolver::bind(resolved.leaf_command(), &invocation.options, self.directory.as_ref()).await?;
        *state = DispatchState::ArgsBound;
        DispatchLogger::log_event(token, DispatchEvent::ArgsBound { arguments: args.len() });

        let ctx = Arc::new(InvocationContext::new(
            resolved.clone(),
            invocation.invoker.clone(),
            args,
            source.responder.clone(),
        ));
        source.context = Some(Arc::clone(&ctx));

        CheckPipeline::evaluate(&resolved.checks, &ctx).await?;
        *state = DispatchState::Checked;
        DispatchLogger::log_event(token, DispatchEvent::Checked { checks: resolved.checks.len() });

        *state = DispatchState::Invoked;
        DispatchLogger::log_event(token, DispatchEvent::Invoked);
        info!("[Commands] Invoking /{}", resolved.qualified_name);

        let callback = Arc::clone(&resolved.leaf_command().callback);
        let mut task = tokio::spawn({
            let ctx = Arc::clone(&ctx);
            async move { callback.invoke(ctx).await }
        });

        let responder = &source.responder;
        let mut lapsed = false;
        let joined = tokio::select! {
            joined = &mut task => joined,
            _ = sleep_until(responder.ack_deadline()) => {
                if !responder.is_acknowledged().await {
                    lapsed = true;
                    warn!(
                        "[Commands] /{} neither responded nor deferred within {:?}",
                        resolved.qualified_name,
                        self.config.ack_window()
                    );
                }
                (&mut task).await
            }
        };
        let result = callback_result(&resolved.qualified_name, joined);

        let snapshot = responder.snapshot().await;
        match snapshot.acked_after {
            Some(after) => {
                *state = DispatchState::Acked;
                DispatchLogger::log_event(
                    token,
                    DispatchEvent::Acked { elapsed_ms: elapsed_ms(after), deferred: snapshot.deferred },
                );
            }
            None if lapsed || result.is_ok() => {
                *state = DispatchState::TimedOut;
                if !lapsed {
                    warn!("[Commands] /{} returned without responding", resolved.qualified_name);
                }
                DispatchLogger::log_event(
                    token,
                    DispatchEvent::TimedOut {
                        elapsed_ms: elapsed_ms(responder.received_at().elapsed()),
                        deferred: snapshot.deferred,
                    },
                );
            }
            None => {}
        }
        result
    }

    /// Log the failure and publish it. Returns its kind for the outcome.
    async fn fail(&self, token: &InteractionToken, err: CommandError, source: ErrorSource) -> ErrorKind {
        let kind = err.kind();
        DispatchLogger::log_event(
            token.as_str(),
            DispatchEvent::Failed { kind, message: err.to_string() },
        );
        debug!(kind = %kind, "[Commands] /{} failed", source.qualified_name());
        self.bus.publish(ErrorEvent::new(err, Some(source))).await;
        kind
    }

    // -----------------------------------------------------------------------
    // Autocomplete
    // -----------------------------------------------------------------------

    pub async fn autocomplete(&self, request: AutocompleteRequest) -> AutocompleteOutcome {
        let deadline = Instant::now() + self.config.autocomplete_budget();
        let token = &request.token;

        let Some(focused) = request.focused() else {
            debug!("[Commands] Autocomplete for /{} has no focused option", request.command);
            self.suggest(token, &[]).await;
            return AutocompleteOutcome::Unresolved;
        };
        let resolved = match self.tree.resolve(&request.command, request.invoker.guild_id).await {
            Ok(resolved) => resolved,
            Err(err) => {
                debug!("[Commands] Autocomplete not resolved: {err}");
                self.suggest(token, &[]).await;
                return AutocompleteOutcome::Unresolved;
            }
        };
        let leaf = resolved.leaf_command();
        if leaf.option(&focused.name).is_none() {
            debug!("[Commands] /{} has no option '{}'", resolved.qualified_name, focused.name);
            self.suggest(token, &[]).await;
            return AutocompleteOutcome::Unresolved;
        }
        let Some(handler) = leaf.autocomplete_handler(&focused.name) else {
            self.suggest(token, &[]).await;
            return AutocompleteOutcome::NoHandler;
        };

        let ctx = AutocompleteContext {
            command: resolved.qualified_name.clone(),
            option: focused.name.clone(),
            current: partial_text(&focused.value),
            invoker: request.invoker.clone(),
            siblings: request.options.iter().filter(|o| !o.focused).cloned().collect(),
        };
        let mut task = tokio::spawn(async move { handler.suggest(ctx).await });

        let joined = match timeout_at(deadline, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                task.abort();
                warn!(
                    "[Commands] Autocomplete for /{} option '{}' exceeded {:?}",
                    resolved.qualified_name,
                    focused.name,
                    self.config.autocomplete_budget()
                );
                return AutocompleteOutcome::TimedOut;
            }
        };

        let mut choices = match callback_result(&resolved.qualified_name, joined) {
            Ok(choices) => choices,
            Err(err) => {
                warn!(
                    "[Commands] Autocomplete handler for /{} failed: {}",
                    resolved.qualified_name,
                    redact_sensitive_data(&err.to_string())
                );
                self.bus.publish(ErrorEvent::new(err, None)).await;
                self.suggest(token, &[]).await;
                return AutocompleteOutcome::Failed;
            }
        };

        let max = self.config.max_choices();
        let truncated = choices.len() > max;
        if truncated {
            warn!(
                "[Commands] Autocomplete for /{} returned {} suggestions, truncating to {max}",
                resolved.qualified_name,
                choices.len()
            );
            choices.truncate(max);
        }
        self.suggest(token, &choices).await;
        DispatchLogger::log_event(
            token.as_str(),
            DispatchEvent::Suggested {
                command: resolved.qualified_name.clone(),
                option: focused.name.clone(),
                suggestions: choices.len(),
            },
        );
        AutocompleteOutcome::Suggested { count: choices.len(), truncated }
    }

    async fn suggest(&self, token: &InteractionToken, choices: &[Choice]) {
        if let Err(err) = self.sink.suggest(token, choices).await {
            warn!("[Commands] Failed to deliver suggestions: {err}");
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Flatten a user task's join result. A `CommandError` raised inside keeps its
/// kind; anything else, panics included, is internal.
fn callback_result<T>(command: &str, joined: Result<anyhow::Result<T>, JoinError>) -> Result<T, CommandError> {
    let internal = |source: anyhow::Error| CommandError::Internal { command: command.to_string(), source };
    match joined {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.downcast::<CommandError>().unwrap_or_else(internal)),
        Err(err) if err.is_panic() => Err(internal(anyhow!("panicked: {}", panic_message(err.into_panic())))),
        Err(err) => Err(internal(anyhow!("task failed: {err}"))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn partial_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
