//! Invocation context and the response-window guard.
//!
//! Every response for a token goes through one [`Responder`], which enforces
//! the acknowledgement window (3s from receipt), the extended window after a
//! defer (15m from receipt), and at most one terminal response.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use slashforge_config::DispatchConfig;
use slashforge_core::{CommandError, Invoker, InteractionToken, Reply, ResponseSink};
use slashforge_logging::redact_token;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::arguments::BoundArguments;
use crate::tree::ResolvedCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseWindows {
    pub ack: Duration,
    pub extended: Duration,
}

impl Default for ResponseWindows {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

impl From<&DispatchConfig> for ResponseWindows {
    fn from(config: &DispatchConfig) -> Self {
        Self { ack: config.ack_window(), extended: config.extended_window() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// Nothing sent yet and the acknowledgement window is open.
    Pending,
    /// Deferred; the follow-up has not been sent.
    Deferred,
    /// A terminal response was sent.
    Responded,
    /// The active window closed, or the session shut down, before a response.
    Expired,
}

#[derive(Debug, Default)]
struct ResponseState {
    acked_at: Option<Instant>,
    deferred: bool,
    responded: bool,
}

/// Point-in-time view of a responder, for logging and outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseSnapshot {
    pub status: ResponseStatus,
    /// Time from receipt to the first acknowledgement (send, ack or defer).
    pub acked_after: Option<Duration>,
    pub deferred: bool,
}

#[derive(Clone)]
pub struct Responder {
    token: InteractionToken,
    sink: Arc<dyn ResponseSink>,
    received_at: Instant,
    windows: ResponseWindows,
    state: Arc<Mutex<ResponseState>>,
    session_open: Arc<AtomicBool>,
}

impl Responder {
    pub fn new(
        token: InteractionToken,
        sink: Arc<dyn ResponseSink>,
        received_at: Instant,
        windows: ResponseWindows,
        session_open: Arc<AtomicBool>,
    ) -> Self {
        Self {
            token,
            sink,
            received_at,
            windows,
            state: Arc::new(Mutex::new(ResponseState::default())),
            session_open,
        }
    }

    pub fn token(&self) -> &InteractionToken {
        &self.token
    }

    pub fn received_at(&self) -> Instant {
        self.received_at
    }

    pub fn ack_deadline(&self) -> Instant {
        self.received_at + self.windows.ack
    }

    fn deadline(&self, state: &ResponseState) -> Instant {
        if state.deferred {
            self.received_at + self.windows.extended
        } else {
            self.ack_deadline()
        }
    }

    fn session_open(&self) -> bool {
        self.session_open.load(Ordering::SeqCst)
    }

    /// Guard shared by every terminal response.
    fn check_terminal(&self, state: &ResponseState, now: Instant) -> Result<(), CommandError> {
        if !self.session_open() {
            return Err(CommandError::AlreadyExpired);
        }
        if state.responded {
            // A deferred interaction's follow-up closes its window.
            return Err(if state.deferred { CommandError::AlreadyExpired } else { CommandError::AlreadyResponded });
        }
        if now >= self.deadline(state) {
            return Err(CommandError::AlreadyExpired);
        }
        Ok(())
    }

    /// Send the terminal message. After a defer this is the follow-up.
    pub async fn send(&self, reply: Reply) -> Result<(), CommandError> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        self.check_terminal(&state, now)?;
        self.sink
            .send(&self.token, &reply.content, reply.ephemeral)
            .await
            .map_err(CommandError::Transport)?;
        state.responded = true;
        state.acked_at.get_or_insert(now);
        debug!(token = %redact_token(self.token.as_str()), deferred = state.deferred, "Response sent");
        Ok(())
    }

    /// Acknowledge without a visible message. Terminal, like `send`.
    pub async fn ack(&self) -> Result<(), CommandError> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        self.check_terminal(&state, now)?;
        self.sink.ack(&self.token).await.map_err(CommandError::Transport)?;
        state.responded = true;
        state.acked_at.get_or_insert(now);
        Ok(())
    }

    /// Extend the window to the long follow-up deadline. Only valid before
    /// any response, inside the acknowledgement window.
    pub async fn defer(&self, ephemeral: bool) -> Result<(), CommandError> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        if !self.session_open() {
            return Err(CommandError::AlreadyExpired);
        }
        if state.responded || state.deferred {
            return Err(CommandError::AlreadyResponded);
        }
        if now >= self.ack_deadline() {
            return Err(CommandError::AlreadyExpired);
        }
        self.sink.defer(&self.token, ephemeral).await.map_err(CommandError::Transport)?;
        state.deferred = true;
        state.acked_at = Some(now);
        debug!(token = %redact_token(self.token.as_str()), "Response deferred");
        Ok(())
    }

    /// Whether a terminal response could still be sent right now.
    pub async fn can_respond(&self) -> bool {
        let state = self.state.lock().await;
        self.check_terminal(&state, Instant::now()).is_ok()
    }

    /// Whether the interaction has been acknowledged by a send, ack or defer.
    pub async fn is_acknowledged(&self) -> bool {
        self.state.lock().await.acked_at.is_some()
    }

    pub async fn status(&self) -> ResponseStatus {
        self.snapshot().await.status
    }

    pub async fn snapshot(&self) -> ResponseSnapshot {
        let state = self.state.lock().await;
        let now = Instant::now();
        let status = if state.responded {
            ResponseStatus::Responded
        } else if !self.session_open() || now >= self.deadline(&state) {
            ResponseStatus::Expired
        } else if state.deferred {
            ResponseStatus::Deferred
        } else {
            ResponseStatus::Pending
        };
        ResponseSnapshot {
            status,
            acked_after: state.acked_at.map(|at| at.duration_since(self.received_at)),
            deferred: state.deferred,
        }
    }
}

// ---------------------------------------------------------------------------
// Invocation context
// ---------------------------------------------------------------------------

/// Everything a check or callback sees about one invocation.
///
/// Owned by a single dispatch; the callback receives it behind an `Arc` so it
/// can hand the responder to spawned work.
pub struct InvocationContext {
    command: ResolvedCommand,
    invoker: Invoker,
    args: BoundArguments,
    responder: Responder,
}

impl InvocationContext {
    pub fn new(command: ResolvedCommand, invoker: Invoker, args: BoundArguments, responder: Responder) -> Self {
        Self { command, invoker, args, responder }
    }

    pub fn command(&self) -> &ResolvedCommand {
        &self.command
    }

    pub fn qualified_name(&self) -> &str {
        &self.command.qualified_name
    }

    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }

    pub fn args(&self) -> &BoundArguments {
        &self.args
    }

    pub fn responder(&self) -> &Responder {
        &self.responder
    }

    pub fn token(&self) -> &InteractionToken {
        self.responder.token()
    }

    pub async fn send(&self, reply: Reply) -> Result<(), CommandError> {
        self.responder.send(reply).await
    }

    /// Send a public message.
    pub async fn reply(&self, content: impl Into<String>) -> Result<(), CommandError> {
        self.responder.send(Reply::ok(content)).await
    }

    pub async fn defer(&self, ephemeral: bool) -> Result<(), CommandError> {
        self.responder.defer(ephemeral).await
    }

    pub async fn ack(&self) -> Result<(), CommandError> {
        self.responder.ack().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSink, SinkCall};

    fn responder(sink: Arc<RecordingSink>) -> (Responder, Arc<AtomicBool>) {
        let session = Arc::new(AtomicBool::new(true));
        let responder = Responder::new(
            InteractionToken::new("tok-ctx"),
            sink,
            Instant::now(),
            ResponseWindows::default(),
            Arc::clone(&session),
        );
        (responder, session)
    }

    #[tokio::test(start_paused = true)]
    async fn second_send_is_already_responded() {
        let sink = Arc::new(RecordingSink::default());
        let (responder, _) = responder(sink.clone());
        responder.send(Reply::ok("first")).await.unwrap();
        let err = responder.send(Reply::ephemeral("second")).await.unwrap_err();
        assert!(matches!(err, CommandError::AlreadyResponded));
        let err = responder.ack().await.unwrap_err();
        assert!(matches!(err, CommandError::AlreadyResponded));
        assert_eq!(sink.calls().len(), 1);
        assert_eq!(responder.status().await, ResponseStatus::Responded);
    }

    #[tokio::test(start_paused = true)]
    async fn defer_extends_window_then_follow_up_closes_it() {
        let sink = Arc::new(RecordingSink::default());
        let (responder, _) = responder(sink.clone());

        tokio::time::advance(Duration::from_secs(2)).await;
        responder.defer(false).await.unwrap();
        assert_eq!(responder.status().await, ResponseStatus::Deferred);

        tokio::time::advance(Duration::from_secs(298)).await;
        responder.send(Reply::ok("done")).await.unwrap();

        tokio::time::advance(Duration::from_secs(1)).await;
        let err = responder.send(Reply::ok("again")).await.unwrap_err();
        assert!(matches!(err, CommandError::AlreadyExpired));

        let calls = sink.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], SinkCall::Defer { .. }));
        assert!(matches!(calls[1], SinkCall::Send { ref content, .. } if content == "done"));

        let snapshot = responder.snapshot().await;
        assert_eq!(snapshot.acked_after, Some(Duration::from_secs(2)));
        assert!(snapshot.deferred);
    }

    #[tokio::test(start_paused = true)]
    async fn late_send_without_defer_expires() {
        let sink = Arc::new(RecordingSink::default());
        let (responder, _) = responder(sink.clone());
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(responder.status().await, ResponseStatus::Expired);
        assert!(matches!(responder.send(Reply::ok("late")).await, Err(CommandError::AlreadyExpired)));
        assert!(matches!(responder.defer(false).await, Err(CommandError::AlreadyExpired)));
        assert!(sink.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deferred_window_ends_at_fifteen_minutes() {
        let sink = Arc::new(RecordingSink::default());
        let (responder, _) = responder(sink);
        responder.defer(true).await.unwrap();
        assert!(matches!(responder.defer(true).await, Err(CommandError::AlreadyResponded)));
        tokio::time::advance(Duration::from_secs(900)).await;
        assert!(!responder.can_respond().await);
        assert!(matches!(responder.send(Reply::ok("late")).await, Err(CommandError::AlreadyExpired)));
    }

    #[tokio::test(start_paused = true)]
    async fn closed_session_expires_responses() {
        let sink = Arc::new(RecordingSink::default());
        let (responder, session) = responder(sink.clone());
        session.store(false, Ordering::SeqCst);
        assert!(matches!(responder.send(Reply::ok("bye")).await, Err(CommandError::AlreadyExpired)));
        assert!(sink.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_leaves_window_open() {
        let sink = Arc::new(RecordingSink::failing());
        let (responder, _) = responder(sink);
        assert!(matches!(responder.send(Reply::ok("x")).await, Err(CommandError::Transport(_))));
        assert!(responder.can_respond().await);
    }
}
