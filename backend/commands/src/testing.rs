//! In-memory collaborators for tests and offline replay.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use slashforge_core::{
    Choice, Entity, EntityKind, ErrorKind, ErrorReport, InteractionToken, ObservabilitySink,
    PlatformDirectory, ResponseSink, Snowflake,
};

use crate::events::{ErrorEvent, ErrorListener};

/// One call made against a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Ack { token: String },
    Send { token: String, content: String, ephemeral: bool },
    Defer { token: String, ephemeral: bool },
    Suggest { token: String, choices: Vec<Choice> },
}

/// Response sink that records every call.
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<SinkCall>>,
    fail: bool,
}

impl RecordingSink {
    /// A sink whose every call fails, as a dropped connection would.
    pub fn failing() -> Self {
        Self { calls: Mutex::new(Vec::new()), fail: true }
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Contents of every `send`, in order.
    pub fn messages(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SinkCall::Send { content, .. } => Some(content),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: SinkCall) -> Result<()> {
        if self.fail {
            bail!("connection reset by peer");
        }
        self.calls.lock().map_err(|_| anyhow!("recording sink poisoned"))?.push(call);
        Ok(())
    }
}

#[async_trait]
impl ResponseSink for RecordingSink {
    async fn ack(&self, token: &InteractionToken) -> Result<()> {
        self.record(SinkCall::Ack { token: token.to_string() })
    }

    async fn send(&self, token: &InteractionToken, content: &str, ephemeral: bool) -> Result<()> {
        self.record(SinkCall::Send { token: token.to_string(), content: content.to_string(), ephemeral })
    }

    async fn defer(&self, token: &InteractionToken, ephemeral: bool) -> Result<()> {
        self.record(SinkCall::Defer { token: token.to_string(), ephemeral })
    }

    async fn suggest(&self, token: &InteractionToken, choices: &[Choice]) -> Result<()> {
        self.record(SinkCall::Suggest { token: token.to_string(), choices: choices.to_vec() })
    }
}

/// Platform directory backed by a map of known entities.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDirectory {
    entities: Arc<Mutex<HashMap<Snowflake, Entity>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, entity: Entity) -> Self {
        self.insert(entity);
        self
    }

    pub fn insert(&self, entity: Entity) {
        if let Ok(mut entities) = self.entities.lock() {
            entities.insert(entity.id(), entity);
        }
    }

    pub fn len(&self) -> usize {
        self.entities.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PlatformDirectory for InMemoryDirectory {
    async fn resolve_entity(&self, id: Snowflake, _expected: EntityKind) -> Result<Option<Entity>> {
        let entities = self.entities.lock().map_err(|_| anyhow!("directory poisoned"))?;
        Ok(entities.get(&id).cloned())
    }
}

/// Observability sink that keeps every report.
#[derive(Debug, Default)]
pub struct RecordingObservability {
    reports: Mutex<Vec<ErrorReport>>,
}

impl RecordingObservability {
    pub fn reports(&self) -> Vec<ErrorReport> {
        self.reports.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ObservabilitySink for RecordingObservability {
    fn name(&self) -> &str {
        "recording"
    }

    fn report(&self, report: &ErrorReport) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report.clone());
        }
    }
}

/// Error listener that records the kind of every event it sees, tagged with
/// its own name so ordering across listeners can be asserted.
#[derive(Debug, Default)]
pub struct RecordingListener {
    name: String,
    log: Arc<Mutex<Vec<(String, ErrorKind)>>>,
}

impl RecordingListener {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), log: Arc::default() }
    }

    /// A listener writing into a log shared with other listeners.
    pub fn shared(name: impl Into<String>, log: Arc<Mutex<Vec<(String, ErrorKind)>>>) -> Self {
        Self { name: name.into(), log }
    }

    pub fn seen(&self) -> Vec<(String, ErrorKind)> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.seen().into_iter().filter(|(n, _)| *n == self.name).map(|(_, k)| k).collect()
    }
}

#[async_trait]
impl ErrorListener for RecordingListener {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_error(&self, event: &ErrorEvent) -> Result<()> {
        self.log
            .lock()
            .map_err(|_| anyhow!("listener log poisoned"))?
            .push((self.name.clone(), event.kind));
        Ok(())
    }
}
