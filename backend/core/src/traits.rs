use anyhow::Result;
use async_trait::async_trait;

use crate::entity::{Entity, EntityKind};
use crate::interaction::{Choice, InteractionToken};
use crate::report::ErrorReport;
use crate::types::Snowflake;

/// Outbound side of the transport.
///
/// The engine guards every call: implementations may assume at most one
/// terminal response per token and need not re-check deadlines.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    /// Acknowledge without a visible message.
    async fn ack(&self, token: &InteractionToken) -> Result<()>;

    /// Send a message to the invoker.
    async fn send(&self, token: &InteractionToken, content: &str, ephemeral: bool) -> Result<()>;

    /// Show a "thinking" state and extend the response window.
    async fn defer(&self, token: &InteractionToken, ephemeral: bool) -> Result<()>;

    /// Answer an autocomplete request.
    async fn suggest(&self, token: &InteractionToken, choices: &[Choice]) -> Result<()>;
}

/// Lookup of users, channels, roles and attachments by id.
#[async_trait]
pub trait PlatformDirectory: Send + Sync {
    /// Returns `Ok(None)` when the platform has no such entity.
    async fn resolve_entity(&self, id: Snowflake, expected: EntityKind) -> Result<Option<Entity>>;
}

/// Fire-and-forget error reporting (error trackers, alerting).
///
/// Called inline by the dispatcher, so implementations must not block.
pub trait ObservabilitySink: Send + Sync {
    fn name(&self) -> &str;

    fn report(&self, report: &ErrorReport);
}
