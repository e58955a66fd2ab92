//! Autocomplete handlers and the context they receive.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use slashforge_core::{Choice, Invoker, RawOption};

/// What the invoker has typed so far.
#[derive(Debug, Clone)]
pub struct AutocompleteContext {
    /// Qualified command name.
    pub command: String,
    /// The option being typed.
    pub option: String,
    /// Partial value of the focused option, as text.
    pub current: String,
    pub invoker: Invoker,
    /// Best-effort raw values of the other options typed so far.
    pub siblings: Vec<RawOption>,
}

impl AutocompleteContext {
    pub fn sibling(&self, name: &str) -> Option<&serde_json::Value> {
        self.siblings.iter().find(|o| o.name == name).map(|o| &o.value)
    }
}

/// Produces suggestions for one option. Relevance filtering is the handler's
/// job; the engine only truncates to the platform limit.
#[async_trait]
pub trait AutocompleteHandler: Send + Sync {
    async fn suggest(&self, ctx: AutocompleteContext) -> Result<Vec<Choice>>;
}

pub struct FnAutocomplete<F>(F);

#[async_trait]
impl<F, Fut> AutocompleteHandler for FnAutocomplete<F>
where
    F: Fn(AutocompleteContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<Choice>>> + Send + 'static,
{
    async fn suggest(&self, ctx: AutocompleteContext) -> Result<Vec<Choice>> {
        (self.0)(ctx).await
    }
}

pub fn autocomplete_fn<F, Fut>(f: F) -> Arc<dyn AutocompleteHandler>
where
    F: Fn(AutocompleteContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<Choice>>> + Send + 'static,
{
    Arc::new(FnAutocomplete(f))
}

/// How an autocomplete request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AutocompleteOutcome {
    /// Suggestions sent; `truncated` when the handler returned too many.
    Suggested { count: usize, truncated: bool },
    /// No handler for the focused option; an empty list was sent.
    NoHandler,
    /// The path or focused option could not be resolved; an empty list was sent.
    Unresolved,
    /// The handler failed; an empty list was sent and the error published.
    Failed,
    /// The budget elapsed; nothing was sent.
    TimedOut,
}
