//! Cooldowns: fixed-window rate limits keyed per command and bucket.
//!
//! A cooldown is a check like any other. The check phase only peeks at the
//! bucket; the slot is taken in the commit phase, after every check on the
//! command has passed. Rejected invocations never advance cooldown state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slashforge_core::CommandError;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::checks::Check;
use crate::context::InvocationContext;

/// What a cooldown counts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownBucket {
    #[default]
    User,
    Guild,
    Channel,
    Global,
}

impl CooldownBucket {
    /// Bucket key for an invocation. Guild and channel buckets fall back to the
    /// user outside a guild or channel.
    pub fn key(self, ctx: &InvocationContext) -> String {
        let invoker = ctx.invoker();
        match self {
            CooldownBucket::User => format!("user:{}", invoker.user_id),
            CooldownBucket::Guild => match invoker.guild_id {
                Some(guild) => format!("guild:{guild}"),
                None => format!("user:{}", invoker.user_id),
            },
            CooldownBucket::Channel => match invoker.channel_id {
                Some(channel) => format!("channel:{channel}"),
                None => format!("user:{}", invoker.user_id),
            },
            CooldownBucket::Global => "global".to_string(),
        }
    }
}

/// `rate` uses per `per` window. `rate = 1` is a minimum interval between uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldown {
    pub rate: u32,
    pub per: Duration,
    pub bucket: CooldownBucket,
}

impl Cooldown {
    pub fn new(rate: u32, per: Duration, bucket: CooldownBucket) -> Self {
        Self { rate: rate.max(1), per, bucket }
    }
}

/// Per-key window state.
struct BucketState {
    count: u32,
    window_start: Instant,
    per: Duration,
}

impl BucketState {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.window_start) >= self.per
    }
}

/// Expired buckets are swept every this many acquisitions.
const SWEEP_EVERY: u64 = 256;

#[derive(Default)]
struct Buckets {
    states: HashMap<String, BucketState>,
    acquisitions: u64,
}

/// Shared cooldown state. Every read-modify-write happens under one lock, so
/// two concurrent invocations cannot both take the last slot.
#[derive(Clone, Default)]
pub struct CooldownStore {
    buckets: Arc<Mutex<Buckets>>,
}

impl CooldownStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How long until `key` has a free slot, without taking it.
    pub async fn peek(&self, key: &str, cooldown: &Cooldown) -> Result<(), Duration> {
        let buckets = self.buckets.lock().await;
        let now = Instant::now();
        match buckets.states.get(key) {
            Some(state) if !state.expired(now) && state.count >= cooldown.rate => {
                Err(cooldown.per.saturating_sub(now.duration_since(state.window_start)))
            }
            _ => Ok(()),
        }
    }

    /// Take a slot for `key`, or report how long until one frees up.
    pub async fn try_acquire(&self, key: &str, cooldown: &Cooldown) -> Result<(), Duration> {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();

        buckets.acquisitions += 1;
        if buckets.acquisitions % SWEEP_EVERY == 0 {
            let before = buckets.states.len();
            buckets.states.retain(|_, state| !state.expired(now));
            debug!(swept = before - buckets.states.len(), "Expired cooldown buckets swept");
        }

        let state = buckets.states.entry(key.to_string()).or_insert_with(|| BucketState {
            count: 0,
            window_start: now,
            per: cooldown.per,
        });

        // Reset window if expired.
        if now.duration_since(state.window_start) >= cooldown.per {
            state.count = 0;
            state.window_start = now;
            state.per = cooldown.per;
        }

        if state.count < cooldown.rate {
            state.count += 1;
            debug!(key = %key, count = state.count, rate = cooldown.rate, "Cooldown slot taken");
            Ok(())
        } else {
            let retry_after = cooldown.per.saturating_sub(now.duration_since(state.window_start));
            debug!(key = %key, retry_after_ms = retry_after.as_millis() as u64, "Cooldown active");
            Err(retry_after)
        }
    }

    /// Return a slot taken by [`try_acquire`](Self::try_acquire).
    pub async fn release(&self, key: &str) {
        let mut buckets = self.buckets.lock().await;
        if let Some(state) = buckets.states.get_mut(key) {
            state.count = state.count.saturating_sub(1);
            if state.count == 0 {
                buckets.states.remove(key);
            }
        }
    }

    pub async fn reset(&self, key: &str) {
        self.buckets.lock().await.states.remove(key);
    }

    /// Flush all expired buckets to free memory.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        self.buckets.lock().await.states.retain(|_, state| !state.expired(now));
    }

    pub async fn len(&self) -> usize {
        self.buckets.lock().await.states.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.buckets.lock().await.states.is_empty()
    }
}

/// Check adapter: fails with `OnCooldown` when no slot is free, and takes the
/// slot on commit.
pub struct CooldownCheck {
    cooldown: Cooldown,
    store: CooldownStore,
}

impl CooldownCheck {
    pub fn new(cooldown: Cooldown) -> Self {
        Self::with_store(cooldown, CooldownStore::new())
    }

    pub fn with_store(cooldown: Cooldown, store: CooldownStore) -> Self {
        Self { cooldown, store }
    }

    pub fn cooldown(&self) -> Cooldown {
        self.cooldown
    }

    pub fn store(&self) -> &CooldownStore {
        &self.store
    }

    fn key(&self, ctx: &InvocationContext) -> String {
        format!("{}:{}", ctx.qualified_name(), self.cooldown.bucket.key(ctx))
    }
}

#[async_trait]
impl Check for CooldownCheck {
    fn name(&self) -> &str {
        "cooldown"
    }

    async fn check(&self, ctx: &InvocationContext) -> Result<bool> {
        match self.store.peek(&self.key(ctx), &self.cooldown).await {
            Ok(()) => Ok(true),
            Err(retry_after) => Err(CommandError::OnCooldown { retry_after }.into()),
        }
    }

    async fn commit(&self, ctx: &InvocationContext) -> Result<(), CommandError> {
        self.store
            .try_acquire(&self.key(ctx), &self.cooldown)
            .await
            .map_err(|retry_after| CommandError::OnCooldown { retry_after })
    }

    async fn revert(&self, ctx: &InvocationContext) {
        self.store.release(&self.key(ctx)).await;
    }
}
