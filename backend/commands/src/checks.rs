/// Checks: predicates gating invocation, evaluated in declared order.
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use slashforge_core::{CommandError, Permissions, RoleId, UserId};
use tracing::debug;

use crate::context::InvocationContext;

// ---------------------------------------------------------------------------
// Check trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Check: Send + Sync {
    /// Human-readable name for logging and `CheckFailed` errors.
    fn name(&self) -> &str;

    /// `Ok(false)` or any error rejects the invocation.
    async fn check(&self, ctx: &InvocationContext) -> Result<bool>;

    /// Apply side effects once every check has passed. Checks must not mutate
    /// shared state in [`check`](Self::check).
    async fn commit(&self, _ctx: &InvocationContext) -> Result<(), CommandError> {
        Ok(())
    }

    /// Undo a [`commit`](Self::commit) when a later commit fails.
    async fn revert(&self, _ctx: &InvocationContext) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct CheckPipeline;

impl CheckPipeline {
    /// Run `checks` in order, stopping at the first rejection, then commit
    /// them all. Nothing is committed for a rejected invocation.
    ///
    /// `OnCooldown` raised by a check passes through unchanged; every other
    /// rejection becomes `CheckFailed` with the failing index.
    pub async fn evaluate(checks: &[Arc<dyn Check>], ctx: &InvocationContext) -> Result<(), CommandError> {
        for (index, check) in checks.iter().enumerate() {
            let failure = match check.check(ctx).await {
                Ok(true) => {
                    debug!("[Commands] Check #{index} ({}) passed for /{}", check.name(), ctx.qualified_name());
                    continue;
                }
                Ok(false) => CommandError::CheckFailed { index, check: check.name().to_string(), reason: None },
                Err(err) => match err.downcast::<CommandError>() {
                    Ok(err @ CommandError::OnCooldown { .. }) => err,
                    Ok(err) => CommandError::CheckFailed {
                        index,
                        check: check.name().to_string(),
                        reason: Some(err.to_string()),
                    },
                    Err(err) => CommandError::CheckFailed {
                        index,
                        check: check.name().to_string(),
                        reason: Some(err.to_string()),
                    },
                },
            };

            debug!("[Commands] Check #{index} ({}) rejected /{}: {failure}", check.name(), ctx.qualified_name());
            return Err(failure);
        }

        for (index, check) in checks.iter().enumerate() {
            if let Err(err) = check.commit(ctx).await {
                debug!("[Commands] Commit #{index} ({}) failed for /{}: {err}", check.name(), ctx.qualified_name());
                for committed in checks[..index].iter().rev() {
                    committed.revert(ctx).await;
                }
                return Err(err);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Built-in checks
// ---------------------------------------------------------------------------

pub struct IsOwner {
    owners: HashSet<UserId>,
}

#[async_trait]
impl Check for IsOwner {
    fn name(&self) -> &str {
        "is_owner"
    }

    async fn check(&self, ctx: &InvocationContext) -> Result<bool> {
        Ok(self.owners.contains(&ctx.invoker().user_id))
    }
}

/// Passes only for the configured bot owners.
pub fn is_owner<I, T>(owners: I) -> Arc<dyn Check>
where
    I: IntoIterator<Item = T>,
    T: Into<UserId>,
{
    Arc::new(IsOwner { owners: owners.into_iter().map(Into::into).collect() })
}

pub struct HasPermissions {
    required: Permissions,
}

#[async_trait]
impl Check for HasPermissions {
    fn name(&self) -> &str {
        "has_permissions"
    }

    async fn check(&self, ctx: &InvocationContext) -> Result<bool> {
        let missing = ctx.invoker().permissions.missing(self.required);
        if !missing.is_empty() {
            bail!("missing permissions {missing}");
        }
        Ok(true)
    }
}

/// Passes when the invoker holds every bit of `required` (administrators hold all).
pub fn has_permissions(required: Permissions) -> Arc<dyn Check> {
    Arc::new(HasPermissions { required })
}

pub struct HasRole {
    name: &'static str,
    roles: HashSet<RoleId>,
    require_all: bool,
}

#[async_trait]
impl Check for HasRole {
    fn name(&self) -> &str {
        self.name
    }

    async fn check(&self, ctx: &InvocationContext) -> Result<bool> {
        let held: HashSet<RoleId> = ctx.invoker().roles.iter().copied().collect();
        Ok(if self.require_all {
            self.roles.is_subset(&held)
        } else {
            !self.roles.is_disjoint(&held)
        })
    }
}

pub fn has_role(role: impl Into<RoleId>) -> Arc<dyn Check> {
    Arc::new(HasRole { name: "has_role", roles: HashSet::from([role.into()]), require_all: true })
}

pub fn has_any_role<I, T>(roles: I) -> Arc<dyn Check>
where
    I: IntoIterator<Item = T>,
    T: Into<RoleId>,
{
    Arc::new(HasRole {
        name: "has_any_role",
        roles: roles.into_iter().map(Into::into).collect(),
        require_all: false,
    })
}

/// Where an invocation must come from.
pub struct Location {
    in_guild: bool,
}

#[async_trait]
impl Check for Location {
    fn name(&self) -> &str {
        if self.in_guild { "guild_only" } else { "dm_only" }
    }

    async fn check(&self, ctx: &InvocationContext) -> Result<bool> {
        Ok(ctx.invoker().is_direct_message() != self.in_guild)
    }
}

pub fn guild_only() -> Arc<dyn Check> {
    Arc::new(Location { in_guild: true })
}

pub fn dm_only() -> Arc<dyn Check> {
    Arc::new(Location { in_guild: false })
}

/// A check from an async closure.
pub struct FnCheck<F> {
    name: String,
    predicate: F,
}

#[async_trait]
impl<F, Fut> Check for FnCheck<F>
where
    F: Fn(&InvocationContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, ctx: &InvocationContext) -> Result<bool> {
        (self.predicate)(ctx).await
    }
}

/// Wrap a predicate. The returned future must not borrow the context, so read
/// what you need before the `async move` block.
pub fn check_fn<F, Fut>(name: impl Into<String>, predicate: F) -> Arc<dyn Check>
where
    F: Fn(&InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    Arc::new(FnCheck { name: name.into(), predicate })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use slashforge_core::{InteractionToken, Invoker, Snowflake};
    use tokio::time::Instant;

    use crate::arguments::BoundArguments;
    use crate::builder::CommandBuilder;
    use crate::context::{Responder, ResponseWindows};
    use crate::cooldown::{Cooldown, CooldownBucket, CooldownCheck};
    use crate::testing::RecordingSink;
    use crate::tree::CommandTree;

    async fn context(invoker: Invoker) -> InvocationContext {
        let tree = CommandTree::new();
        let node = CommandBuilder::new("secure", "Guarded").handler(|_| async { Ok(()) }).build().unwrap();
        tree.register(node).await.unwrap();
        let resolved = tree.resolve("secure", invoker.guild_id).await.unwrap();
        let responder = Responder::new(
            InteractionToken::new("tok-check"),
            Arc::new(RecordingSink::default()),
            Instant::now(),
            ResponseWindows::default(),
            Arc::new(AtomicBool::new(true)),
        );
        InvocationContext::new(resolved, invoker, BoundArguments::new(), responder)
    }

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Check for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn check(&self, _ctx: &InvocationContext) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    #[tokio::test]
    async fn first_failure_short_circuits() {
        let ctx = context(Invoker::new(7u64).in_guild(1u64)).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let checks: Vec<Arc<dyn Check>> = vec![
            has_permissions(Permissions::BAN_MEMBERS),
            Arc::new(Counting { calls: calls.clone() }),
        ];
        let err = CheckPipeline::evaluate(&checks, &ctx).await.unwrap_err();
        match err {
            CommandError::CheckFailed { index, check, reason } => {
                assert_eq!(index, 0);
                assert_eq!(check, "has_permissions");
                assert!(reason.unwrap().contains("missing permissions"));
            }
            other => panic!("expected CheckFailed, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn all_checks_must_pass() {
        let invoker = Invoker::new(7u64)
            .in_guild(1u64)
            .with_permissions(Permissions::ADMINISTRATOR)
            .with_roles([40u64]);
        let ctx = context(invoker).await;
        let checks = vec![
            has_permissions(Permissions::BAN_MEMBERS | Permissions::KICK_MEMBERS),
            is_owner([7u64]),
            has_role(40u64),
            has_any_role([1u64, 40u64]),
            guild_only(),
        ];
        assert!(CheckPipeline::evaluate(&checks, &ctx).await.is_ok());

        let checks = vec![guild_only(), dm_only()];
        let err = CheckPipeline::evaluate(&checks, &ctx).await.unwrap_err();
        assert!(matches!(err, CommandError::CheckFailed { index: 1, .. }));
    }

    #[tokio::test]
    async fn non_owner_rejected() {
        let ctx = context(Invoker::new(8u64)).await;
        let err = CheckPipeline::evaluate(&[is_owner([7u64])], &ctx).await.unwrap_err();
        assert!(matches!(err, CommandError::CheckFailed { index: 0, reason: None, .. }));
    }

    #[tokio::test]
    async fn closure_checks_compose() {
        let ctx = context(Invoker::new(8u64)).await;
        let even_user = check_fn("even_user", |ctx: &InvocationContext| {
            let id = ctx.invoker().user_id;
            async move { Ok(id.0 % 2 == 0) }
        });
        let failing = check_fn("flaky", |_ctx: &InvocationContext| async {
            Err::<bool, _>(anyhow::anyhow!("backend down"))
        });
        assert!(CheckPipeline::evaluate(&[even_user.clone()], &ctx).await.is_ok());
        let err = CheckPipeline::evaluate(&[even_user, failing], &ctx).await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::CheckFailed { index: 1, ref reason, .. } if reason.as_deref() == Some("backend down")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_invocation_does_not_consume_cooldown() {
        let ctx = context(Invoker::new(Snowflake(3))).await;
        let cooldown = Arc::new(CooldownCheck::new(Cooldown::new(
            1,
            Duration::from_secs(30),
            CooldownBucket::User,
        )));
        let checks: Vec<Arc<dyn Check>> = vec![cooldown.clone(), is_owner([99u64])];
        let err = CheckPipeline::evaluate(&checks, &ctx).await.unwrap_err();
        assert!(matches!(err, CommandError::CheckFailed { index: 1, .. }));
        assert!(cooldown.store().is_empty().await);

        let checks: Vec<Arc<dyn Check>> = vec![cooldown.clone()];
        CheckPipeline::evaluate(&checks, &ctx).await.unwrap();
        let err = CheckPipeline::evaluate(&checks, &ctx).await.unwrap_err();
        assert!(matches!(err, CommandError::OnCooldown { retry_after } if retry_after == Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn pending_rejection_does_not_block_concurrent_invocation() {
        let ctx = context(Invoker::new(Snowflake(1))).await;
        let cooldown: Arc<dyn Check> =
            Arc::new(CooldownCheck::new(Cooldown::new(1, Duration::from_secs(30), CooldownBucket::User)));
        let slow_reject = check_fn("slow_reject", |_ctx: &InvocationContext| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<bool, anyhow::Error>(false)
        });

        let rejected = vec![cooldown.clone(), slow_reject];
        let allowed = vec![cooldown.clone()];
        let (first, second) = tokio::join!(CheckPipeline::evaluate(&rejected, &ctx), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            CheckPipeline::evaluate(&allowed, &ctx).await
        });

        assert!(matches!(first, Err(CommandError::CheckFailed { index: 1, .. })));
        assert!(second.is_ok());
        let err = CheckPipeline::evaluate(&allowed, &ctx).await.unwrap_err();
        assert!(matches!(err, CommandError::OnCooldown { .. }));
    }

    struct LostRace;

    #[async_trait]
    impl Check for LostRace {
        fn name(&self) -> &str {
            "lost_race"
        }

        async fn check(&self, _ctx: &InvocationContext) -> Result<bool> {
            Ok(true)
        }

        async fn commit(&self, _ctx: &InvocationContext) -> Result<(), CommandError> {
            Err(CommandError::OnCooldown { retry_after: Duration::from_secs(1) })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_commit_reverts_earlier_slots() {
        let ctx = context(Invoker::new(Snowflake(5))).await;
        let per_user = Arc::new(CooldownCheck::new(Cooldown::new(1, Duration::from_secs(30), CooldownBucket::User)));

        let checks: Vec<Arc<dyn Check>> = vec![per_user.clone(), Arc::new(LostRace)];
        let err = CheckPipeline::evaluate(&checks, &ctx).await.unwrap_err();
        assert!(matches!(err, CommandError::OnCooldown { .. }));
        assert!(per_user.store().is_empty().await);

        let checks: Vec<Arc<dyn Check>> = vec![per_user.clone()];
        assert!(CheckPipeline::evaluate(&checks, &ctx).await.is_ok());
    }
}
