//! Command tree: top-level nodes indexed by (name, scope).
//!
//! Registration takes the write lock; resolution only reads, so dispatches
//! never observe a half-registered tree.

use std::fmt;
use std::sync::Arc;

use slashforge_core::{CommandError, GuildId, Scope};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::checks::Check;
use crate::events::ErrorListener;
use crate::node::{CommandManifest, CommandNode, LeafCommand};

/// A path resolved down to one leaf, plus everything inherited on the way.
#[derive(Clone)]
pub struct ResolvedCommand {
    pub root: Arc<CommandNode>,
    pub leaf: Arc<CommandNode>,
    /// Space-joined path, e.g. `"base group command"`.
    pub qualified_name: String,
    /// Checks of every node on the path, root first.
    pub checks: Vec<Arc<dyn Check>>,
    /// Error handler of the nearest node on the path that declares one.
    pub error_handler: Option<Arc<dyn ErrorListener>>,
}

impl ResolvedCommand {
    pub fn leaf_command(&self) -> &LeafCommand {
        match self.leaf.as_leaf() {
            Some(leaf) => leaf,
            None => unreachable!("resolution only ends on leaves"),
        }
    }
}

impl fmt::Debug for ResolvedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCommand")
            .field("qualified_name", &self.qualified_name)
            .field("scope", self.root.scope())
            .field("checks", &self.checks.len())
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

/// Split a command path on whitespace and dots.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split(|c: char| c.is_whitespace() || c == '.')
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Default, Clone)]
pub struct CommandTree {
    roots: Arc<RwLock<Vec<Arc<CommandNode>>>>,
}

impl CommandTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a top-level node. Names are exclusive across overlapping scopes.
    pub async fn register(&self, node: CommandNode) -> Result<(), CommandError> {
        node.validate(None, 0)?;
        let mut roots = self.roots.write().await;
        if roots
            .iter()
            .any(|existing| existing.name() == node.name() && existing.scope().overlaps(node.scope()))
        {
            return Err(CommandError::DuplicateCommand { name: node.name().to_string() });
        }
        info!("[Commands] Registered /{} ({})", node.name(), node.scope());
        roots.push(Arc::new(node));
        Ok(())
    }

    /// Remove the node registered as exactly (`name`, `scope`).
    /// Returns whether anything was removed.
    pub async fn unregister(&self, name: &str, scope: &Scope) -> bool {
        let mut roots = self.roots.write().await;
        let before = roots.len();
        roots.retain(|node| !(node.name() == name && node.scope() == scope));
        let removed = roots.len() != before;
        if removed {
            info!("[Commands] Unregistered /{name} ({scope})");
        }
        removed
    }

    /// Top-level nodes visible from `guild` (`None` for direct messages), in
    /// registration order.
    pub async fn commands(&self, guild: Option<GuildId>) -> Vec<Arc<CommandNode>> {
        self.roots
            .read()
            .await
            .iter()
            .filter(|node| node.scope().covers(guild) && (guild.is_some() || node.dm_permission()))
            .cloned()
            .collect()
    }

    /// Manifests of every registered node. Each carries its scope; callers
    /// sync entries to their own scope.
    pub async fn manifests(&self) -> Vec<CommandManifest> {
        self.roots.read().await.iter().map(|node| node.manifest()).collect()
    }

    pub async fn len(&self) -> usize {
        self.roots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.roots.read().await.is_empty()
    }

    /// Walk `path` from the top-level node visible in `guild` down to a leaf.
    ///
    /// Paths ending on a fork, or continuing past a leaf, are unknown.
    pub async fn resolve(&self, path: &str, guild: Option<GuildId>) -> Result<ResolvedCommand, CommandError> {
        let unknown = || CommandError::UnknownCommand { path: path.trim().to_string() };
        let segments = split_path(path);
        let (first, rest) = segments.split_first().ok_or_else(unknown)?;

        let root = {
            let roots = self.roots.read().await;
            roots
                .iter()
                .find(|node| node.name() == *first && node.scope().covers(guild))
                .cloned()
                .ok_or_else(unknown)?
        };
        if guild.is_none() && !root.dm_permission() {
            debug!("[Commands] /{} is not available in direct messages", root.name());
            return Err(unknown());
        }

        let mut checks: Vec<Arc<dyn Check>> = root.checks().to_vec();
        let mut error_handler = root.error_handler().cloned();
        let mut node = Arc::clone(&root);
        for segment in rest {
            let child = node.child(segment).cloned().ok_or_else(unknown)?;
            checks.extend(child.checks().iter().cloned());
            if let Some(handler) = child.error_handler() {
                error_handler = Some(Arc::clone(handler));
            }
            node = child;
        }
        if !node.is_leaf() {
            return Err(unknown());
        }

        let mut qualified = vec![*first];
        qualified.extend(rest.iter().copied());
        Ok(ResolvedCommand {
            root,
            leaf: node,
            qualified_name: qualified.join(" "),
            checks,
            error_handler,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CommandBuilder;
    use crate::checks::guild_only;
    use slashforge_core::Snowflake;

    fn leaf(name: &str) -> CommandBuilder {
        CommandBuilder::new(name, "Does a thing").handler(|_ctx| async { Ok(()) })
    }

    #[tokio::test]
    async fn duplicate_in_same_scope_rejected() {
        let tree = CommandTree::new();
        tree.register(leaf("ping").build().unwrap()).await.unwrap();
        let err = tree.register(leaf("ping").build().unwrap()).await.unwrap_err();
        assert!(matches!(err, CommandError::DuplicateCommand { ref name } if name == "ping"));
    }

    #[tokio::test]
    async fn disjoint_guild_scopes_coexist() {
        let tree = CommandTree::new();
        tree.register(leaf("ping").guild(1u64).build().unwrap()).await.unwrap();
        tree.register(leaf("ping").guild(2u64).build().unwrap()).await.unwrap();
        assert_eq!(tree.len().await, 2);

        // Global overlaps every guild scope.
        let err = tree.register(leaf("ping").build().unwrap()).await.unwrap_err();
        assert!(matches!(err, CommandError::DuplicateCommand { .. }));

        // Overlapping guild sets collide too.
        let overlapping = leaf("ping").scope(Scope::guilds([2u64, 3u64])).build().unwrap();
        assert!(tree.register(overlapping).await.is_err());

        let in_one = tree.resolve("ping", Some(Snowflake(1))).await.unwrap();
        assert_eq!(in_one.root.scope(), &Scope::guild(1u64));
        assert!(tree.resolve("ping", Some(Snowflake(9))).await.is_err());
        assert!(tree.resolve("ping", None).await.is_err());
    }

    #[tokio::test]
    async fn fork_alone_is_unknown() {
        let tree = CommandTree::new();
        let base = CommandBuilder::new("base", "Base")
            .subcommand(CommandBuilder::new("group", "Group").subcommand(leaf("command")))
            .build()
            .unwrap();
        tree.register(base).await.unwrap();

        for path in ["base", "base group", "base group command extra", "base other", ""] {
            let err = tree.resolve(path, None).await.unwrap_err();
            assert!(matches!(err, CommandError::UnknownCommand { .. }), "{path}");
        }

        let resolved = tree.resolve("base group command", None).await.unwrap();
        assert_eq!(resolved.qualified_name, "base group command");
        let dotted = tree.resolve("base.group.command", None).await.unwrap();
        assert_eq!(dotted.qualified_name, "base group command");
    }

    #[tokio::test]
    async fn checks_and_handler_inherit_along_path() {
        let tree = CommandTree::new();
        let node = CommandBuilder::new("admin", "Admin tools")
            .check(guild_only())
            .subcommand(leaf("ban").check(guild_only()))
            .build()
            .unwrap();
        tree.register(node).await.unwrap();

        let resolved = tree.resolve("admin ban", Some(Snowflake(1))).await.unwrap();
        assert_eq!(resolved.checks.len(), 2);
        assert!(resolved.error_handler.is_none());
    }

    #[tokio::test]
    async fn dm_permission_hides_command_in_dms() {
        let tree = CommandTree::new();
        tree.register(leaf("config").dm_permission(false).build().unwrap()).await.unwrap();
        assert!(tree.resolve("config", None).await.is_err());
        assert!(tree.resolve("config", Some(Snowflake(5))).await.is_ok());
        assert!(tree.commands(None).await.is_empty());
        assert_eq!(tree.commands(Some(Snowflake(5))).await.len(), 1);
    }

    #[tokio::test]
    async fn unregister_frees_the_name() {
        let tree = CommandTree::new();
        tree.register(leaf("ping").build().unwrap()).await.unwrap();
        assert!(!tree.unregister("ping", &Scope::guild(1u64)).await);
        assert!(tree.unregister("ping", &Scope::Global).await);
        assert!(tree.is_empty().await);
        tree.register(leaf("ping").build().unwrap()).await.unwrap();
    }
}
