//! Command builder.
//!
//! Options, checks and handlers accumulate on a mutable draft; `build()` turns
//! the draft into an immutable, validated [`CommandNode`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use slashforge_core::{CommandError, GuildId, Permissions, Scope};

use crate::autocomplete::AutocompleteHandler;
use crate::checks::Check;
use crate::context::InvocationContext;
use crate::cooldown::{Cooldown, CooldownBucket, CooldownCheck};
use crate::events::ErrorListener;
use crate::node::{CommandCallback, CommandNode, LeafCommand, NodeKind, ParamBinding, callback_fn};
use crate::option::OptionSchema;

pub struct CommandBuilder {
    name: String,
    description: String,
    scope: Scope,
    default_member_permissions: Option<Permissions>,
    dm_permission: bool,
    options: Vec<OptionSchema>,
    renames: Vec<(String, String)>,
    checks: Vec<Arc<dyn Check>>,
    error_handler: Option<Arc<dyn ErrorListener>>,
    callback: Option<Arc<dyn CommandCallback>>,
    autocomplete: Vec<(String, Arc<dyn AutocompleteHandler>)>,
    children: Vec<CommandBuilder>,
}

impl CommandBuilder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            scope: Scope::Global,
            default_member_permissions: None,
            dm_permission: true,
            options: Vec::new(),
            renames: Vec::new(),
            checks: Vec::new(),
            error_handler: None,
            callback: None,
            autocomplete: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Restrict the command to a single guild.
    pub fn guild(self, guild: impl Into<GuildId>) -> Self {
        self.scope(Scope::guild(guild))
    }

    pub fn default_member_permissions(mut self, permissions: Permissions) -> Self {
        self.default_member_permissions = Some(permissions);
        self
    }

    pub fn dm_permission(mut self, allowed: bool) -> Self {
        self.dm_permission = allowed;
        self
    }

    pub fn option(mut self, option: OptionSchema) -> Self {
        self.options.push(option);
        self
    }

    /// Deliver `option` to the callback parameter `param` instead of a
    /// parameter of the same name.
    pub fn rename(mut self, option: impl Into<String>, param: impl Into<String>) -> Self {
        self.renames.push((option.into(), param.into()));
        self
    }

    pub fn check(mut self, check: Arc<dyn Check>) -> Self {
        self.checks.push(check);
        self
    }

    /// Append a cooldown to the check list at the current position.
    pub fn cooldown(self, rate: u32, per: Duration, bucket: CooldownBucket) -> Self {
        self.check(Arc::new(CooldownCheck::new(Cooldown::new(rate, per, bucket))))
    }

    pub fn error_handler(mut self, handler: Arc<dyn ErrorListener>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub fn callback(mut self, callback: Arc<dyn CommandCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Shorthand for [`callback`](Self::callback) with an async closure.
    pub fn handler<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Arc<InvocationContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.callback(callback_fn(f))
    }

    pub fn autocomplete(mut self, option: impl Into<String>, handler: Arc<dyn AutocompleteHandler>) -> Self {
        self.autocomplete.push((option.into(), handler));
        self
    }

    pub fn subcommand(mut self, child: CommandBuilder) -> Self {
        self.children.push(child);
        self
    }

    /// Finalize into a top-level node.
    pub fn build(self) -> Result<CommandNode, CommandError> {
        let node = self.assemble(None)?;
        node.validate(None, 0)?;
        Ok(node)
    }

    fn assemble(self, parent_path: Option<&str>) -> Result<CommandNode, CommandError> {
        let path = match parent_path {
            Some(parent) => format!("{parent} {}", self.name),
            None => self.name.clone(),
        };

        let kind = match (self.callback, self.children.is_empty()) {
            (Some(_), false) => {
                return Err(CommandError::invalid_shape(
                    &path,
                    "a command with subcommands cannot have its own callback",
                ));
            }
            (None, true) => {
                return Err(CommandError::invalid_shape(&path, "command has neither a callback nor subcommands"));
            }
            (None, false) => {
                if !self.options.is_empty() {
                    return Err(CommandError::invalid_shape(&path, "a command with subcommands cannot declare options"));
                }
                if !self.autocomplete.is_empty() {
                    return Err(CommandError::invalid_shape(
                        &path,
                        "a command with subcommands cannot declare autocomplete handlers",
                    ));
                }
                let children = self
                    .children
                    .into_iter()
                    .map(|child| child.assemble(Some(&path)).map(Arc::new))
                    .collect::<Result<Vec<_>, _>>()?;
                NodeKind::Group(children)
            }
            (Some(callback), true) => {
                let mut renames: HashMap<String, String> = HashMap::new();
                for (option, param) in self.renames {
                    if !self.options.iter().any(|o| o.name == option) {
                        return Err(CommandError::invalid_shape(
                            &path,
                            format!("rename refers to undeclared option '{option}'"),
                        ));
                    }
                    if renames.insert(option.clone(), param).is_some() {
                        return Err(CommandError::invalid_shape(&path, format!("option '{option}' renamed twice")));
                    }
                }
                let params = self
                    .options
                    .iter()
                    .map(|o| ParamBinding {
                        option: o.name.clone(),
                        param: renames.remove(&o.name).unwrap_or_else(|| o.name.clone()),
                    })
                    .collect();

                let mut autocomplete = HashMap::new();
                for (option, handler) in self.autocomplete {
                    if autocomplete.insert(option.clone(), handler).is_some() {
                        return Err(CommandError::invalid_shape(
                            &path,
                            format!("option '{option}' has more than one autocomplete handler"),
                        ));
                    }
                }

                NodeKind::Leaf(LeafCommand { callback, options: self.options, params, autocomplete })
            }
        };

        Ok(CommandNode {
            name: self.name,
            description: self.description,
            scope: self.scope,
            default_member_permissions: self.default_member_permissions,
            dm_permission: self.dm_permission,
            checks: self.checks,
            error_handler: self.error_handler,
            kind,
        })
    }
}
