//! Command nodes: leaves carrying a callback, forks carrying children.
//!
//! Nodes are produced by [`CommandBuilder`](crate::builder::CommandBuilder) and
//! are immutable once built. Shape rules are checked by [`CommandNode::validate`]
//! at build time and again when a node is registered.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use slashforge_core::{CommandError, Permissions, Scope};

use crate::autocomplete::AutocompleteHandler;
use crate::checks::Check;
use crate::context::InvocationContext;
use crate::events::ErrorListener;
use crate::option::{MAX_ENTRIES, ManifestOption, OptionSchema, validate_description, validate_name};

/// Deepest level a node may sit at: top-level (0) → group (1) → subcommand (2).
pub const MAX_DEPTH: usize = 2;

const SUBCOMMAND: u8 = 1;
const SUBCOMMAND_GROUP: u8 = 2;
const CHAT_INPUT: u8 = 1;

// ---------------------------------------------------------------------------
// Callback
// ---------------------------------------------------------------------------

/// User code behind a leaf command.
#[async_trait]
pub trait CommandCallback: Send + Sync {
    async fn invoke(&self, ctx: Arc<InvocationContext>) -> Result<()>;
}

/// Adapter turning an async closure into a [`CommandCallback`].
pub struct FnCallback<F>(F);

#[async_trait]
impl<F, Fut> CommandCallback for FnCallback<F>
where
    F: Fn(Arc<InvocationContext>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn invoke(&self, ctx: Arc<InvocationContext>) -> Result<()> {
        (self.0)(ctx).await
    }
}

pub fn callback_fn<F, Fut>(f: F) -> Arc<dyn CommandCallback>
where
    F: Fn(Arc<InvocationContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnCallback(f))
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Maps a declared option onto the callback parameter that receives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamBinding {
    pub option: String,
    pub param: String,
}

pub struct LeafCommand {
    pub(crate) callback: Arc<dyn CommandCallback>,
    pub(crate) options: Vec<OptionSchema>,
    pub(crate) params: Vec<ParamBinding>,
    pub(crate) autocomplete: HashMap<String, Arc<dyn AutocompleteHandler>>,
}

impl LeafCommand {
    pub fn options(&self) -> &[OptionSchema] {
        &self.options
    }

    pub fn params(&self) -> &[ParamBinding] {
        &self.params
    }

    pub fn option(&self, name: &str) -> Option<&OptionSchema> {
        self.options.iter().find(|o| o.name == name)
    }

    /// Parameter receiving `option`; the option name itself when not renamed.
    pub fn param_for<'a>(&'a self, option: &'a str) -> &'a str {
        self.params
            .iter()
            .find(|p| p.option == option)
            .map(|p| p.param.as_str())
            .unwrap_or(option)
    }

    pub fn autocomplete_handler(&self, option: &str) -> Option<Arc<dyn AutocompleteHandler>> {
        self.autocomplete.get(option).cloned()
    }
}

pub enum NodeKind {
    Leaf(LeafCommand),
    /// A group (at the top level) or subcommand group (one level down).
    Group(Vec<Arc<CommandNode>>),
}

pub struct CommandNode {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) scope: Scope,
    pub(crate) default_member_permissions: Option<Permissions>,
    pub(crate) dm_permission: bool,
    pub(crate) checks: Vec<Arc<dyn Check>>,
    pub(crate) error_handler: Option<Arc<dyn ErrorListener>>,
    pub(crate) kind: NodeKind,
}

impl fmt::Debug for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("CommandNode");
        s.field("name", &self.name).field("scope", &self.scope);
        match &self.kind {
            NodeKind::Leaf(leaf) => s.field("options", &leaf.options.len()),
            NodeKind::Group(children) => {
                let names: Vec<&str> = children.iter().map(|c| c.name.as_str()).collect();
                s.field("children", &names)
            }
        };
        s.field("checks", &self.checks.len()).finish()
    }
}

impl CommandNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn default_member_permissions(&self) -> Option<Permissions> {
        self.default_member_permissions
    }

    pub fn dm_permission(&self) -> bool {
        self.dm_permission
    }

    pub fn checks(&self) -> &[Arc<dyn Check>] {
        &self.checks
    }

    pub fn error_handler(&self) -> Option<&Arc<dyn ErrorListener>> {
        self.error_handler.as_ref()
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn as_leaf(&self) -> Option<&LeafCommand> {
        match &self.kind {
            NodeKind::Leaf(leaf) => Some(leaf),
            NodeKind::Group(_) => None,
        }
    }

    pub fn children(&self) -> &[Arc<CommandNode>] {
        match &self.kind {
            NodeKind::Leaf(_) => &[],
            NodeKind::Group(children) => children,
        }
    }

    pub fn child(&self, name: &str) -> Option<&Arc<CommandNode>> {
        self.children().iter().find(|c| c.name == name)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    /// Check every shape rule for this node and its descendants.
    /// `depth` is 0 for a top-level command.
    pub fn validate(&self, parent_path: Option<&str>, depth: usize) -> Result<(), CommandError> {
        let path = match parent_path {
            Some(parent) => format!("{parent} {}", self.name),
            None => self.name.clone(),
        };
        validate_name(&path, &self.name)?;
        validate_description(&path, &self.description)?;

        if depth > 0 {
            if self.default_member_permissions.is_some() || !self.dm_permission {
                return Err(CommandError::invalid_shape(
                    &path,
                    "default_member_permissions and dm_permission are only valid on top-level commands",
                ));
            }
            if self.scope != Scope::Global {
                return Err(CommandError::invalid_shape(&path, "scope is only valid on top-level commands"));
            }
        }
        if let Scope::Guilds(guilds) = &self.scope {
            if guilds.is_empty() {
                return Err(CommandError::invalid_shape(&path, "guild scope must name at least one guild"));
            }
        }

        match &self.kind {
            NodeKind::Group(children) => {
                if depth >= MAX_DEPTH {
                    return Err(CommandError::invalid_shape(
                        &path,
                        "subcommand groups may only contain subcommands",
                    ));
                }
                if children.is_empty() {
                    return Err(CommandError::invalid_shape(&path, "a group needs at least one subcommand"));
                }
                if children.len() > MAX_ENTRIES {
                    return Err(CommandError::invalid_shape(
                        &path,
                        format!("{} subcommands declared, at most {MAX_ENTRIES} allowed", children.len()),
                    ));
                }
                let mut seen = HashSet::new();
                for child in children {
                    if !seen.insert(child.name.as_str()) {
                        return Err(CommandError::invalid_shape(
                            &path,
                            format!("duplicate subcommand '{}'", child.name),
                        ));
                    }
                    child.validate(Some(&path), depth + 1)?;
                }
            }
            NodeKind::Leaf(leaf) => validate_leaf(&path, leaf)?,
        }
        Ok(())
    }

    /// Serializable description used for platform sync.
    pub fn manifest(&self) -> CommandManifest {
        CommandManifest {
            kind: CHAT_INPUT,
            name: self.name.clone(),
            description: self.description.clone(),
            scope: self.scope.clone(),
            default_member_permissions: self.default_member_permissions.map(|p| p.bits().to_string()),
            dm_permission: self.dm_permission,
            options: self.manifest_options(),
        }
    }

    fn manifest_options(&self) -> Vec<ManifestOption> {
        match &self.kind {
            NodeKind::Leaf(leaf) => leaf.options.iter().map(OptionSchema::manifest).collect(),
            NodeKind::Group(children) => children.iter().map(|c| c.child_manifest()).collect(),
        }
    }

    fn child_manifest(&self) -> ManifestOption {
        ManifestOption {
            kind: if self.is_leaf() { SUBCOMMAND } else { SUBCOMMAND_GROUP },
            name: self.name.clone(),
            description: self.description.clone(),
            required: false,
            choices: Vec::new(),
            autocomplete: false,
            min_value: None,
            max_value: None,
            min_length: None,
            max_length: None,
            channel_types: Vec::new(),
            options: self.manifest_options(),
        }
    }
}

fn validate_leaf(path: &str, leaf: &LeafCommand) -> Result<(), CommandError> {
    if leaf.options.len() > MAX_ENTRIES {
        return Err(CommandError::invalid_shape(
            path,
            format!("{} options declared, at most {MAX_ENTRIES} allowed", leaf.options.len()),
        ));
    }

    let mut names = HashSet::new();
    let mut seen_optional = false;
    for option in &leaf.options {
        option.validate(path)?;
        if !names.insert(option.name.as_str()) {
            return Err(CommandError::invalid_shape(path, format!("duplicate option '{}'", option.name)));
        }
        if option.required && seen_optional {
            return Err(CommandError::invalid_shape(
                path,
                format!("required option '{}' follows an optional option", option.name),
            ));
        }
        seen_optional |= !option.required;
    }

    let mut params = HashSet::new();
    for binding in &leaf.params {
        if !names.contains(binding.option.as_str()) {
            return Err(CommandError::invalid_shape(
                path,
                format!("parameter '{}' is bound to undeclared option '{}'", binding.param, binding.option),
            ));
        }
        if binding.param.is_empty() {
            return Err(CommandError::invalid_shape(path, format!("option '{}' has an empty parameter name", binding.option)));
        }
        if !params.insert(binding.param.as_str()) {
            return Err(CommandError::invalid_shape(
                path,
                format!("parameter '{}' receives more than one option", binding.param),
            ));
        }
    }
    if leaf.params.len() != leaf.options.len() {
        return Err(CommandError::invalid_shape(path, "every option needs exactly one parameter binding"));
    }

    for option in leaf.autocomplete.keys() {
        match leaf.option(option) {
            Some(schema) if schema.autocomplete => {}
            Some(_) => {
                return Err(CommandError::invalid_shape(
                    path,
                    format!("option '{option}' has an autocomplete handler but is not marked autocomplete"),
                ));
            }
            None => {
                return Err(CommandError::invalid_shape(
                    path,
                    format!("autocomplete handler registered for undeclared option '{option}'"),
                ));
            }
        }
    }
    Ok(())
}

/// Registration payload for one top-level command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandManifest {
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: String,
    pub description: String,
    pub scope: Scope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_member_permissions: Option<String>,
    pub dm_permission: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ManifestOption>,
}
