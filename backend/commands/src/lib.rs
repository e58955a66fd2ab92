//! `slashforge-commands`: slash command registration and dispatch.
//!
//! Commands are declared with [`CommandBuilder`], validated into
//! [`CommandNode`]s and registered on a [`CommandTree`]. The [`Dispatcher`]
//! resolves each inbound interaction, binds its arguments, runs checks and
//! invokes the callback under the platform response windows. Failures are
//! published on the [`EventBus`].

pub mod arguments;
pub mod autocomplete;
pub mod builder;
pub mod checks;
pub mod context;
pub mod cooldown;
pub mod default_handler;
pub mod dispatcher;
pub mod events;
pub mod node;
pub mod option;
pub mod resolver;
pub mod testing;
pub mod tree;
pub mod value;

pub use arguments::{BoundArgument, BoundArguments};
pub use autocomplete::{AutocompleteContext, AutocompleteHandler, AutocompleteOutcome, autocomplete_fn};
pub use builder::CommandBuilder;
pub use checks::{Check, CheckPipeline, check_fn, dm_only, guild_only, has_any_role, has_permissions, has_role, is_owner};
pub use context::{InvocationContext, Responder, ResponseSnapshot, ResponseStatus, ResponseWindows};
pub use cooldown::{Cooldown, CooldownBucket, CooldownCheck, CooldownStore};
pub use default_handler::DefaultErrorHandler;
pub use dispatcher::{DispatchOutcome, DispatchState, Dispatcher, InteractionOutcome};
pub use events::{ErrorEvent, ErrorListener, ErrorSource, EventBus};
pub use node::{CommandCallback, CommandManifest, CommandNode, NodeKind, callback_fn};
pub use option::{BoundValue, ManifestOption, OptionSchema, OptionType};
pub use tree::{CommandTree, ResolvedCommand};
pub use value::{EntityRef, FromOptionValue, OptionValue};
