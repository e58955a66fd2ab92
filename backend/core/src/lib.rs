pub mod entity;
pub mod error;
pub mod interaction;
pub mod report;
pub mod traits;
pub mod types;

pub use entity::{Attachment, Channel, ChannelType, Entity, EntityKind, Role, User};
pub use error::{CommandError, ErrorKind};
pub use interaction::{
    AutocompleteRequest, Choice, ChoiceValue, CommandInvocation, Interaction, InteractionToken,
    Invoker, RawOption, Reply,
};
pub use report::ErrorReport;
pub use traits::{ObservabilitySink, PlatformDirectory, ResponseSink};
pub use types::{ChannelId, GuildId, Permissions, RoleId, Scope, Snowflake, UserId};
