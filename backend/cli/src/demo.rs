//! Demo command tree and collaborators used by the CLI.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use slashforge_commands::testing::InMemoryDirectory;
use slashforge_commands::{
    CommandBuilder, CommandTree, CooldownBucket, DefaultErrorHandler, Dispatcher, EventBus, OptionSchema,
    autocomplete_fn, guild_only, has_permissions, is_owner,
};
use slashforge_core::{
    Channel, ChannelType, Choice, Entity, Permissions, Reply, ResponseSink, Role, Snowflake, User,
};
use slashforge_config::SlashForgeConfig;
use slashforge_logging::TracingObservabilitySink;

const TAGS: &[(&str, &str)] = &[
    ("rules", "Be kind. No spam."),
    ("rust", "https://www.rust-lang.org"),
    ("rustup", "curl https://sh.rustup.rs -sSf | sh"),
    ("tokio", "https://tokio.rs"),
    ("welcome", "Welcome aboard!"),
];

pub async fn tree(config: &SlashForgeConfig) -> Result<CommandTree> {
    let tree = CommandTree::new();
    for command in [ping(), math(), tag(), whois(), admin(config)] {
        tree.register(command.build()?).await?;
    }
    Ok(tree)
}

/// Directory seeded with the entities the sample interactions reference.
pub fn directory() -> InMemoryDirectory {
    InMemoryDirectory::new()
        .with(Entity::User(User { id: Snowflake(1), name: "ferris".into(), bot: false }))
        .with(Entity::User(User { id: Snowflake(2), name: "corro".into(), bot: false }))
        .with(Entity::Role(Role { id: Snowflake(40), name: "moderators".into(), permissions: Permissions::MANAGE_MESSAGES }))
        .with(Entity::Channel(Channel { id: Snowflake(600), name: "general".into(), kind: ChannelType::Text }))
        .with(Entity::Channel(Channel { id: Snowflake(601), name: "voice".into(), kind: ChannelType::Voice }))
}

pub async fn dispatcher(config: &SlashForgeConfig, sink: Arc<dyn ResponseSink>) -> Result<Arc<Dispatcher>> {
    let default_handler =
        DefaultErrorHandler::new(config.errors()).with_observability(Arc::new(TracingObservabilitySink));
    let bus = Arc::new(EventBus::new(Arc::new(default_handler)));
    Ok(Arc::new(Dispatcher::new(
        tree(config).await?,
        Arc::new(directory()),
        sink,
        bus,
        config.dispatch(),
    )))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn ping() -> CommandBuilder {
    CommandBuilder::new("ping", "Check that the bot is alive")
        .cooldown(1, Duration::from_secs(5), CooldownBucket::User)
        .handler(|ctx| async move {
            ctx.reply("pong").await?;
            Ok(())
        })
}

fn operand(name: &str, description: &str) -> OptionSchema {
    OptionSchema::integer(name, description)
        .required()
        .min_value(-1_000_000)
        .max_value(1_000_000)
}

fn math() -> CommandBuilder {
    CommandBuilder::new("math", "Integer arithmetic")
        .subcommand(
            CommandBuilder::new("add", "Add two integers")
                .option(operand("a", "Left operand"))
                .option(operand("b", "Right operand"))
                .handler(|ctx| async move {
                    let sum = ctx.args().require::<i64>("a")? + ctx.args().require::<i64>("b")?;
                    ctx.reply(sum.to_string()).await?;
                    Ok(())
                }),
        )
        .subcommand(
            CommandBuilder::new("sub", "Subtract two integers")
                .option(operand("a", "Left operand"))
                .option(operand("b", "Right operand"))
                .handler(|ctx| async move {
                    let diff = ctx.args().require::<i64>("a")? - ctx.args().require::<i64>("b")?;
                    ctx.reply(diff.to_string()).await?;
                    Ok(())
                }),
        )
}

fn tag() -> CommandBuilder {
    CommandBuilder::new("tag", "Show a saved snippet")
        .option(OptionSchema::string("name", "Tag name").required().max_length(32).autocomplete())
        .option(OptionSchema::boolean("private", "Only show it to you").default_value(false))
        .rename("private", "ephemeral")
        .autocomplete(
            "name",
            autocomplete_fn(|ctx| async move {
                let typed = ctx.current.to_lowercase();
                Ok(TAGS
                    .iter()
                    .filter(|(name, _)| name.starts_with(&typed))
                    .map(|(name, _)| Choice::new(*name, *name))
                    .collect::<Vec<_>>())
            }),
        )
        .handler(|ctx| async move {
            let name = ctx.args().require::<String>("name")?;
            let ephemeral = ctx.args().get::<bool>("ephemeral").unwrap_or(false);
            let body = TAGS
                .iter()
                .find(|(tag, _)| *tag == name)
                .map(|(_, body)| *body)
                .ok_or_else(|| anyhow!("no tag named '{name}'"))?;
            ctx.send(Reply { content: body.to_string(), ephemeral }).await?;
            Ok(())
        })
}

fn whois() -> CommandBuilder {
    CommandBuilder::new("whois", "Describe a member or role")
        .option(OptionSchema::mentionable("target", "Member or role"))
        .handler(|ctx| async move {
            let description = match ctx.args().get::<Entity>("target") {
                Some(Entity::User(user)) => format!("{} is a member (id {})", user.name, user.id),
                Some(Entity::Role(role)) => format!("@{} grants {}", role.name, role.permissions),
                Some(other) => format!("{} {}", other.kind(), other.id()),
                None => format!("You are {}", ctx.invoker().user_id),
            };
            ctx.reply(description).await?;
            Ok(())
        })
}

fn admin(config: &SlashForgeConfig) -> CommandBuilder {
    CommandBuilder::new("admin", "Moderation tools")
        .default_member_permissions(Permissions::MANAGE_MESSAGES)
        .dm_permission(false)
        .check(guild_only())
        .subcommand(
            CommandBuilder::new("purge", "Delete recent messages")
                .option(OptionSchema::integer("count", "How many messages").required().min_value(1).max_value(100))
                .option(OptionSchema::channel("channel", "Where to purge").channel_types([ChannelType::Text]))
                .check(has_permissions(Permissions::MANAGE_MESSAGES))
                .handler(|ctx| async move {
                    ctx.defer(true).await?;
                    let count = ctx.args().require::<i64>("count")?;
                    let channel = ctx
                        .args()
                        .get::<Channel>("channel")
                        .map(|c| format!("#{}", c.name))
                        .unwrap_or_else(|| "this channel".to_string());
                    tokio::time::sleep(Duration::from_millis(250)).await;
                    ctx.send(Reply::ephemeral(format!("Deleted {count} messages in {channel}."))).await?;
                    Ok(())
                }),
        )
        .subcommand(
            CommandBuilder::new("reload", "Reload command extensions")
                .check(is_owner(config.owners.iter().copied()))
                .handler(|ctx| async move {
                    ctx.reply("Extensions reloaded.").await?;
                    Ok(())
                }),
        )
}
