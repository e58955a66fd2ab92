//! Inbound interaction records and outbound response payloads.
//!
//! These are the structured records the transport hands to the engine after
//! it has already decoded the platform's JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{ChannelId, GuildId, Permissions, RoleId, UserId};

/// Opaque per-interaction token used to address responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InteractionToken(pub String);

impl InteractionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InteractionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who issued the interaction and where.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoker {
    pub user_id: UserId,
    /// `None` when invoked from a direct message.
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    /// Resolved member permissions in the invoking channel.
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub roles: Vec<RoleId>,
}

impl Invoker {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            guild_id: None,
            channel_id: None,
            permissions: Permissions::NONE,
            roles: Vec::new(),
        }
    }

    pub fn in_guild(mut self, guild_id: impl Into<GuildId>) -> Self {
        self.guild_id = Some(guild_id.into());
        self
    }

    pub fn in_channel(mut self, channel_id: impl Into<ChannelId>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_roles<I, T>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<RoleId>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_direct_message(&self) -> bool {
        self.guild_id.is_none()
    }
}

/// One untyped option value as delivered by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOption {
    pub name: String,
    pub value: serde_json::Value,
    /// Set on the option currently being typed in an autocomplete request.
    #[serde(default)]
    pub focused: bool,
}

impl RawOption {
    pub fn new(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self { name: name.into(), value, focused: false }
    }

    pub fn focused(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self { name: name.into(), value, focused: true }
    }
}

/// A slash command call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandInvocation {
    pub token: InteractionToken,
    /// Space- or dot-delimited path, e.g. `"tag edit"`.
    pub command: String,
    pub invoker: Invoker,
    #[serde(default)]
    pub options: Vec<RawOption>,
}

/// A request for suggestions while the user is still typing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocompleteRequest {
    pub token: InteractionToken,
    pub command: String,
    pub invoker: Invoker,
    /// Every option typed so far; exactly one should be `focused`.
    #[serde(default)]
    pub options: Vec<RawOption>,
}

impl AutocompleteRequest {
    pub fn focused(&self) -> Option<&RawOption> {
        self.options.iter().find(|o| o.focused)
    }
}

/// Inbound event delivered by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Interaction {
    Command(CommandInvocation),
    Autocomplete(AutocompleteRequest),
}

impl Interaction {
    pub fn token(&self) -> &InteractionToken {
        match self {
            Interaction::Command(c) => &c.token,
            Interaction::Autocomplete(a) => &a.token,
        }
    }

    pub fn command(&self) -> &str {
        match self {
            Interaction::Command(c) => &c.command,
            Interaction::Autocomplete(a) => &a.command,
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound payloads
// ---------------------------------------------------------------------------

/// A message sent back to the invoker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub content: String,
    /// Only visible to the invoker.
    pub ephemeral: bool,
}

impl Reply {
    pub fn ok(content: impl Into<String>) -> Self {
        Self { content: content.into(), ephemeral: false }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self { content: content.into(), ephemeral: true }
    }
}

/// Value carried by a choice or autocomplete suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceValue {
    Integer(i64),
    Number(f64),
    String(String),
}

impl From<&str> for ChoiceValue {
    fn from(value: &str) -> Self {
        ChoiceValue::String(value.to_string())
    }
}

impl From<String> for ChoiceValue {
    fn from(value: String) -> Self {
        ChoiceValue::String(value)
    }
}

impl From<i64> for ChoiceValue {
    fn from(value: i64) -> Self {
        ChoiceValue::Integer(value)
    }
}

impl From<f64> for ChoiceValue {
    fn from(value: f64) -> Self {
        ChoiceValue::Number(value)
    }
}

impl fmt::Display for ChoiceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChoiceValue::Integer(i) => write!(f, "{i}"),
            ChoiceValue::Number(n) => write!(f, "{n}"),
            ChoiceValue::String(s) => f.write_str(s),
        }
    }
}

/// A (display label, value) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub name: String,
    pub value: ChoiceValue,
}

impl Choice {
    pub fn new(name: impl Into<String>, value: impl Into<ChoiceValue>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Snowflake;

    #[test]
    fn interaction_decodes_from_tagged_record() {
        let raw = serde_json::json!({
            "type": "command",
            "token": "tok-1",
            "command": "tag edit",
            "invoker": { "user_id": "10", "guild_id": "20" },
            "options": [{ "name": "name", "value": "rules" }]
        });
        let interaction: Interaction = serde_json::from_value(raw).unwrap();
        let Interaction::Command(cmd) = interaction else {
            panic!("expected command interaction");
        };
        assert_eq!(cmd.command, "tag edit");
        assert_eq!(cmd.invoker.guild_id, Some(Snowflake(20)));
        assert!(!cmd.options[0].focused);
    }

    #[test]
    fn autocomplete_finds_focused_option() {
        let req = AutocompleteRequest {
            token: InteractionToken::new("t"),
            command: "tag show".into(),
            invoker: Invoker::new(1u64),
            options: vec![
                RawOption::new("scope", serde_json::json!("server")),
                RawOption::focused("name", serde_json::json!("ru")),
            ],
        };
        assert_eq!(req.focused().map(|o| o.name.as_str()), Some("name"));
    }
}
