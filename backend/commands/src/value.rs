/// Typed option values produced by the argument resolver.
use serde::Serialize;
use slashforge_core::{Attachment, Channel, Entity, Role, User};

/// Entity reference, tagged by the option type that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "entity", rename_all = "snake_case")]
pub enum EntityRef {
    User(User),
    Channel(Channel),
    Role(Role),
    /// A user or a role.
    Mentionable(Entity),
    Attachment(Attachment),
}

/// A bound argument value. The variant follows the option's declared type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Entity(EntityRef),
}

impl OptionValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            OptionValue::String(_) => "string",
            OptionValue::Integer(_) => "integer",
            OptionValue::Number(_) => "number",
            OptionValue::Boolean(_) => "boolean",
            OptionValue::Entity(EntityRef::User(_)) => "user",
            OptionValue::Entity(EntityRef::Channel(_)) => "channel",
            OptionValue::Entity(EntityRef::Role(_)) => "role",
            OptionValue::Entity(EntityRef::Mentionable(_)) => "mentionable",
            OptionValue::Entity(EntityRef::Attachment(_)) => "attachment",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            OptionValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OptionValue::Number(n) => Some(*n),
            OptionValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::String(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::String(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Integer(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Number(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Boolean(value)
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Conversion from a bound value into the type a callback wants.
pub trait FromOptionValue: Sized {
    fn from_option_value(value: &OptionValue) -> Option<Self>;
}

impl FromOptionValue for OptionValue {
    fn from_option_value(value: &OptionValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromOptionValue for String {
    fn from_option_value(value: &OptionValue) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromOptionValue for i64 {
    fn from_option_value(value: &OptionValue) -> Option<Self> {
        value.as_i64()
    }
}

impl FromOptionValue for f64 {
    fn from_option_value(value: &OptionValue) -> Option<Self> {
        value.as_f64()
    }
}

impl FromOptionValue for bool {
    fn from_option_value(value: &OptionValue) -> Option<Self> {
        value.as_bool()
    }
}

impl FromOptionValue for User {
    fn from_option_value(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Entity(EntityRef::User(u))
            | OptionValue::Entity(EntityRef::Mentionable(Entity::User(u))) => Some(u.clone()),
            _ => None,
        }
    }
}

impl FromOptionValue for Role {
    fn from_option_value(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Entity(EntityRef::Role(r))
            | OptionValue::Entity(EntityRef::Mentionable(Entity::Role(r))) => Some(r.clone()),
            _ => None,
        }
    }
}

impl FromOptionValue for Channel {
    fn from_option_value(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Entity(EntityRef::Channel(c)) => Some(c.clone()),
            _ => None,
        }
    }
}

impl FromOptionValue for Attachment {
    fn from_option_value(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Entity(EntityRef::Attachment(a)) => Some(a.clone()),
            _ => None,
        }
    }
}

impl FromOptionValue for Entity {
    fn from_option_value(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Entity(EntityRef::User(u)) => Some(Entity::User(u.clone())),
            OptionValue::Entity(EntityRef::Channel(c)) => Some(Entity::Channel(c.clone())),
            OptionValue::Entity(EntityRef::Role(r)) => Some(Entity::Role(r.clone())),
            OptionValue::Entity(EntityRef::Mentionable(e)) => Some(e.clone()),
            OptionValue::Entity(EntityRef::Attachment(a)) => Some(Entity::Attachment(a.clone())),
            _ => None,
        }
    }
}
