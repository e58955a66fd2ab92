//! Platform entities referenced by command options.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{ChannelId, Permissions, RoleId, Snowflake, UserId};

/// The entity type an option expects the platform directory to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Channel,
    Role,
    /// Either a user or a role.
    Mentionable,
    Attachment,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::User => "user",
            EntityKind::Channel => "channel",
            EntityKind::Role => "role",
            EntityKind::Mentionable => "mentionable",
            EntityKind::Attachment => "attachment",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Text,
    Dm,
    Voice,
    GroupDm,
    Category,
    News,
    NewsThread,
    PublicThread,
    PrivateThread,
    Stage,
    Forum,
}

impl ChannelType {
    /// Numeric code used on the wire.
    pub fn code(self) -> u8 {
        match self {
            ChannelType::Text => 0,
            ChannelType::Dm => 1,
            ChannelType::Voice => 2,
            ChannelType::GroupDm => 3,
            ChannelType::Category => 4,
            ChannelType::News => 5,
            ChannelType::NewsThread => 10,
            ChannelType::PublicThread => 11,
            ChannelType::PrivateThread => 12,
            ChannelType::Stage => 13,
            ChannelType::Forum => 15,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        let ty = match code {
            0 => ChannelType::Text,
            1 => ChannelType::Dm,
            2 => ChannelType::Voice,
            3 => ChannelType::GroupDm,
            4 => ChannelType::Category,
            5 => ChannelType::News,
            10 => ChannelType::NewsThread,
            11 => ChannelType::PublicThread,
            12 => ChannelType::PrivateThread,
            13 => ChannelType::Stage,
            15 => ChannelType::Forum,
            _ => return None,
        };
        Some(ty)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    #[serde(default)]
    pub permissions: Permissions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Snowflake,
    pub filename: String,
    pub size: u64,
    pub url: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// An entity returned by the platform directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entity {
    User(User),
    Channel(Channel),
    Role(Role),
    Attachment(Attachment),
}

impl Entity {
    pub fn id(&self) -> Snowflake {
        match self {
            Entity::User(u) => u.id,
            Entity::Channel(c) => c.id,
            Entity::Role(r) => r.id,
            Entity::Attachment(a) => a.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::User(_) => EntityKind::User,
            Entity::Channel(_) => EntityKind::Channel,
            Entity::Role(_) => EntityKind::Role,
            Entity::Attachment(_) => EntityKind::Attachment,
        }
    }

    /// Whether this entity can stand in for an option expecting `expected`.
    pub fn satisfies(&self, expected: EntityKind) -> bool {
        match expected {
            EntityKind::Mentionable => matches!(self, Entity::User(_) | Entity::Role(_)),
            other => self.kind() == other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentionable_accepts_users_and_roles() {
        let user = Entity::User(User { id: Snowflake(1), name: "ana".into(), bot: false });
        let role = Entity::Role(Role {
            id: Snowflake(2),
            name: "mods".into(),
            permissions: Permissions::NONE,
        });
        let channel = Entity::Channel(Channel {
            id: Snowflake(3),
            name: "general".into(),
            kind: ChannelType::Text,
        });
        assert!(user.satisfies(EntityKind::Mentionable));
        assert!(role.satisfies(EntityKind::Mentionable));
        assert!(!channel.satisfies(EntityKind::Mentionable));
        assert!(!user.satisfies(EntityKind::Role));
    }

    #[test]
    fn channel_type_codes_round_trip() {
        for ty in [ChannelType::Text, ChannelType::Voice, ChannelType::Forum] {
            assert_eq!(ChannelType::from_code(ty.code() as u64), Some(ty));
        }
        assert_eq!(ChannelType::from_code(99), None);
    }
}
