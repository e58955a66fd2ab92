use std::collections::BTreeSet;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Snowflake ids
// ---------------------------------------------------------------------------

/// Platform-assigned 64-bit identifier.
///
/// Platforms send these as decimal strings to keep them exact in JSON, so
/// deserialization accepts either a string or a bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Snowflake(pub u64);

pub type UserId = Snowflake;
pub type GuildId = Snowflake;
pub type ChannelId = Snowflake;
pub type RoleId = Snowflake;

impl Snowflake {
    /// Parse an id from a raw JSON value (string or unsigned integer).
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => s.trim().parse().ok(),
            serde_json::Value::Number(n) => n.as_u64().map(Snowflake),
            _ => None,
        }
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Snowflake {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Snowflake)
    }
}

impl From<u64> for Snowflake {
    fn from(value: u64) -> Self {
        Snowflake(value)
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Num(u64),
            Str(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Num(n) => Ok(Snowflake(n)),
            Repr::Str(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Visibility boundary a command name is registered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "guilds", rename_all = "snake_case")]
pub enum Scope {
    /// Visible everywhere, including direct messages.
    #[default]
    Global,
    /// Visible only inside the listed guilds.
    Guilds(BTreeSet<GuildId>),
}

impl Scope {
    /// Scope covering a single guild.
    pub fn guild(id: impl Into<GuildId>) -> Self {
        Scope::Guilds(BTreeSet::from([id.into()]))
    }

    pub fn guilds<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<GuildId>,
    {
        Scope::Guilds(ids.into_iter().map(Into::into).collect())
    }

    /// Two scopes overlap when some invocation context could see both.
    /// Global overlaps everything.
    pub fn overlaps(&self, other: &Scope) -> bool {
        match (self, other) {
            (Scope::Global, _) | (_, Scope::Global) => true,
            (Scope::Guilds(a), Scope::Guilds(b)) => !a.is_disjoint(b),
        }
    }

    /// Whether an invocation from `guild` (None for direct messages) can see
    /// a command registered under this scope.
    pub fn covers(&self, guild: Option<GuildId>) -> bool {
        match (self, guild) {
            (Scope::Global, _) => true,
            (Scope::Guilds(set), Some(id)) => set.contains(&id),
            (Scope::Guilds(_), None) => false,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Guilds(set) => {
                let ids: Vec<String> = set.iter().map(ToString::to_string).collect();
                write!(f, "guilds[{}]", ids.join(","))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// Member permission bitset as computed by the platform for the invoking
/// channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(pub u64);

impl Permissions {
    pub const NONE: Permissions = Permissions(0);
    pub const CREATE_INSTANT_INVITE: Permissions = Permissions(1 << 0);
    pub const KICK_MEMBERS: Permissions = Permissions(1 << 1);
    pub const BAN_MEMBERS: Permissions = Permissions(1 << 2);
    pub const ADMINISTRATOR: Permissions = Permissions(1 << 3);
    pub const MANAGE_CHANNELS: Permissions = Permissions(1 << 4);
    pub const MANAGE_GUILD: Permissions = Permissions(1 << 5);
    pub const VIEW_CHANNEL: Permissions = Permissions(1 << 10);
    pub const SEND_MESSAGES: Permissions = Permissions(1 << 11);
    pub const MANAGE_MESSAGES: Permissions = Permissions(1 << 13);
    pub const MENTION_EVERYONE: Permissions = Permissions(1 << 17);
    pub const MANAGE_ROLES: Permissions = Permissions(1 << 28);
    pub const MODERATE_MEMBERS: Permissions = Permissions(1 << 40);

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `required` is present. Administrator grants
    /// everything.
    pub fn contains(self, required: Permissions) -> bool {
        if self.0 & Self::ADMINISTRATOR.0 != 0 {
            return true;
        }
        self.0 & required.0 == required.0
    }

    /// Bits of `required` not present in `self`.
    pub fn missing(self, required: Permissions) -> Permissions {
        if self.contains(required) {
            return Permissions::NONE;
        }
        Permissions(required.0 & !self.0)
    }
}

impl BitOr for Permissions {
    type Output = Permissions;

    fn bitor(self, rhs: Self) -> Self::Output {
        Permissions(self.0 | rhs.0)
    }
}

impl BitOrAssign for Permissions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snowflake_accepts_string_and_number() {
        let a: Snowflake = serde_json::from_str("\"80351110224678912\"").unwrap();
        let b: Snowflake = serde_json::from_str("80351110224678912").unwrap();
        assert_eq!(a, b);
        assert_eq!(Snowflake::from_json(&serde_json::json!("42")), Some(Snowflake(42)));
        assert_eq!(Snowflake::from_json(&serde_json::json!(-1)), None);
    }

    #[test]
    fn scope_overlap_rules() {
        let g1 = Scope::guild(1u64);
        let g12 = Scope::guilds([1u64, 2]);
        let g3 = Scope::guild(3u64);
        assert!(Scope::Global.overlaps(&g1));
        assert!(g1.overlaps(&g12));
        assert!(!g12.overlaps(&g3));
    }

    #[test]
    fn scope_covers_direct_messages_only_when_global() {
        assert!(Scope::Global.covers(None));
        assert!(!Scope::guild(7u64).covers(None));
        assert!(Scope::guild(7u64).covers(Some(Snowflake(7))));
    }

    #[test]
    fn administrator_implies_everything() {
        let admin = Permissions::ADMINISTRATOR;
        assert!(admin.contains(Permissions::MANAGE_GUILD | Permissions::BAN_MEMBERS));
        let mods = Permissions::KICK_MEMBERS;
        assert!(!mods.contains(Permissions::BAN_MEMBERS));
        assert_eq!(
            mods.missing(Permissions::KICK_MEMBERS | Permissions::BAN_MEMBERS),
            Permissions::BAN_MEMBERS
        );
    }
}
