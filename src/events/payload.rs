//! Gateway payload shapes. Only the fields the cache needs are modelled;
//! everything else in the payload is ignored.

use serde::Deserialize;

use crate::model::{ids, Channel, Guild, GuildMember, Role, SelfMember, User};

#[derive(Debug, Clone, Deserialize)]
pub struct Ready {
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuildCreate {
    #[serde(flatten)]
    pub guild: Guild,
    /// Embedded channels arrive without `guild_id`.
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub threads: Vec<Channel>,
    #[serde(default)]
    pub members: Vec<GuildMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuildDelete {
    #[serde(with = "ids")]
    pub id: u64,
    #[serde(default)]
    pub unavailable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelDelete {
    #[serde(with = "ids")]
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadListSync {
    #[serde(with = "ids")]
    pub guild_id: u64,
    #[serde(default)]
    pub threads: Vec<Channel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuildRoleUpsert {
    #[serde(with = "ids")]
    pub guild_id: u64,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuildRoleDelete {
    #[serde(with = "ids")]
    pub guild_id: u64,
    #[serde(with = "ids")]
    pub role_id: u64,
}

/// Partial member attached to messages; carries no user.
#[derive(Debug, Clone, Deserialize)]
pub struct PartialMember {
    #[serde(default, with = "ids::vec")]
    pub roles: Vec<u64>,
}

impl From<&PartialMember> for SelfMember {
    fn from(member: &PartialMember) -> Self {
        Self {
            roles: member.roles.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageCreate {
    #[serde(with = "ids")]
    pub id: u64,
    #[serde(with = "ids")]
    pub channel_id: u64,
    #[serde(default, with = "ids::option")]
    pub guild_id: Option<u64>,
    pub author: User,
    #[serde(default)]
    pub member: Option<PartialMember>,
    #[serde(default)]
    pub mentions: Vec<User>,
}

/// Any event that only needs its channel located (message update/delete,
/// bulk delete, reaction add).
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelRef {
    #[serde(with = "ids")]
    pub channel_id: u64,
    #[serde(default, with = "ids::option")]
    pub guild_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuildMemberUpsert {
    #[serde(with = "ids")]
    pub guild_id: u64,
    pub user: User,
    #[serde(default, with = "ids::vec")]
    pub roles: Vec<u64>,
}

impl GuildMemberUpsert {
    pub fn to_self_member(&self) -> SelfMember {
        SelfMember {
            roles: self.roles.clone(),
        }
    }
}
