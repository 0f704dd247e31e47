//! Compact binary records stored in Redis.
//!
//! Records are MessagePack arrays (field order matters; append new fields at
//! the end with `#[serde(default)]`). The guild record carries no roles: they
//! live in the `roles` hash and are reassembled from the guild's role index.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Channel, Guild, Overwrite, Role, SelfMember, User};

pub fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec(record)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(rmp_serde::from_slice(bytes)?)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildRecord {
    pub id: u64,
    pub name: String,
    pub owner_id: u64,
    pub premium_tier: u8,
}

impl From<&Guild> for GuildRecord {
    fn from(guild: &Guild) -> Self {
        Self {
            id: guild.id,
            name: guild.name.clone(),
            owner_id: guild.owner_id,
            premium_tier: guild.premium_tier.into(),
        }
    }
}

impl GuildRecord {
    pub fn into_guild(self, roles: Vec<Role>) -> Guild {
        Guild {
            id: self.id,
            name: self.name,
            owner_id: self.owner_id,
            premium_tier: self.premium_tier.into(),
            roles,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: u64,
    pub name: String,
    pub position: i32,
    pub permissions: u64,
    pub mentionable: bool,
}

impl From<&Role> for RoleRecord {
    fn from(role: &Role) -> Self {
        Self {
            id: role.id,
            name: role.name.clone(),
            position: role.position,
            permissions: role.permissions,
            mentionable: role.mentionable,
        }
    }
}

impl From<RoleRecord> for Role {
    fn from(record: RoleRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            position: record.position,
            permissions: record.permissions,
            mentionable: record.mentionable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub username: String,
    pub discriminator: String,
    pub avatar: Option<String>,
    pub bot: bool,
}

impl From<&User> for UserRecord {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            discriminator: user.discriminator.clone(),
            avatar: user.avatar.clone(),
            bot: user.bot,
        }
    }
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            discriminator: record.discriminator,
            avatar: record.avatar,
            bot: record.bot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverwriteRecord {
    pub id: u64,
    pub kind: u8,
    pub allow: u64,
    pub deny: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: u64,
    pub kind: u8,
    pub position: Option<i32>,
    pub name: Option<String>,
    pub overwrites: Vec<OverwriteRecord>,
    pub guild_id: Option<u64>,
    pub parent_id: Option<u64>,
    #[serde(default)]
    pub recipients: Option<Vec<UserRecord>>,
}

impl From<&Channel> for ChannelRecord {
    fn from(channel: &Channel) -> Self {
        Self {
            id: channel.id,
            kind: channel.kind.into(),
            position: channel.position,
            name: channel.name.clone(),
            overwrites: channel
                .permission_overwrites
                .iter()
                .map(|o| OverwriteRecord {
                    id: o.id,
                    kind: o.kind.into(),
                    allow: o.allow,
                    deny: o.deny,
                })
                .collect(),
            guild_id: channel.guild_id,
            parent_id: channel.parent_id,
            recipients: channel
                .recipients
                .as_ref()
                .map(|users| users.iter().map(UserRecord::from).collect()),
        }
    }
}

impl From<ChannelRecord> for Channel {
    fn from(record: ChannelRecord) -> Self {
        Self {
            id: record.id,
            guild_id: record.guild_id,
            kind: record.kind.into(),
            position: record.position,
            name: record.name,
            permission_overwrites: record
                .overwrites
                .into_iter()
                .map(|o| Overwrite {
                    id: o.id,
                    kind: o.kind.into(),
                    allow: o.allow,
                    deny: o.deny,
                })
                .collect(),
            recipients: record
                .recipients
                .map(|users| users.into_iter().map(User::from).collect()),
            parent_id: record.parent_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub roles: Vec<u64>,
}

impl From<&SelfMember> for MemberRecord {
    fn from(member: &SelfMember) -> Self {
        Self {
            roles: member.roles.clone(),
        }
    }
}

impl From<MemberRecord> for SelfMember {
    fn from(record: MemberRecord) -> Self {
        Self { roles: record.roles }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChannelType, OverwriteType, PremiumTier};

    #[test]
    fn test_channel_record_keeps_every_field() {
        let channel = Channel {
            id: 1,
            guild_id: Some(2),
            kind: ChannelType::PublicThread,
            position: Some(4),
            name: Some("thread".to_string()),
            permission_overwrites: vec![Overwrite {
                id: 9,
                kind: OverwriteType::Member,
                allow: 1 << 10,
                deny: 1 << 11,
            }],
            recipients: None,
            parent_id: Some(3),
        };

        let bytes = encode(&ChannelRecord::from(&channel)).unwrap();
        let decoded: Channel = decode::<ChannelRecord>(&bytes).unwrap().into();

        assert_eq!(decoded, channel);
    }

    #[test]
    fn test_guild_record_is_smaller_than_json() {
        let guild = Guild {
            id: 81384788765712384,
            name: "Discord API".to_string(),
            owner_id: 53908232506183680,
            premium_tier: PremiumTier::Tier3,
            roles: Vec::new(),
        };

        let bytes = encode(&GuildRecord::from(&guild)).unwrap();
        let json = serde_json::to_vec(&guild).unwrap();

        assert!(bytes.len() < json.len());
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        assert!(decode::<RoleRecord>(&[0xc1, 0x00]).is_err());
    }
}
