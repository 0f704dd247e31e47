//! Channel model, including threads and DM placeholders.

use serde::{Deserialize, Serialize};

use super::{ids, User};

/// Channel type as numbered by Discord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ChannelType {
    GuildText,
    Dm,
    GuildVoice,
    GroupDm,
    GuildCategory,
    GuildAnnouncement,
    AnnouncementThread,
    PublicThread,
    PrivateThread,
    GuildStageVoice,
    GuildDirectory,
    GuildForum,
    GuildMedia,
    Unknown(u8),
}

impl From<u8> for ChannelType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::GuildText,
            1 => Self::Dm,
            2 => Self::GuildVoice,
            3 => Self::GroupDm,
            4 => Self::GuildCategory,
            5 => Self::GuildAnnouncement,
            10 => Self::AnnouncementThread,
            11 => Self::PublicThread,
            12 => Self::PrivateThread,
            13 => Self::GuildStageVoice,
            14 => Self::GuildDirectory,
            15 => Self::GuildForum,
            16 => Self::GuildMedia,
            other => Self::Unknown(other),
        }
    }
}

impl From<ChannelType> for u8 {
    fn from(kind: ChannelType) -> Self {
        match kind {
            ChannelType::GuildText => 0,
            ChannelType::Dm => 1,
            ChannelType::GuildVoice => 2,
            ChannelType::GroupDm => 3,
            ChannelType::GuildCategory => 4,
            ChannelType::GuildAnnouncement => 5,
            ChannelType::AnnouncementThread => 10,
            ChannelType::PublicThread => 11,
            ChannelType::PrivateThread => 12,
            ChannelType::GuildStageVoice => 13,
            ChannelType::GuildDirectory => 14,
            ChannelType::GuildForum => 15,
            ChannelType::GuildMedia => 16,
            ChannelType::Unknown(other) => other,
        }
    }
}

/// Whether a permission overwrite targets a role or a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum OverwriteType {
    Role,
    Member,
}

impl From<u8> for OverwriteType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Member,
            _ => Self::Role,
        }
    }
}

impl From<OverwriteType> for u8 {
    fn from(kind: OverwriteType) -> Self {
        match kind {
            OverwriteType::Role => 0,
            OverwriteType::Member => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overwrite {
    #[serde(with = "ids")]
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: OverwriteType,
    #[serde(with = "ids")]
    pub allow: u64,
    #[serde(with = "ids")]
    pub deny: u64,
}

/// Channel snapshot.
///
/// `guild_id` is absent on channels embedded in a guild-create payload and on
/// DM channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(with = "ids")]
    pub id: u64,
    #[serde(default, with = "ids::option", skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<u64>,
    #[serde(rename = "type")]
    pub kind: ChannelType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub permission_overwrites: Vec<Overwrite>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipients: Option<Vec<User>>,
    #[serde(default, with = "ids::option", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,
}

impl Channel {
    /// Placeholder for a DM channel we have seen traffic in but no
    /// channel-create for yet.
    pub fn dm_stub(id: u64) -> Self {
        Self {
            id,
            guild_id: None,
            kind: ChannelType::Dm,
            position: None,
            name: None,
            permission_overwrites: Vec::new(),
            recipients: None,
            parent_id: None,
        }
    }

    pub fn is_thread(&self) -> bool {
        matches!(
            self.kind,
            ChannelType::AnnouncementThread | ChannelType::PublicThread | ChannelType::PrivateThread
        )
    }
}
