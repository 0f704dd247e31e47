//! Permission sets and the channel permission calculation.

use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use super::{Channel, ChannelType, Guild, OverwriteType};

/// Discord permission bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Permissions(u64);

impl Permissions {
    pub const CREATE_INSTANT_INVITE: Self = Self(1 << 0);
    pub const KICK_MEMBERS: Self = Self(1 << 1);
    pub const BAN_MEMBERS: Self = Self(1 << 2);
    pub const ADMINISTRATOR: Self = Self(1 << 3);
    pub const MANAGE_CHANNELS: Self = Self(1 << 4);
    pub const MANAGE_GUILD: Self = Self(1 << 5);
    pub const ADD_REACTIONS: Self = Self(1 << 6);
    pub const VIEW_AUDIT_LOG: Self = Self(1 << 7);
    pub const PRIORITY_SPEAKER: Self = Self(1 << 8);
    pub const STREAM: Self = Self(1 << 9);
    pub const VIEW_CHANNEL: Self = Self(1 << 10);
    pub const SEND_MESSAGES: Self = Self(1 << 11);
    pub const SEND_TTS_MESSAGES: Self = Self(1 << 12);
    pub const MANAGE_MESSAGES: Self = Self(1 << 13);
    pub const EMBED_LINKS: Self = Self(1 << 14);
    pub const ATTACH_FILES: Self = Self(1 << 15);
    pub const READ_MESSAGE_HISTORY: Self = Self(1 << 16);
    pub const MENTION_EVERYONE: Self = Self(1 << 17);
    pub const USE_EXTERNAL_EMOJIS: Self = Self(1 << 18);
    pub const VIEW_GUILD_INSIGHTS: Self = Self(1 << 19);
    pub const CONNECT: Self = Self(1 << 20);
    pub const SPEAK: Self = Self(1 << 21);
    pub const MUTE_MEMBERS: Self = Self(1 << 22);
    pub const DEAFEN_MEMBERS: Self = Self(1 << 23);
    pub const MOVE_MEMBERS: Self = Self(1 << 24);
    pub const USE_VAD: Self = Self(1 << 25);
    pub const CHANGE_NICKNAME: Self = Self(1 << 26);
    pub const MANAGE_NICKNAMES: Self = Self(1 << 27);
    pub const MANAGE_ROLES: Self = Self(1 << 28);
    pub const MANAGE_WEBHOOKS: Self = Self(1 << 29);

    pub const ALL: Self = Self(u64::MAX);

    /// What a user can do in a DM channel.
    pub const DM: Self = Self(
        Self::VIEW_CHANNEL.0
            | Self::SEND_MESSAGES.0
            | Self::READ_MESSAGE_HISTORY.0
            | Self::ADD_REACTIONS.0
            | Self::ATTACH_FILES.0
            | Self::EMBED_LINKS.0
            | Self::USE_EXTERNAL_EMOJIS.0
            | Self::CONNECT.0
            | Self::SPEAK.0
            | Self::USE_VAD.0,
    );

    const NEEDS_VIEW_CHANNEL: Self = Self(
        Self::SEND_MESSAGES.0
            | Self::SEND_TTS_MESSAGES.0
            | Self::MANAGE_MESSAGES.0
            | Self::EMBED_LINKS.0
            | Self::ATTACH_FILES.0
            | Self::READ_MESSAGE_HISTORY.0
            | Self::MENTION_EVERYONE.0
            | Self::USE_EXTERNAL_EMOJIS.0
            | Self::ADD_REACTIONS.0
            | Self::CONNECT.0
            | Self::SPEAK.0
            | Self::MUTE_MEMBERS.0
            | Self::DEAFEN_MEMBERS.0
            | Self::MOVE_MEMBERS.0
            | Self::USE_VAD.0
            | Self::STREAM.0
            | Self::PRIORITY_SPEAKER.0,
    );

    const NEEDS_SEND_MESSAGES: Self = Self(
        Self::MENTION_EVERYONE.0 | Self::SEND_TTS_MESSAGES.0 | Self::ATTACH_FILES.0 | Self::EMBED_LINKS.0,
    );

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Clear `deny`, then set `allow`.
    fn overwrite(self, allow: u64, deny: u64) -> Self {
        Self((self.0 & !deny) | allow)
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Permissions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Permissions {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for Permissions {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl Guild {
    /// Permissions of the @everyone role, whose id is the guild id.
    pub fn everyone_permissions(&self) -> Permissions {
        self.role(self.id)
            .map(|role| Permissions::from_bits(role.permissions))
            .unwrap_or_default()
    }

    /// Guild-level permissions for a member, before channel overwrites.
    pub fn member_permissions(&self, user_id: u64, role_ids: &[u64]) -> Permissions {
        if self.owner_id == user_id {
            return Permissions::ALL;
        }

        let perms = self
            .roles
            .iter()
            .filter(|role| role.id == self.id || role_ids.contains(&role.id))
            .fold(Permissions::empty(), |acc, role| acc | Permissions::from_bits(role.permissions));

        if perms.contains(Permissions::ADMINISTRATOR) {
            return Permissions::ALL;
        }
        perms
    }
}

impl Channel {
    /// Apply this channel's overwrites for a member of `guild_id`.
    pub fn apply_overwrites(&self, perms: Permissions, guild_id: u64, user_id: u64, role_ids: &[u64]) -> Permissions {
        let (mut everyone, mut roles, mut member) = ((0, 0), (0, 0), (0, 0));

        for overwrite in &self.permission_overwrites {
            let slot = match overwrite.kind {
                OverwriteType::Role if overwrite.id == guild_id => &mut everyone,
                OverwriteType::Role if role_ids.contains(&overwrite.id) => &mut roles,
                OverwriteType::Member if overwrite.id == user_id => &mut member,
                _ => continue,
            };
            slot.0 |= overwrite.allow;
            slot.1 |= overwrite.deny;
        }

        perms
            .overwrite(everyone.0, everyone.1)
            .overwrite(roles.0, roles.1)
            .overwrite(member.0, member.1)
    }
}

/// Effective permissions of a user in `channel`.
///
/// `channel` must already be the root channel when the target is a thread.
/// `member_roles` is `None` for users without a member object, who only get
/// the @everyone role.
pub fn channel_permissions(guild: &Guild, channel: &Channel, user_id: u64, member_roles: Option<&[u64]>) -> Permissions {
    if matches!(channel.kind, ChannelType::Dm | ChannelType::GroupDm) {
        return Permissions::DM;
    }

    let Some(role_ids) = member_roles else {
        return guild.everyone_permissions();
    };

    let base = guild.member_permissions(user_id, role_ids);
    if base == Permissions::ALL {
        return base;
    }

    let mut perms = channel.apply_overwrites(base, guild.id, user_id, role_ids);

    if !perms.contains(Permissions::VIEW_CHANNEL) {
        perms = perms & !Permissions::NEEDS_VIEW_CHANNEL;
    }
    if !perms.contains(Permissions::SEND_MESSAGES) {
        perms = perms & !Permissions::NEEDS_SEND_MESSAGES;
    }
    perms
}
