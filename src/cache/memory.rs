//! Process-local cache backed by DashMap.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use super::DiscordCache;
use crate::error::{CacheError, EntityKind, Result};
use crate::model::{Channel, Guild, Role, SelfMember, User};

/// Guild snapshot plus the indices owned by that guild.
///
/// Roles are not kept inside the snapshot: `role_ids` is the single ordered
/// index and role bodies live in the flat role map. Both indices are only
/// mutated while holding the map's entry lock for the guild, which keeps
/// concurrent `save_channel`/`save_role` calls for one guild from losing
/// updates.
#[derive(Debug, Clone)]
struct GuildRecord {
    guild: Guild,
    channels: BTreeSet<u64>,
    role_ids: Vec<u64>,
}

/// Canonical single-process cache.
///
/// Removing a guild does not sweep its channels or roles.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    guilds: DashMap<u64, GuildRecord>,
    channels: DashMap<u64, Channel>,
    users: DashMap<u64, User>,
    roles: DashMap<u64, Role>,
    self_members: DashMap<u64, SelfMember>,
    own_user: OnceLock<u64>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every cached guild, roles resolved.
    pub fn all_guilds(&self) -> Vec<Guild> {
        let ids: Vec<u64> = self.guilds.iter().map(|entry| *entry.key()).collect();
        ids.into_iter().filter_map(|id| self.guild(id)).collect()
    }

    fn guild(&self, guild_id: u64) -> Option<Guild> {
        // Copy out before touching the role map so no guard is held across maps.
        let (mut guild, role_ids) = {
            let record = self.guilds.get(&guild_id)?;
            (record.guild.clone(), record.role_ids.clone())
        };

        guild.roles = role_ids
            .iter()
            .filter_map(|id| self.roles.get(id).map(|role| role.clone()))
            .collect();

        Some(guild)
    }

    fn channels_of(&self, guild_id: u64) -> Result<Vec<Channel>> {
        let ids: Vec<u64> = match self.guilds.get(&guild_id) {
            Some(record) => record.channels.iter().copied().collect(),
            None => return Err(CacheError::not_found(EntityKind::Guild, guild_id)),
        };

        Ok(ids
            .iter()
            .filter_map(|id| self.channels.get(id).map(|channel| channel.clone()))
            .collect())
    }
}

#[async_trait]
impl DiscordCache for InMemoryCache {
    async fn save_own_user(&self, user_id: u64) -> Result<()> {
        // Never changes at runtime; the first value wins.
        let _ = self.own_user.set(user_id);
        Ok(())
    }

    async fn save_guild(&self, guild: &Guild) -> Result<()> {
        // A full snapshot is authoritative for its roles.
        for role in &guild.roles {
            self.roles.insert(role.id, role.clone());
        }

        let role_ids: Vec<u64> = guild.roles.iter().map(|r| r.id).collect();
        let snapshot = Guild {
            roles: Vec::new(),
            ..guild.clone()
        };

        match self.guilds.entry(guild.id) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                record.guild = snapshot;
                record.role_ids = role_ids;
            }
            Entry::Vacant(entry) => {
                entry.insert(GuildRecord {
                    guild: snapshot,
                    channels: BTreeSet::new(),
                    role_ids,
                });
            }
        }

        debug!("Saved guild {} ({} roles)", guild.id, guild.roles.len());
        Ok(())
    }

    async fn save_channel(&self, channel: &Channel) -> Result<()> {
        self.channels.insert(channel.id, channel.clone());

        if let Some(guild_id) = channel.guild_id
            && let Some(mut record) = self.guilds.get_mut(&guild_id)
        {
            record.channels.insert(channel.id);
        }

        if let Some(recipients) = &channel.recipients {
            for recipient in recipients {
                self.users.insert(recipient.id, recipient.clone());
            }
        }

        Ok(())
    }

    async fn save_user(&self, user: &User) -> Result<()> {
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn save_self_member(&self, guild_id: u64, member: &SelfMember) -> Result<()> {
        self.self_members.insert(guild_id, member.clone());
        Ok(())
    }

    async fn save_role(&self, guild_id: u64, role: &Role) -> Result<()> {
        self.roles.insert(role.id, role.clone());

        if let Some(mut record) = self.guilds.get_mut(&guild_id)
            && !record.role_ids.contains(&role.id)
        {
            record.role_ids.push(role.id);
        }

        Ok(())
    }

    async fn save_dm_channel_stub(&self, channel_id: u64) -> Result<()> {
        // A message can arrive before the channel create; keep whatever is there.
        self.channels
            .entry(channel_id)
            .or_insert_with(|| Channel::dm_stub(channel_id));
        Ok(())
    }

    async fn remove_guild(&self, guild_id: u64) -> Result<()> {
        self.guilds.remove(&guild_id);
        Ok(())
    }

    async fn remove_channel(&self, channel_id: u64) -> Result<()> {
        let Some((_, channel)) = self.channels.remove(&channel_id) else {
            return Ok(());
        };

        if let Some(guild_id) = channel.guild_id
            && let Some(mut record) = self.guilds.get_mut(&guild_id)
        {
            record.channels.remove(&channel_id);
        }

        Ok(())
    }

    async fn remove_user(&self, user_id: u64) -> Result<()> {
        self.users.remove(&user_id);
        Ok(())
    }

    async fn remove_role(&self, guild_id: u64, role_id: u64) -> Result<()> {
        self.roles.remove(&role_id);

        if let Some(mut record) = self.guilds.get_mut(&guild_id) {
            record.role_ids.retain(|id| *id != role_id);
        }

        Ok(())
    }

    async fn own_user(&self) -> Result<Option<u64>> {
        Ok(self.own_user.get().copied())
    }

    async fn try_get_guild(&self, guild_id: u64) -> Result<Option<Guild>> {
        Ok(self.guild(guild_id))
    }

    async fn try_get_channel(&self, _guild_id: Option<u64>, channel_id: u64) -> Result<Option<Channel>> {
        Ok(self.channels.get(&channel_id).map(|c| c.clone()))
    }

    async fn try_get_user(&self, user_id: u64) -> Result<Option<User>> {
        Ok(self.users.get(&user_id).map(|u| u.clone()))
    }

    async fn try_get_self_member(&self, guild_id: u64) -> Result<Option<SelfMember>> {
        Ok(self.self_members.get(&guild_id).map(|m| m.clone()))
    }

    async fn try_get_role(&self, role_id: u64) -> Result<Option<Role>> {
        Ok(self.roles.get(&role_id).map(|r| r.clone()))
    }

    async fn get_guild_channels(&self, guild_id: u64) -> Result<Vec<Channel>> {
        self.channels_of(guild_id)
    }
}
