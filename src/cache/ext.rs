//! Helpers layered over any [`DiscordCache`], including channel permissions.

use async_trait::async_trait;

use super::DiscordCache;
use crate::error::{CacheError, EntityKind, Result};
use crate::model::{channel_permissions, Channel, Guild, Permissions, Role, User};

/// Strict accessors over any backend: a miss is a `NotFound` error.
#[async_trait]
pub trait DiscordCacheExt: DiscordCache {
    async fn get_guild(&self, guild_id: u64) -> Result<Guild> {
        self.try_get_guild(guild_id)
            .await?
            .ok_or_else(|| CacheError::not_found(EntityKind::Guild, guild_id))
    }

    async fn get_channel(&self, guild_id: Option<u64>, channel_id: u64) -> Result<Channel> {
        self.try_get_channel(guild_id, channel_id)
            .await?
            .ok_or_else(|| CacheError::not_found(EntityKind::Channel, channel_id))
    }

    async fn get_user(&self, user_id: u64) -> Result<User> {
        self.try_get_user(user_id)
            .await?
            .ok_or_else(|| CacheError::not_found(EntityKind::User, user_id))
    }

    async fn get_role(&self, role_id: u64) -> Result<Role> {
        self.try_get_role(role_id)
            .await?
            .ok_or_else(|| CacheError::not_found(EntityKind::Role, role_id))
    }

    /// The channel itself, or the parent of a thread.
    async fn root_channel(&self, guild_id: Option<u64>, channel_id: u64) -> Result<Channel> {
        let channel = self.get_channel(guild_id, channel_id).await?;

        match channel.parent_id {
            Some(parent_id) if channel.is_thread() => self.get_channel(guild_id, parent_id).await,
            _ => Ok(channel),
        }
    }

    /// Effective permissions of `user_id` in a channel.
    ///
    /// Uncached and guildless channels count as DMs. `member_roles` is `None`
    /// for users that have no member object in the guild.
    async fn permissions_for(
        &self,
        guild_id: Option<u64>,
        channel_id: u64,
        user_id: u64,
        member_roles: Option<&[u64]>,
    ) -> Result<Permissions> {
        let Some(channel) = self.try_get_channel(guild_id, channel_id).await? else {
            return Ok(Permissions::DM);
        };
        let Some(guild_id) = channel.guild_id else {
            return Ok(Permissions::DM);
        };

        let root = if channel.is_thread() {
            self.root_channel(Some(guild_id), channel_id).await?
        } else {
            channel
        };
        let guild = self.get_guild(guild_id).await?;

        Ok(channel_permissions(&guild, &root, user_id, member_roles))
    }

    /// Our own permissions in a channel.
    async fn permissions_in(&self, guild_id: Option<u64>, channel_id: u64) -> Result<Permissions> {
        let channel = self.root_channel(guild_id, channel_id).await?;
        let Some(guild_id) = channel.guild_id else {
            return Ok(Permissions::DM);
        };

        let user_id = self.own_user().await?.ok_or(CacheError::OwnUserUnknown)?;
        let member = self.try_get_self_member(guild_id).await?;

        self.permissions_for(Some(guild_id), channel_id, user_id, member.as_ref().map(|m| m.roles.as_slice()))
            .await
    }
}

impl<T: DiscordCache + ?Sized> DiscordCacheExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::model::{ChannelType, Overwrite, OverwriteType, PremiumTier, SelfMember};

    const GUILD: u64 = 1;
    const OWNER: u64 = 2;
    const USER: u64 = 5;
    const MOD_ROLE: u64 = 7;

    fn channel(id: u64, kind: ChannelType, parent_id: Option<u64>) -> Channel {
        Channel {
            id,
            guild_id: Some(GUILD),
            kind,
            position: None,
            name: None,
            permission_overwrites: Vec::new(),
            recipients: None,
            parent_id,
        }
    }

    fn role(id: u64, permissions: Permissions) -> Role {
        Role {
            id,
            name: format!("role{id}"),
            position: 0,
            permissions: permissions.bits(),
            mentionable: false,
        }
    }

    fn overwrite(id: u64, kind: OverwriteType, allow: Permissions, deny: Permissions) -> Overwrite {
        Overwrite {
            id,
            kind,
            allow: allow.bits(),
            deny: deny.bits(),
        }
    }

    /// A guild where @everyone can view and send, and the mod role can also
    /// manage messages.
    async fn guild_cache(overwrites: Vec<Overwrite>) -> InMemoryCache {
        let cache = InMemoryCache::new();
        cache
            .save_guild(&Guild {
                id: GUILD,
                name: "g".to_string(),
                owner_id: OWNER,
                premium_tier: PremiumTier::None,
                roles: vec![
                    role(GUILD, Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES | Permissions::EMBED_LINKS),
                    role(MOD_ROLE, Permissions::MANAGE_MESSAGES),
                    role(8, Permissions::ADMINISTRATOR),
                ],
            })
            .await
            .unwrap();

        let mut text = channel(10, ChannelType::GuildText, None);
        text.permission_overwrites = overwrites;
        cache.save_channel(&text).await.unwrap();
        cache
    }

    #[tokio::test]
    async fn test_strict_getters_fail_on_miss() {
        let cache = InMemoryCache::new();

        assert!(cache.get_guild(1).await.unwrap_err().is_not_found());
        assert!(cache.get_channel(None, 1).await.unwrap_err().is_not_found());
        assert!(cache.get_user(1).await.unwrap_err().is_not_found());
        assert!(cache.get_role(1).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_root_channel_resolves_thread_parent() {
        let cache = InMemoryCache::new();
        let text = channel(2, ChannelType::GuildText, Some(9));
        cache.save_channel(&text).await.unwrap();
        cache
            .save_channel(&channel(3, ChannelType::PublicThread, Some(2)))
            .await
            .unwrap();

        assert_eq!(cache.root_channel(Some(1), 3).await.unwrap(), text);
        // Category parents are not followed for regular channels.
        assert_eq!(cache.root_channel(Some(1), 2).await.unwrap(), text);
    }

    #[tokio::test]
    async fn test_works_through_trait_object() {
        let cache: std::sync::Arc<dyn DiscordCache> = std::sync::Arc::new(InMemoryCache::new());
        cache.save_own_user(1).await.unwrap();

        assert!(cache.get_guild(5).await.is_err());
    }

    #[tokio::test]
    async fn test_dm_and_uncached_channels_get_dm_permissions() {
        let cache = InMemoryCache::new();
        cache.save_dm_channel_stub(20).await.unwrap();

        assert_eq!(cache.permissions_for(None, 20, USER, None).await.unwrap(), Permissions::DM);
        assert_eq!(cache.permissions_for(None, 21, USER, None).await.unwrap(), Permissions::DM);
    }

    #[tokio::test]
    async fn test_owner_gets_everything() {
        let deny_all = overwrite(GUILD, OverwriteType::Role, Permissions::empty(), Permissions::ALL);
        let cache = guild_cache(vec![deny_all]).await;

        let perms = cache.permissions_for(Some(GUILD), 10, OWNER, Some(&[])).await.unwrap();

        assert_eq!(perms, Permissions::ALL);
    }

    #[tokio::test]
    async fn test_everyone_role_applies_to_members() {
        let cache = guild_cache(Vec::new()).await;

        let plain = cache.permissions_for(Some(GUILD), 10, USER, Some(&[])).await.unwrap();
        let moderator = cache.permissions_for(Some(GUILD), 10, USER, Some(&[MOD_ROLE])).await.unwrap();

        assert_eq!(
            plain,
            Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES | Permissions::EMBED_LINKS
        );
        assert_eq!(moderator, plain | Permissions::MANAGE_MESSAGES);
    }

    #[tokio::test]
    async fn test_memberless_user_gets_everyone_only() {
        let deny_view = overwrite(GUILD, OverwriteType::Role, Permissions::empty(), Permissions::VIEW_CHANNEL);
        let cache = guild_cache(vec![deny_view]).await;

        let perms = cache.permissions_for(Some(GUILD), 10, USER, None).await.unwrap();

        assert!(perms.contains(Permissions::VIEW_CHANNEL));
        assert!(!perms.contains(Permissions::MANAGE_MESSAGES));
    }

    #[tokio::test]
    async fn test_administrator_ignores_overwrites() {
        let deny_view = overwrite(GUILD, OverwriteType::Role, Permissions::empty(), Permissions::VIEW_CHANNEL);
        let cache = guild_cache(vec![deny_view]).await;

        let perms = cache.permissions_for(Some(GUILD), 10, USER, Some(&[8])).await.unwrap();

        assert_eq!(perms, Permissions::ALL);
    }

    #[tokio::test]
    async fn test_overwrites_apply_everyone_then_roles_then_member() {
        let cache = guild_cache(vec![
            overwrite(USER, OverwriteType::Member, Permissions::ATTACH_FILES, Permissions::empty()),
            overwrite(MOD_ROLE, OverwriteType::Role, Permissions::SEND_MESSAGES, Permissions::ATTACH_FILES),
            overwrite(GUILD, OverwriteType::Role, Permissions::ATTACH_FILES, Permissions::SEND_MESSAGES),
        ])
        .await;

        let everyone_only = cache.permissions_for(Some(GUILD), 10, 6, Some(&[])).await.unwrap();
        let member = cache.permissions_for(Some(GUILD), 10, USER, Some(&[MOD_ROLE])).await.unwrap();

        // @everyone denies send, so attach and embed go with it.
        assert_eq!(everyone_only, Permissions::VIEW_CHANNEL);
        assert!(member.contains(Permissions::SEND_MESSAGES));
        assert!(member.contains(Permissions::ATTACH_FILES));
        assert!(member.contains(Permissions::EMBED_LINKS));
    }

    #[tokio::test]
    async fn test_no_view_strips_dependent_permissions() {
        let deny_view = overwrite(GUILD, OverwriteType::Role, Permissions::empty(), Permissions::VIEW_CHANNEL);
        let cache = guild_cache(vec![deny_view]).await;

        let perms = cache.permissions_for(Some(GUILD), 10, USER, Some(&[MOD_ROLE])).await.unwrap();

        assert_eq!(perms, Permissions::empty());
    }

    #[tokio::test]
    async fn test_no_send_strips_send_dependent_permissions() {
        let deny_send = overwrite(GUILD, OverwriteType::Role, Permissions::empty(), Permissions::SEND_MESSAGES);
        let cache = guild_cache(vec![deny_send]).await;

        let perms = cache.permissions_for(Some(GUILD), 10, USER, Some(&[MOD_ROLE])).await.unwrap();

        assert_eq!(perms, Permissions::VIEW_CHANNEL | Permissions::MANAGE_MESSAGES);
    }

    #[tokio::test]
    async fn test_thread_uses_parent_overwrites() {
        let deny_view = overwrite(GUILD, OverwriteType::Role, Permissions::empty(), Permissions::VIEW_CHANNEL);
        let cache = guild_cache(vec![deny_view]).await;
        cache
            .save_channel(&channel(11, ChannelType::PublicThread, Some(10)))
            .await
            .unwrap();

        let perms = cache.permissions_for(Some(GUILD), 11, USER, Some(&[])).await.unwrap();

        assert_eq!(perms, Permissions::empty());
    }

    #[tokio::test]
    async fn test_uncached_guild_is_not_found() {
        let cache = InMemoryCache::new();
        cache.save_channel(&channel(10, ChannelType::GuildText, None)).await.unwrap();

        let err = cache.permissions_for(Some(GUILD), 10, USER, Some(&[])).await.unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_permissions_in_uses_self_member() {
        let cache = guild_cache(Vec::new()).await;
        assert!(matches!(
            cache.permissions_in(Some(GUILD), 10).await.unwrap_err(),
            CacheError::OwnUserUnknown
        ));

        cache.save_own_user(USER).await.unwrap();
        cache
            .save_self_member(GUILD, &SelfMember { roles: vec![MOD_ROLE] })
            .await
            .unwrap();

        let perms = cache.permissions_in(Some(GUILD), 10).await.unwrap();

        assert!(perms.contains(Permissions::MANAGE_MESSAGES));
        assert!(perms.contains(Permissions::SEND_MESSAGES));
    }
}
