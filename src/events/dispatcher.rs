//! Applies gateway events to the configured cache backend.

use std::sync::Arc;

use tracing::{debug, trace};

use super::GatewayEvent;
use crate::cache::DiscordCache;
use crate::error::Result;
use crate::model::{Channel, SelfMember, User};
use crate::rest::RestClient;

/// Routes events to cache writes and serves read-through lookups.
#[derive(Clone)]
pub struct EventDispatcher {
    cache: Arc<dyn DiscordCache>,
    rest: Arc<dyn RestClient>,
}

impl EventDispatcher {
    pub fn new(cache: Arc<dyn DiscordCache>, rest: Arc<dyn RestClient>) -> Self {
        Self { cache, rest }
    }

    pub fn cache(&self) -> &Arc<dyn DiscordCache> {
        &self.cache
    }

    /// Apply one event, including the self-member update it may carry.
    pub async fn handle(&self, event: &GatewayEvent) -> Result<()> {
        trace!("Handling {}", event.name());

        match event {
            GatewayEvent::Ready(ready) => self.cache.save_own_user(ready.user.id).await?,
            GatewayEvent::GuildCreate(gc) => {
                let guild_id = gc.guild.id;
                self.cache.save_guild(&gc.guild).await?;

                // Embedded channels don't carry their guild id.
                for channel in &gc.channels {
                    self.cache.save_channel(&with_guild(channel, guild_id)).await?;
                }

                for member in &gc.members {
                    self.cache.save_user(&member.user).await?;
                }

                for thread in &gc.threads {
                    self.cache.save_channel(&with_guild(thread, guild_id)).await?;
                }

                debug!(
                    "Cached guild {} with {} channels, {} threads",
                    guild_id,
                    gc.channels.len(),
                    gc.threads.len()
                );
            }
            GatewayEvent::GuildUpdate(guild) => self.cache.save_guild(guild).await?,
            GatewayEvent::GuildDelete(gd) => {
                if gd.unavailable {
                    debug!("Guild {} became unavailable", gd.id);
                }
                self.cache.remove_guild(gd.id).await?;
            }
            GatewayEvent::ChannelCreate(channel)
            | GatewayEvent::ChannelUpdate(channel)
            | GatewayEvent::ThreadCreate(channel)
            | GatewayEvent::ThreadUpdate(channel) => self.cache.save_channel(channel).await?,
            GatewayEvent::ChannelDelete(cd) | GatewayEvent::ThreadDelete(cd) => {
                self.cache.remove_channel(cd.id).await?
            }
            GatewayEvent::ThreadListSync(sync) => {
                for thread in &sync.threads {
                    self.cache.save_channel(&with_guild(thread, sync.guild_id)).await?;
                }
            }
            GatewayEvent::GuildRoleCreate(ev) | GatewayEvent::GuildRoleUpdate(ev) => {
                self.cache.save_role(ev.guild_id, &ev.role).await?
            }
            GatewayEvent::GuildRoleDelete(ev) => self.cache.remove_role(ev.guild_id, ev.role_id).await?,
            GatewayEvent::MessageCreate(mc) => {
                self.save_dm_stub(mc.guild_id, mc.channel_id).await?;

                self.cache.save_user(&mc.author).await?;
                for mention in &mc.mentions {
                    self.cache.save_user(mention).await?;
                }
            }
            GatewayEvent::MessageUpdate(ev)
            | GatewayEvent::MessageDelete(ev)
            | GatewayEvent::MessageDeleteBulk(ev)
            | GatewayEvent::MessageReactionAdd(ev) => self.save_dm_stub(ev.guild_id, ev.channel_id).await?,
            GatewayEvent::GuildMemberAdd(_) | GatewayEvent::GuildMemberUpdate(_) => {}
        }

        self.update_self_member(event).await
    }

    /// Cached user, or fetched over REST and cached. Misses are not cached.
    pub async fn get_or_fetch_user(&self, user_id: u64) -> Result<Option<User>> {
        if let Some(user) = self.cache.try_get_user(user_id).await? {
            return Ok(Some(user));
        }

        debug!("User {} not cached, fetching", user_id);
        let fetched = self.rest.get_user(user_id).await?;
        if let Some(user) = &fetched {
            self.cache.save_user(user).await?;
        }
        Ok(fetched)
    }

    pub async fn get_or_fetch_channel(&self, guild_id: Option<u64>, channel_id: u64) -> Result<Option<Channel>> {
        if let Some(channel) = self.cache.try_get_channel(guild_id, channel_id).await? {
            return Ok(Some(channel));
        }

        debug!("Channel {} not cached, fetching", channel_id);
        let fetched = self.rest.get_channel(channel_id).await?;
        if let Some(channel) = &fetched {
            self.cache.save_channel(channel).await?;
        }
        Ok(fetched)
    }

    // DM traffic can arrive before any channel-create for it.
    async fn save_dm_stub(&self, guild_id: Option<u64>, channel_id: u64) -> Result<()> {
        match guild_id {
            Some(_) => Ok(()),
            None => self.cache.save_dm_channel_stub(channel_id).await,
        }
    }

    async fn update_self_member(&self, event: &GatewayEvent) -> Result<()> {
        let Some(own_id) = self.cache.own_user().await? else {
            return Ok(());
        };

        let update = match event {
            GatewayEvent::GuildCreate(gc) => gc
                .members
                .iter()
                .find(|m| m.user.id == own_id)
                .map(|m| (gc.guild.id, m.to_self_member())),
            GatewayEvent::MessageCreate(mc) if mc.author.id == own_id => match (mc.guild_id, &mc.member) {
                (Some(guild_id), Some(member)) => Some((guild_id, SelfMember::from(member))),
                _ => None,
            },
            GatewayEvent::GuildMemberAdd(m) | GatewayEvent::GuildMemberUpdate(m) if m.user.id == own_id => {
                Some((m.guild_id, m.to_self_member()))
            }
            _ => None,
        };

        if let Some((guild_id, member)) = update {
            trace!("Updating own membership in guild {}", guild_id);
            self.cache.save_self_member(guild_id, &member).await?;
        }
        Ok(())
    }
}

fn with_guild(channel: &Channel, guild_id: u64) -> Channel {
    Channel {
        guild_id: Some(guild_id),
        ..channel.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::cache::{DiscordCacheExt, InMemoryCache};
    use crate::model::ChannelType;

    #[derive(Default)]
    struct FakeRest {
        user: Option<User>,
        channel: Option<Channel>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RestClient for FakeRest {
        async fn get_user(&self, _user_id: u64) -> Result<Option<User>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.user.clone())
        }

        async fn get_channel(&self, _channel_id: u64) -> Result<Option<Channel>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.channel.clone())
        }
    }

    fn user(id: u64) -> User {
        User {
            id,
            username: format!("user{id}"),
            discriminator: "0".to_string(),
            avatar: None,
            bot: false,
        }
    }

    fn dispatcher(rest: FakeRest) -> (EventDispatcher, Arc<FakeRest>) {
        let rest = Arc::new(rest);
        (EventDispatcher::new(Arc::new(InMemoryCache::new()), rest.clone()), rest)
    }

    fn parse(raw: &str) -> GatewayEvent {
        GatewayEvent::parse(raw).unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_guild_create_cascade() {
        let (dispatcher, _) = dispatcher(FakeRest::default());
        dispatcher
            .handle(&parse(r#"{"t": "READY", "d": {"user": {"id": "5", "username": "me"}}}"#))
            .await
            .unwrap();

        dispatcher
            .handle(&parse(
                r#"{"t": "GUILD_CREATE", "d": {
                    "id": "1", "name": "g", "owner_id": "2",
                    "roles": [{"id": "1", "name": "@everyone", "permissions": "0"},
                              {"id": "7", "name": "mod", "permissions": "8"}],
                    "channels": [{"id": "10", "type": 0}, {"id": "11", "type": 2}],
                    "threads": [{"id": "12", "type": 11, "guild_id": "1", "parent_id": "10"}],
                    "members": [{"user": {"id": "5", "username": "me"}, "roles": ["7"]},
                                {"user": {"id": "6", "username": "them"}, "roles": []}]
                }}"#,
            ))
            .await
            .unwrap();

        let cache = dispatcher.cache();
        let mut channels = cache.get_guild_channels(1).await.unwrap();
        channels.sort_by_key(|c| c.id);

        assert_eq!(channels.iter().map(|c| c.id).collect::<Vec<_>>(), vec![10, 11, 12]);
        assert!(channels.iter().all(|c| c.guild_id == Some(1)));
        assert_eq!(cache.get_guild(1).await.unwrap().roles.len(), 2);
        assert_eq!(
            cache.try_get_user(6).await.unwrap(),
            Some(User {
                id: 6,
                username: "them".to_string(),
                discriminator: String::new(),
                avatar: None,
                bot: false,
            })
        );
        assert_eq!(cache.try_get_self_member(1).await.unwrap().unwrap().roles, vec![7]);
        assert_eq!(cache.root_channel(Some(1), 12).await.unwrap().id, 10);
    }

    #[tokio::test]
    async fn test_dm_message_creates_stub_and_users() {
        let (dispatcher, _) = dispatcher(FakeRest::default());

        dispatcher
            .handle(&parse(
                r#"{"t": "MESSAGE_CREATE", "d": {
                    "id": "100", "channel_id": "20",
                    "author": {"id": "3", "username": "a"},
                    "mentions": [{"id": "4", "username": "b"}]
                }}"#,
            ))
            .await
            .unwrap();

        let cache = dispatcher.cache();
        let channel = cache.try_get_channel(None, 20).await.unwrap().unwrap();
        assert_eq!(channel.kind, ChannelType::Dm);
        assert_eq!(cache.try_get_user(3).await.unwrap().unwrap().username, "a");
        assert_eq!(cache.try_get_user(4).await.unwrap().unwrap().username, "b");
    }

    #[tokio::test]
    async fn test_guild_reaction_does_not_create_stub() {
        let (dispatcher, _) = dispatcher(FakeRest::default());

        dispatcher
            .handle(&parse(
                r#"{"t": "MESSAGE_REACTION_ADD", "d": {"channel_id": "20", "guild_id": "1", "user_id": "3"}}"#,
            ))
            .await
            .unwrap();

        assert!(dispatcher.cache().try_get_channel(None, 20).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_role_events() {
        let (dispatcher, _) = dispatcher(FakeRest::default());
        dispatcher
            .handle(&parse(r#"{"t": "GUILD_CREATE", "d": {"id": "1", "name": "g", "owner_id": "2"}}"#))
            .await
            .unwrap();

        let create = r#"{"t": "GUILD_ROLE_CREATE", "d": {"guild_id": "1", "role": {"id": "9", "name": "new", "permissions": "0"}}}"#;
        dispatcher.handle(&parse(create)).await.unwrap();
        dispatcher.handle(&parse(create)).await.unwrap();
        assert_eq!(dispatcher.cache().get_guild(1).await.unwrap().roles.len(), 1);

        dispatcher
            .handle(&parse(r#"{"t": "GUILD_ROLE_DELETE", "d": {"guild_id": "1", "role_id": "9"}}"#))
            .await
            .unwrap();
        assert!(dispatcher.cache().get_guild(1).await.unwrap().roles.is_empty());
    }

    #[tokio::test]
    async fn test_member_update_for_own_user_only() {
        let (dispatcher, _) = dispatcher(FakeRest::default());
        dispatcher.cache().save_own_user(5).await.unwrap();

        dispatcher
            .handle(&parse(
                r#"{"t": "GUILD_MEMBER_UPDATE", "d": {"guild_id": "1", "user": {"id": "6", "username": "x"}, "roles": ["2"]}}"#,
            ))
            .await
            .unwrap();
        assert!(dispatcher.cache().try_get_self_member(1).await.unwrap().is_none());

        dispatcher
            .handle(&parse(
                r#"{"t": "GUILD_MEMBER_UPDATE", "d": {"guild_id": "1", "user": {"id": "5", "username": "me"}, "roles": ["3"]}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(
            dispatcher.cache().try_get_self_member(1).await.unwrap(),
            Some(SelfMember { roles: vec![3] })
        );
    }

    #[tokio::test]
    async fn test_get_or_fetch_user_caches_hits_only() {
        let (dispatcher, rest) = dispatcher(FakeRest {
            user: Some(user(8)),
            ..Default::default()
        });

        assert_eq!(dispatcher.get_or_fetch_user(8).await.unwrap(), Some(user(8)));
        assert_eq!(dispatcher.get_or_fetch_user(8).await.unwrap(), Some(user(8)));
        assert_eq!(rest.calls.load(Ordering::SeqCst), 1);

        let (dispatcher, rest) = self::dispatcher(FakeRest::default());
        assert_eq!(dispatcher.get_or_fetch_user(8).await.unwrap(), None);
        assert_eq!(dispatcher.get_or_fetch_user(8).await.unwrap(), None);
        assert_eq!(rest.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_get_or_fetch_channel() {
        let (dispatcher, rest) = dispatcher(FakeRest {
            channel: Some(Channel::dm_stub(30)),
            ..Default::default()
        });

        assert_eq!(dispatcher.get_or_fetch_channel(None, 30).await.unwrap(), Some(Channel::dm_stub(30)));
        assert_eq!(
            dispatcher.cache().try_get_channel(None, 30).await.unwrap(),
            Some(Channel::dm_stub(30))
        );
        assert_eq!(rest.calls.load(Ordering::SeqCst), 1);
    }
}
