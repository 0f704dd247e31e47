//! Redis-backed shared cache.
//!
//! Layout (all keys prefixed with `discord:`):
//! - `guilds`, `channels`, `users`, `roles`, `members` - id -> binary record
//! - `guild_channels:{guild}`, `guild_roles:{guild}` - presence flags only
//!
//! No TTL is applied to anything.

use std::sync::OnceLock;

use async_trait::async_trait;
use futures::future::try_join_all;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info, trace, warn};

use super::codec::{self, ChannelRecord, GuildRecord, MemberRecord, RoleRecord, UserRecord};
use super::DiscordCache;
use crate::error::{CacheError, EntityKind, Result};
use crate::model::{Channel, Guild, Role, SelfMember, User};

const KEY_PREFIX: &str = "discord:";
const GUILDS: &str = "guilds";
const CHANNELS: &str = "channels";
const USERS: &str = "users";
const ROLES: &str = "roles";
const MEMBERS: &str = "members";
const PRESENT: &[u8] = b"1";

fn guild_channels_key(guild_id: u64) -> String {
    format!("guild_channels:{guild_id}")
}

fn guild_roles_key(guild_id: u64) -> String {
    format!("guild_roles:{guild_id}")
}

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum HashWrite {
    Set { key: String, field: u64, value: Vec<u8> },
    SetIfAbsent { key: String, field: u64, value: Vec<u8> },
}

/// The hash operations the Redis cache needs from its store.
#[async_trait]
pub trait HashStore: Send + Sync {
    async fn hget(&self, key: &str, field: u64) -> Result<Option<Vec<u8>>>;
    async fn hset(&self, key: &str, field: u64, value: Vec<u8>) -> Result<()>;

    /// Returns whether the field was written.
    async fn hset_nx(&self, key: &str, field: u64, value: Vec<u8>) -> Result<bool>;

    async fn hdel(&self, key: &str, field: u64) -> Result<()>;
    async fn hkeys(&self, key: &str) -> Result<Vec<u64>>;

    /// Apply every write as one unit.
    async fn atomic(&self, batch: Vec<HashWrite>) -> Result<()>;
}

/// Redis connection with key prefixing.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// Connect and verify the server answers.
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to Redis...");

        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;

        let mut conn = manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!("Successfully connected to Redis");
        Ok(Self { manager })
    }

    fn key(key: &str) -> String {
        format!("{KEY_PREFIX}{key}")
    }
}

#[async_trait]
impl HashStore for RedisStore {
    async fn hget(&self, key: &str, field: u64) -> Result<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        let value: Option<Vec<u8>> = conn.hget(Self::key(key), field).await?;
        Ok(value)
    }

    async fn hset(&self, key: &str, field: u64, value: Vec<u8>) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.hset(Self::key(key), field, value).await?;
        Ok(())
    }

    async fn hset_nx(&self, key: &str, field: u64, value: Vec<u8>) -> Result<bool> {
        let mut conn = self.manager.clone();
        let written: bool = conn.hset_nx(Self::key(key), field, value).await?;
        Ok(written)
    }

    async fn hdel(&self, key: &str, field: u64) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.hdel(Self::key(key), field).await?;
        Ok(())
    }

    async fn hkeys(&self, key: &str) -> Result<Vec<u64>> {
        let mut conn = self.manager.clone();
        let fields: Vec<u64> = conn.hkeys(Self::key(key)).await?;
        Ok(fields)
    }

    async fn atomic(&self, batch: Vec<HashWrite>) -> Result<()> {
        let mut pipe = redis::pipe();
        pipe.atomic();

        for write in batch {
            match write {
                HashWrite::Set { key, field, value } => {
                    pipe.hset(Self::key(&key), field, value).ignore();
                }
                HashWrite::SetIfAbsent { key, field, value } => {
                    pipe.hset_nx(Self::key(&key), field, value).ignore();
                }
            }
        }

        let mut conn = self.manager.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}

/// Shared cache over a [`HashStore`], normally [`RedisStore`].
///
/// Like the in-memory cache, removing a guild leaves its channel and role
/// indices in place.
pub struct RedisBackedCache<S = RedisStore> {
    store: S,
    own_user: OnceLock<u64>,
}

impl<S: HashStore> RedisBackedCache<S> {
    pub fn new(store: S, own_user_id: Option<u64>) -> Self {
        let own_user = OnceLock::new();
        if let Some(id) = own_user_id {
            let _ = own_user.set(id);
        }
        Self { store, own_user }
    }

    async fn read<T: serde::de::DeserializeOwned>(&self, key: &str, id: u64) -> Result<Option<T>> {
        match self.store.hget(key, id).await? {
            Some(bytes) if !bytes.is_empty() => Ok(Some(codec::decode(&bytes)?)),
            _ => Ok(None),
        }
    }

    async fn channel(&self, channel_id: u64) -> Result<Option<Channel>> {
        let record: Option<ChannelRecord> = self.read(CHANNELS, channel_id).await?;
        Ok(record.map(Channel::from))
    }

    async fn role(&self, role_id: u64) -> Result<Option<Role>> {
        let record: Option<RoleRecord> = self.read(ROLES, role_id).await?;
        Ok(record.map(Role::from))
    }
}

#[async_trait]
impl<S: HashStore> DiscordCache for RedisBackedCache<S> {
    async fn save_own_user(&self, user_id: u64) -> Result<()> {
        let _ = self.own_user.set(user_id);
        Ok(())
    }

    async fn save_guild(&self, guild: &Guild) -> Result<()> {
        trace!("Saving guild {} to redis", guild.id);

        let roles_key = guild_roles_key(guild.id);
        let mut batch = vec![HashWrite::Set {
            key: GUILDS.to_string(),
            field: guild.id,
            value: codec::encode(&GuildRecord::from(guild))?,
        }];

        // Roles go in the same transaction rather than through save_role.
        for role in &guild.roles {
            batch.push(HashWrite::Set {
                key: ROLES.to_string(),
                field: role.id,
                value: codec::encode(&RoleRecord::from(role))?,
            });
            batch.push(HashWrite::SetIfAbsent {
                key: roles_key.clone(),
                field: role.id,
                value: PRESENT.to_vec(),
            });
        }

        self.store.atomic(batch).await
    }

    async fn save_channel(&self, channel: &Channel) -> Result<()> {
        trace!("Saving channel {} to redis", channel.id);

        self.store
            .hset(CHANNELS, channel.id, codec::encode(&ChannelRecord::from(channel))?)
            .await?;

        if let Some(guild_id) = channel.guild_id {
            self.store
                .hset_nx(&guild_channels_key(guild_id), channel.id, PRESENT.to_vec())
                .await?;
        }

        // Best effort, not part of the channel write.
        if let Some(recipients) = &channel.recipients {
            for recipient in recipients {
                if let Err(e) = self.save_user(recipient).await {
                    warn!("Failed to save DM recipient {}: {}", recipient.id, e);
                }
            }
        }

        Ok(())
    }

    async fn save_user(&self, user: &User) -> Result<()> {
        trace!("Saving user {} to redis", user.id);
        self.store
            .hset(USERS, user.id, codec::encode(&UserRecord::from(user))?)
            .await
    }

    async fn save_self_member(&self, guild_id: u64, member: &SelfMember) -> Result<()> {
        trace!("Saving self member for guild {} to redis", guild_id);
        self.store
            .hset(MEMBERS, guild_id, codec::encode(&MemberRecord::from(member))?)
            .await
    }

    async fn save_role(&self, guild_id: u64, role: &Role) -> Result<()> {
        trace!("Saving role {} in {} to redis", role.id, guild_id);

        self.store
            .hset(ROLES, role.id, codec::encode(&RoleRecord::from(role))?)
            .await?;
        self.store
            .hset_nx(&guild_roles_key(guild_id), role.id, PRESENT.to_vec())
            .await?;
        Ok(())
    }

    async fn save_dm_channel_stub(&self, channel_id: u64) -> Result<()> {
        let stub = ChannelRecord::from(&Channel::dm_stub(channel_id));
        let written = self
            .store
            .hset_nx(CHANNELS, channel_id, codec::encode(&stub)?)
            .await?;

        if written {
            debug!("Stored DM channel stub {}", channel_id);
        }
        Ok(())
    }

    async fn remove_guild(&self, guild_id: u64) -> Result<()> {
        self.store.hdel(GUILDS, guild_id).await
    }

    async fn remove_channel(&self, channel_id: u64) -> Result<()> {
        // Need the old record to know which guild index to clean.
        let Some(old) = self.channel(channel_id).await? else {
            return Ok(());
        };

        self.store.hdel(CHANNELS, channel_id).await?;

        if let Some(guild_id) = old.guild_id {
            self.store.hdel(&guild_channels_key(guild_id), channel_id).await?;
        }
        Ok(())
    }

    async fn remove_user(&self, user_id: u64) -> Result<()> {
        self.store.hdel(USERS, user_id).await
    }

    async fn remove_role(&self, guild_id: u64, role_id: u64) -> Result<()> {
        self.store.hdel(ROLES, role_id).await?;
        self.store.hdel(&guild_roles_key(guild_id), role_id).await
    }

    async fn own_user(&self) -> Result<Option<u64>> {
        Ok(self.own_user.get().copied())
    }

    async fn try_get_guild(&self, guild_id: u64) -> Result<Option<Guild>> {
        let Some(record) = self.read::<GuildRecord>(GUILDS, guild_id).await? else {
            return Ok(None);
        };

        let role_ids = self.store.hkeys(&guild_roles_key(guild_id)).await?;
        let roles = try_join_all(role_ids.into_iter().map(|id| self.role(id))).await?;

        Ok(Some(record.into_guild(roles.into_iter().flatten().collect())))
    }

    async fn try_get_channel(&self, _guild_id: Option<u64>, channel_id: u64) -> Result<Option<Channel>> {
        self.channel(channel_id).await
    }

    async fn try_get_user(&self, user_id: u64) -> Result<Option<User>> {
        let record: Option<UserRecord> = self.read(USERS, user_id).await?;
        Ok(record.map(User::from))
    }

    async fn try_get_self_member(&self, guild_id: u64) -> Result<Option<SelfMember>> {
        let record: Option<MemberRecord> = self.read(MEMBERS, guild_id).await?;
        Ok(record.map(SelfMember::from))
    }

    async fn try_get_role(&self, role_id: u64) -> Result<Option<Role>> {
        self.role(role_id).await
    }

    async fn get_guild_channels(&self, guild_id: u64) -> Result<Vec<Channel>> {
        let channel_ids = self.store.hkeys(&guild_channels_key(guild_id)).await?;
        if channel_ids.is_empty() {
            return Err(CacheError::not_found(EntityKind::Guild, guild_id));
        }

        let channels = try_join_all(channel_ids.into_iter().map(|id| self.channel(id))).await?;
        Ok(channels.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::model::{ChannelType, PremiumTier};

    /// In-process stand-in for Redis hashes.
    #[derive(Default)]
    struct FakeStore {
        hashes: Mutex<HashMap<String, BTreeMap<u64, Vec<u8>>>>,
        batches: AtomicUsize,
    }

    #[async_trait]
    impl HashStore for FakeStore {
        async fn hget(&self, key: &str, field: u64) -> Result<Option<Vec<u8>>> {
            Ok(self.hashes.lock().get(key).and_then(|h| h.get(&field).cloned()))
        }

        async fn hset(&self, key: &str, field: u64, value: Vec<u8>) -> Result<()> {
            self.hashes.lock().entry(key.to_string()).or_default().insert(field, value);
            Ok(())
        }

        async fn hset_nx(&self, key: &str, field: u64, value: Vec<u8>) -> Result<bool> {
            let mut hashes = self.hashes.lock();
            let hash = hashes.entry(key.to_string()).or_default();
            if hash.contains_key(&field) {
                return Ok(false);
            }
            hash.insert(field, value);
            Ok(true)
        }

        async fn hdel(&self, key: &str, field: u64) -> Result<()> {
            if let Some(hash) = self.hashes.lock().get_mut(key) {
                hash.remove(&field);
            }
            Ok(())
        }

        async fn hkeys(&self, key: &str) -> Result<Vec<u64>> {
            Ok(self
                .hashes
                .lock()
                .get(key)
                .map(|h| h.keys().copied().collect())
                .unwrap_or_default())
        }

        async fn atomic(&self, batch: Vec<HashWrite>) -> Result<()> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            let mut hashes = self.hashes.lock();
            for write in batch {
                match write {
                    HashWrite::Set { key, field, value } => {
                        hashes.entry(key).or_default().insert(field, value);
                    }
                    HashWrite::SetIfAbsent { key, field, value } => {
                        hashes.entry(key).or_default().entry(field).or_insert(value);
                    }
                }
            }
            Ok(())
        }
    }

    fn cache() -> RedisBackedCache<FakeStore> {
        RedisBackedCache::new(FakeStore::default(), Some(42))
    }

    fn role(id: u64, name: &str) -> Role {
        Role {
            id,
            name: name.to_string(),
            position: 1,
            permissions: 8,
            mentionable: true,
        }
    }

    fn guild(id: u64, roles: Vec<Role>) -> Guild {
        Guild {
            id,
            name: "guild".to_string(),
            owner_id: 5,
            premium_tier: PremiumTier::Tier1,
            roles,
        }
    }

    fn channel(id: u64, guild_id: Option<u64>) -> Channel {
        Channel {
            id,
            guild_id,
            kind: ChannelType::GuildText,
            position: Some(0),
            name: Some("general".to_string()),
            permission_overwrites: Vec::new(),
            recipients: None,
            parent_id: None,
        }
    }

    #[tokio::test]
    async fn test_save_guild_is_one_batch_and_round_trips() {
        let cache = cache();
        let g = guild(1, vec![role(10, "a"), role(11, "b")]);

        cache.save_guild(&g).await.unwrap();

        assert_eq!(cache.store.batches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.try_get_guild(1).await.unwrap(), Some(g));
    }

    #[tokio::test]
    async fn test_guild_roles_come_from_index() {
        let cache = cache();
        cache.save_guild(&guild(1, vec![role(10, "a"), role(11, "b")])).await.unwrap();

        let updated = role(11, "b2");
        cache.save_role(1, &updated).await.unwrap();
        cache.save_role(1, &updated).await.unwrap();

        let roles = cache.try_get_guild(1).await.unwrap().unwrap().roles;
        assert_eq!(roles, vec![role(10, "a"), updated]);

        cache.remove_role(1, 10).await.unwrap();
        let roles = cache.try_get_guild(1).await.unwrap().unwrap().roles;
        assert_eq!(roles.len(), 1);
    }

    #[tokio::test]
    async fn test_channel_round_trip_and_index() {
        let cache = cache();
        let c = channel(2, Some(1));

        cache.save_channel(&c).await.unwrap();
        cache.save_channel(&c).await.unwrap();

        assert_eq!(cache.try_get_channel(Some(1), 2).await.unwrap(), Some(c.clone()));
        assert_eq!(cache.get_guild_channels(1).await.unwrap(), vec![c]);
    }

    #[tokio::test]
    async fn test_empty_channel_index_is_not_found() {
        let cache = cache();
        cache.save_guild(&guild(1, vec![])).await.unwrap();

        let err = cache.get_guild_channels(1).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_remove_channel() {
        let cache = cache();
        cache.save_channel(&channel(2, Some(1))).await.unwrap();
        cache.save_channel(&channel(3, Some(1))).await.unwrap();

        cache.remove_channel(2).await.unwrap();
        // Unknown channel is a no-op.
        cache.remove_channel(99).await.unwrap();

        assert!(cache.try_get_channel(None, 2).await.unwrap().is_none());
        let remaining = cache.get_guild_channels(1).await.unwrap();
        assert_eq!(remaining.iter().map(|c| c.id).collect::<Vec<_>>(), vec![3]);
    }

    #[tokio::test]
    async fn test_dm_stub_protection() {
        let cache = cache();
        let mut full = channel(5, None);
        full.kind = ChannelType::Dm;

        cache.save_channel(&full).await.unwrap();
        cache.save_dm_channel_stub(5).await.unwrap();
        assert_eq!(cache.try_get_channel(None, 5).await.unwrap(), Some(full.clone()));

        let other = self::cache();
        other.save_dm_channel_stub(5).await.unwrap();
        assert_eq!(other.try_get_channel(None, 5).await.unwrap(), Some(Channel::dm_stub(5)));
        other.save_channel(&full).await.unwrap();
        assert_eq!(other.try_get_channel(None, 5).await.unwrap(), Some(full));
    }

    #[tokio::test]
    async fn test_users_and_self_member() {
        let cache = cache();
        let user = User {
            id: 3,
            username: "someone".to_string(),
            discriminator: "0001".to_string(),
            avatar: Some("abc".to_string()),
            bot: true,
        };
        let mut dm = Channel::dm_stub(6);
        dm.recipients = Some(vec![user.clone()]);

        cache.save_channel(&dm).await.unwrap();
        cache.save_self_member(1, &SelfMember { roles: vec![10, 11] }).await.unwrap();

        assert_eq!(cache.try_get_user(3).await.unwrap(), Some(user));
        assert_eq!(
            cache.try_get_self_member(1).await.unwrap(),
            Some(SelfMember { roles: vec![10, 11] })
        );

        cache.remove_user(3).await.unwrap();
        assert!(cache.try_get_user(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_own_user_from_constructor() {
        assert_eq!(cache().own_user().await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn test_corrupt_record_is_an_error() {
        let cache = cache();
        cache.store.hset(USERS, 3, vec![0xc1]).await.unwrap();

        assert!(cache.try_get_user(3).await.is_err());
    }
}
