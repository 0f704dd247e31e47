//! Entity cache backends.
//!
//! ## Architecture
//!
//! Every backend implements [`DiscordCache`]:
//! - [`InMemoryCache`] - process-local concurrent maps
//! - [`RedisBackedCache`] - shared hashes in Redis, binary records
//! - [`HttpDelegatingCache`] - reads from the remote cache service, routed by
//!   cluster, optionally audited against a local [`InMemoryCache`]
//!
//! The backend is picked once at startup (see [`connect`]); everything above
//! it only sees `Arc<dyn DiscordCache>`.

mod audit;
pub mod codec;
mod ext;
mod http;
mod memory;
mod redis;
mod routing;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

pub use audit::{Divergence, DivergenceAudit, DivergenceKind, DivergenceReporter, LogReporter};
pub use ext::DiscordCacheExt;
pub use http::{AwaitEventRequest, HttpDelegatingCache};
pub use memory::InMemoryCache;
pub use redis::{HashStore, HashWrite, RedisBackedCache, RedisStore};
pub use routing::{cluster_of, cluster_of_shard, shard_of, ClusterRouter, SHARDS_PER_CLUSTER};

use crate::config::{CacheBackendKind, Config};
use crate::error::Result;
use crate::model::{Channel, Guild, Role, SelfMember, User};

/// Read/write contract shared by all cache backends.
///
/// `try_get_*` return `Ok(None)` for anything not cached. Errors are reserved
/// for transport and decoding failures, plus `get_guild_channels` on an
/// unknown guild.
#[async_trait]
pub trait DiscordCache: Send + Sync {
    async fn save_own_user(&self, user_id: u64) -> Result<()>;
    async fn save_guild(&self, guild: &Guild) -> Result<()>;
    async fn save_channel(&self, channel: &Channel) -> Result<()>;
    async fn save_user(&self, user: &User) -> Result<()>;
    async fn save_self_member(&self, guild_id: u64, member: &SelfMember) -> Result<()>;
    async fn save_role(&self, guild_id: u64, role: &Role) -> Result<()>;

    /// Store a DM placeholder unless a channel with this id already exists.
    async fn save_dm_channel_stub(&self, channel_id: u64) -> Result<()>;

    async fn remove_guild(&self, guild_id: u64) -> Result<()>;
    async fn remove_channel(&self, channel_id: u64) -> Result<()>;
    async fn remove_user(&self, user_id: u64) -> Result<()>;
    async fn remove_role(&self, guild_id: u64, role_id: u64) -> Result<()>;

    async fn own_user(&self) -> Result<Option<u64>>;

    async fn try_get_guild(&self, guild_id: u64) -> Result<Option<Guild>>;

    /// `guild_id` is only used for routing; local backends ignore it.
    async fn try_get_channel(&self, guild_id: Option<u64>, channel_id: u64) -> Result<Option<Channel>>;

    async fn try_get_user(&self, user_id: u64) -> Result<Option<User>>;
    async fn try_get_self_member(&self, guild_id: u64) -> Result<Option<SelfMember>>;
    async fn try_get_role(&self, role_id: u64) -> Result<Option<Role>>;

    /// Every channel indexed under the guild.
    ///
    /// Fails with `NotFound` when nothing is indexed; an unknown guild and a
    /// guild without channels look the same here.
    async fn get_guild_channels(&self, guild_id: u64) -> Result<Vec<Channel>>;
}

/// Build the backend selected in the configuration.
pub async fn connect(config: &Config) -> Result<Arc<dyn DiscordCache>> {
    let cache: Arc<dyn DiscordCache> = match config.backend {
        CacheBackendKind::Memory => {
            info!("Using in-memory cache");
            Arc::new(InMemoryCache::new())
        }
        CacheBackendKind::Redis => {
            let url = config.require_redis_url()?;
            let store = RedisStore::connect(url).await?;
            Arc::new(RedisBackedCache::new(store, config.own_user_id))
        }
        CacheBackendKind::Http => {
            let router = ClusterRouter::new(config.require_cache_endpoint()?, config.shard_count)?;
            let mut cache = HttpDelegatingCache::new(router, config.await_target.clone(), config.own_user_id)?;
            if config.compare_local {
                info!("Auditing remote cache reads against a local cache");
                cache = cache.with_audit(DivergenceAudit::new(Arc::new(InMemoryCache::new())));
            }
            Arc::new(cache)
        }
    };

    Ok(cache)
}
