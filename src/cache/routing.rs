//! Guild -> shard -> cluster routing for the remote cache service.

use url::Url;

use crate::error::{CacheError, Result};

/// Number of shards served by one cluster.
pub const SHARDS_PER_CLUSTER: u64 = 16;

const CLUSTER_PLACEHOLDER: &str = "{cluster}";

/// Shard that receives events for a guild.
pub fn shard_of(guild_id: u64, shard_count: u64) -> u64 {
    (guild_id >> 22) % shard_count.max(1)
}

pub fn cluster_of_shard(shard_id: u64) -> u64 {
    shard_id / SHARDS_PER_CLUSTER
}

pub fn cluster_of(guild_id: u64, shard_count: u64) -> u64 {
    cluster_of_shard(shard_of(guild_id, shard_count))
}

/// Builds per-cluster base URLs from a template such as
/// `http://cluster{cluster}.cache:5000`.
#[derive(Debug, Clone)]
pub struct ClusterRouter {
    template: String,
    shard_count: u64,
}

impl ClusterRouter {
    pub fn new(template: &str, shard_count: u64) -> Result<Self> {
        let probe = template.replace(CLUSTER_PLACEHOLDER, "0");
        Url::parse(&probe)
            .map_err(|e| CacheError::Config(format!("invalid cache endpoint {template:?}: {e}")))?;

        Ok(Self {
            template: template.trim_end_matches('/').to_string(),
            shard_count: shard_count.max(1),
        })
    }

    pub fn base_for_cluster(&self, cluster: u64) -> String {
        self.template.replace(CLUSTER_PLACEHOLDER, &cluster.to_string())
    }

    /// Base URL for a guild; DMs (no guild) go to cluster 0.
    pub fn base_for_guild(&self, guild_id: Option<u64>) -> String {
        let cluster = guild_id.map_or(0, |id| cluster_of(id, self.shard_count));
        self.base_for_cluster(cluster)
    }

    pub fn base_for_shard(&self, shard_id: u64) -> String {
        self.base_for_cluster(cluster_of_shard(shard_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_and_cluster() {
        // 81384788765712384 >> 22 == 19403645698
        let guild = 81384788765712384;

        assert_eq!(shard_of(guild, 1), 0);
        assert_eq!(shard_of(guild, 64), 19403645698 % 64);
        assert_eq!(cluster_of(guild, 64), (19403645698 % 64) / 16);
    }

    #[test]
    fn test_small_shard_counts_use_cluster_zero() {
        for guild in [0, 1 << 22, 5 << 22, 81384788765712384] {
            assert_eq!(cluster_of(guild, 16), 0);
        }
    }

    #[test]
    fn test_zero_shard_count_is_treated_as_one() {
        assert_eq!(shard_of(12345 << 22, 0), 0);
    }

    #[test]
    fn test_cluster_of_shard() {
        assert_eq!(cluster_of_shard(0), 0);
        assert_eq!(cluster_of_shard(15), 0);
        assert_eq!(cluster_of_shard(16), 1);
        assert_eq!(cluster_of_shard(47), 2);
    }

    #[test]
    fn test_router_expands_template() {
        let router = ClusterRouter::new("http://cluster{cluster}.cache:5000/", 64).unwrap();

        assert_eq!(router.base_for_guild(None), "http://cluster0.cache:5000");
        assert_eq!(router.base_for_guild(Some(20 << 22)), "http://cluster1.cache:5000");
        assert_eq!(router.base_for_shard(33), "http://cluster2.cache:5000");
    }

    #[test]
    fn test_router_rejects_invalid_template() {
        assert!(ClusterRouter::new("not a url {cluster}", 1).is_err());
    }
}
