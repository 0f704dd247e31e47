//! Configuration module.
//!
//! Loads configuration from environment variables (and `.env`).

use std::env;
use std::str::FromStr;

use crate::error::{CacheError, Result};

/// Which cache backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackendKind {
    #[default]
    Memory,
    Redis,
    Http,
}

impl FromStr for CacheBackendKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            "http" => Ok(Self::Http),
            other => Err(CacheError::Config(format!("unknown CACHE_BACKEND {other:?}"))),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: CacheBackendKind,

    // Redis backend
    pub redis_url: Option<String>,

    // HTTP backend
    /// Base URL of the remote cache, with an optional `{cluster}` placeholder.
    pub cache_endpoint: Option<String>,
    pub shard_count: u64,
    /// Where the remote side should deliver awaited events.
    pub await_target: Option<String>,
    /// Audit remote reads against a local in-memory cache.
    pub compare_local: bool,

    pub own_user_id: Option<u64>,

    // Discord REST
    pub discord_api_base: Option<String>,
    pub bot_token: Option<String>,

    // MongoDB
    pub mongodb_uri: Option<String>,
    pub mongodb_database: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend = var("CACHE_BACKEND")
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or_default();

        let shard_count = parse_var(&var, "SHARD_COUNT")?.unwrap_or(1);
        if shard_count == 0 {
            return Err(CacheError::Config("SHARD_COUNT must be at least 1".to_string()));
        }

        let compare_local = var("CACHE_COMPARE")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        Ok(Self {
            backend,
            redis_url: var("REDIS_URL"),
            cache_endpoint: var("CACHE_ENDPOINT"),
            shard_count,
            await_target: var("AWAIT_TARGET"),
            compare_local,
            own_user_id: parse_var(&var, "OWN_USER_ID")?,
            discord_api_base: var("DISCORD_API_BASE"),
            bot_token: var("BOT_TOKEN"),
            mongodb_uri: var("MONGODB_URI"),
            mongodb_database: var("MONGODB_DATABASE").unwrap_or_else(|| "guildcache".to_string()),
        })
    }

    pub fn require_redis_url(&self) -> Result<&str> {
        self.redis_url
            .as_deref()
            .ok_or_else(|| CacheError::Config("REDIS_URL must be set for the redis backend".to_string()))
    }

    pub fn require_cache_endpoint(&self) -> Result<&str> {
        self.cache_endpoint
            .as_deref()
            .ok_or_else(|| CacheError::Config("CACHE_ENDPOINT must be set for the http backend".to_string()))
    }
}

fn parse_var<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    var(key)
        .map(|v| {
            v.parse()
                .map_err(|_| CacheError::Config(format!("{key} is not a valid number: {v:?}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();

        assert_eq!(config.backend, CacheBackendKind::Memory);
        assert_eq!(config.shard_count, 1);
        assert!(!config.compare_local);
        assert_eq!(config.mongodb_database, "guildcache");
        assert!(config.require_redis_url().is_err());
    }

    #[test]
    fn test_http_backend() {
        let config = config(&[
            ("CACHE_BACKEND", "HTTP"),
            ("CACHE_ENDPOINT", "http://cluster{cluster}.cache:5000"),
            ("SHARD_COUNT", "64"),
            ("CACHE_COMPARE", "true"),
            ("OWN_USER_ID", "466378653216014359"),
        ])
        .unwrap();

        assert_eq!(config.backend, CacheBackendKind::Http);
        assert_eq!(config.shard_count, 64);
        assert!(config.compare_local);
        assert_eq!(config.own_user_id, Some(466378653216014359));
        assert_eq!(config.require_cache_endpoint().unwrap(), "http://cluster{cluster}.cache:5000");
    }

    #[test]
    fn test_invalid_values() {
        assert!(config(&[("CACHE_BACKEND", "sqlite")]).is_err());
        assert!(config(&[("SHARD_COUNT", "many")]).is_err());
        assert!(config(&[("SHARD_COUNT", "0")]).is_err());
        assert!(config(&[("OWN_USER_ID", "-1")]).is_err());
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = config(&[("REDIS_URL", "  "), ("CACHE_BACKEND", "")]).unwrap();

        assert!(config.redis_url.is_none());
        assert_eq!(config.backend, CacheBackendKind::Memory);
    }
}
