//! guildcache - tiered Discord entity cache
//!
//! ## Architecture
//!
//! - `model` - Guild, channel, role and user snapshots
//! - `cache` - The `DiscordCache` contract and its memory, Redis and HTTP backends
//! - `events` - Gateway event parsing and the dispatcher feeding the cache
//! - `rest` - Discord REST lookups for read-through misses
//! - `memo` - Expiring in-process memo tables (Moka)
//! - `proxy` - Account/system/guild configuration cache over MongoDB
//! - `config` - Environment configuration
//! - `database` - MongoDB integration

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod memo;
pub mod model;
pub mod proxy;
pub mod rest;

pub use error::{CacheError, EntityKind, Result};
