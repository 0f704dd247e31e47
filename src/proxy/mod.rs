//! Account, system and guild configuration cache for the proxy path.

mod cache;
pub mod model;
mod store;

pub use cache::ProxyCache;
pub use model::{CachedAccount, GuildConfig};
pub use store::{MongoProxyStore, ProxyStore};
