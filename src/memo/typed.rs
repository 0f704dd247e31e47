//! Typed memo table over Moka with per-entry expiration.

use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::sync::Cache;
use moka::Expiry;

use super::{Expiration, MemoConfig};

/// Stored value plus the expiration it was inserted with.
#[derive(Clone)]
struct Stamped<V> {
    value: V,
    expiration: Expiration,
}

struct StampedExpiry;

impl<K, V> Expiry<K, Stamped<V>> for StampedExpiry {
    fn expire_after_create(&self, _key: &K, value: &Stamped<V>, _created_at: Instant) -> Option<Duration> {
        value.expiration.initial()
    }

    fn expire_after_read(
        &self,
        _key: &K,
        value: &Stamped<V>,
        read_at: Instant,
        _duration_until_expiry: Option<Duration>,
        last_modified_at: Instant,
    ) -> Option<Duration> {
        value
            .expiration
            .after_read(read_at.saturating_duration_since(last_modified_at))
    }

    fn expire_after_update(
        &self,
        _key: &K,
        value: &Stamped<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.expiration.initial()
    }
}

/// A named, typed memo table.
///
/// Cloning is cheap and shares the underlying table.
pub struct MemoTable<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<K, Stamped<V>>,
    name: Arc<str>,
    default_expiration: Expiration,
}

impl<K, V> Clone for MemoTable<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            name: Arc::clone(&self.name),
            default_expiration: self.default_expiration,
        }
    }
}

impl<K, V> MemoTable<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<Arc<str>>, config: MemoConfig) -> Self {
        let inner = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(StampedExpiry)
            .build();

        Self {
            inner,
            name: name.into(),
            default_expiration: config.expiration,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert with the table's default expiration.
    pub fn insert(&self, key: K, value: V) {
        self.insert_with(key, value, self.default_expiration);
    }

    pub fn insert_with(&self, key: K, value: V, expiration: Expiration) {
        self.inner.insert(key, Stamped { value, expiration });
    }

    /// Returns the value if present and not expired. Counts as a read for
    /// sliding expiration.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).map(|stamped| stamped.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    pub fn invalidate(&self, key: &K) {
        self.inner.invalidate(key);
    }
}

impl<K, V> std::fmt::Debug for MemoTable<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoTable")
            .field("name", &self.name)
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}
