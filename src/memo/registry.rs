//! Memo registry - central management of named memo tables.

use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::{MemoConfig, MemoTable};

/// Named memo tables shared between components.
///
/// ## Example
///
/// ```rust,ignore
/// let registry = MemoRegistry::new();
/// let guilds: MemoTable<u64, Arc<GuildConfig>> =
///     registry.get_or_create("guild_config", MemoConfig::default());
/// ```
#[derive(Clone)]
pub struct MemoRegistry {
    tables: Arc<RwLock<HashMap<String, TableEntry>>>,
}

struct TableEntry {
    table: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl TableEntry {
    /// # Panics
    /// Panics if the table was registered with different key/value types.
    fn downcast<K, V>(&self, name: &str) -> MemoTable<K, V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        match self.table.downcast_ref::<MemoTable<K, V>>() {
            Some(table) => table.clone(),
            None => panic!(
                "Memo table '{}' type mismatch: expected {}, got {}",
                name,
                std::any::type_name::<MemoTable<K, V>>(),
                self.type_name
            ),
        }
    }
}

impl MemoRegistry {
    pub fn new() -> Self {
        info!("Memo registry initialized");
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn get<K, V>(&self, name: &str) -> Option<MemoTable<K, V>>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.tables.read().get(name).map(|entry| entry.downcast(name))
    }

    /// Get an existing table or create it with `config`.
    pub fn get_or_create<K, V>(&self, name: &str, config: MemoConfig) -> MemoTable<K, V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        if let Some(table) = self.get(name) {
            return table;
        }

        let mut tables = self.tables.write();
        if let Some(existing) = tables.get(name) {
            return existing.downcast(name);
        }

        debug!("Creating memo table: {}", name);
        let table = MemoTable::<K, V>::new(name, config);
        tables.insert(
            name.to_string(),
            TableEntry {
                table: Box::new(table.clone()),
                type_name: std::any::type_name::<MemoTable<K, V>>(),
            },
        );

        table
    }
}

impl Default for MemoRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("MemoRegistry")
            .field("table_count", &tables.len())
            .field("table_names", &tables.keys().collect::<Vec<_>>())
            .finish()
    }
}
