//! Memoized proxy configuration.
//!
//! An account bundle is stored once per linked account and once under its
//! system id. These are separate slots, so invalidation has to evict all of
//! them together. Nothing here invalidates on its own; callers that mutate
//! the backing store are expected to call the `invalidate_*` methods.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use super::model::{CachedAccount, GuildConfig, SystemId};
use super::store::ProxyStore;
use crate::error::Result;
use crate::memo::{Expiration, MemoConfig, MemoRegistry, MemoTable};

const SYSTEM_EXPIRATION: Expiration = Expiration::new(Duration::from_secs(5 * 60), Duration::from_secs(20 * 60));
const NO_SYSTEM_EXPIRATION: Expiration = Expiration::new(Duration::from_secs(5 * 60), Duration::from_secs(60 * 60));
const GUILD_EXPIRATION: Expiration = Expiration::new(Duration::from_secs(5 * 60), Duration::from_secs(30 * 60));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ProxyKey {
    Account(u64),
    System(SystemId),
}

/// `None` is the cached "no system" marker.
type AccountSlot = Option<Arc<CachedAccount>>;

pub struct ProxyCache {
    store: Arc<dyn ProxyStore>,
    accounts: MemoTable<ProxyKey, AccountSlot>,
    guilds: MemoTable<u64, Arc<GuildConfig>>,
}

impl ProxyCache {
    pub fn new(store: Arc<dyn ProxyStore>, registry: &MemoRegistry) -> Self {
        let accounts = registry.get_or_create(
            "proxy_accounts",
            MemoConfig::with_capacity(50_000).expiration(SYSTEM_EXPIRATION),
        );
        let guilds = registry.get_or_create(
            "proxy_guilds",
            MemoConfig::with_capacity(20_000).expiration(GUILD_EXPIRATION),
        );

        Self { store, accounts, guilds }
    }

    /// The bundle for the account's system, or `None` if it has none.
    pub async fn get_account_data_cached(&self, account_id: u64) -> Result<Option<Arc<CachedAccount>>> {
        if let Some(slot) = self.accounts.get(&ProxyKey::Account(account_id)) {
            trace!("Cache hit for account {}", account_id);
            return Ok(slot);
        }

        trace!("Cache miss for account {}", account_id);
        let Some(bundle) = self.store.account_bundle(account_id).await? else {
            debug!("Cached data for account {} (no system)", account_id);
            self.accounts
                .insert_with(ProxyKey::Account(account_id), None, NO_SYSTEM_EXPIRATION);
            return Ok(None);
        };

        let bundle = Arc::new(bundle);
        debug!(
            "Cached data for system {} and accounts {:?}",
            bundle.system.id, bundle.accounts
        );

        for linked in &bundle.accounts {
            self.accounts
                .insert_with(ProxyKey::Account(*linked), Some(bundle.clone()), SYSTEM_EXPIRATION);
        }
        self.accounts
            .insert_with(ProxyKey::System(bundle.system.id), Some(bundle.clone()), SYSTEM_EXPIRATION);

        Ok(Some(bundle))
    }

    /// Evict a system and every account linked to it.
    pub async fn invalidate_system(&self, system: SystemId) -> Result<()> {
        if let Some(Some(bundle)) = self.accounts.get(&ProxyKey::System(system)) {
            debug!("Invalidating cache for system {} and accounts {:?}", system, bundle.accounts);
            self.evict(system, &bundle.accounts);
            return Ok(());
        }

        self.accounts.invalidate(&ProxyKey::System(system));
        let accounts = self.store.linked_accounts(system).await?;
        debug!("Invalidating cache for system {} and accounts {:?}", system, accounts);
        self.evict(system, &accounts);
        Ok(())
    }

    /// For systems whose row is already gone, so the links can't be looked up.
    pub fn invalidate_deleted_system(&self, system: SystemId, accounts: &[u64]) {
        debug!("Invalidating cache for deleted system {}", system);
        self.evict(system, accounts);
    }

    pub fn invalidate_guild(&self, guild_id: u64) {
        debug!("Invalidating cache for guild {}", guild_id);
        self.guilds.invalidate(&guild_id);
    }

    /// Guild configuration, creating the default row on first use.
    pub async fn get_guild_data_cached(&self, guild_id: u64) -> Result<Arc<GuildConfig>> {
        if let Some(config) = self.guilds.get(&guild_id) {
            trace!("Cache hit for guild {}", guild_id);
            return Ok(config);
        }

        trace!("Cache miss for guild {}", guild_id);
        let config = Arc::new(self.store.get_or_create_guild_config(guild_id).await?);
        self.guilds.insert_with(guild_id, config.clone(), GUILD_EXPIRATION);
        Ok(config)
    }

    fn evict(&self, system: SystemId, accounts: &[u64]) {
        self.accounts.invalidate(&ProxyKey::System(system));
        for account in accounts {
            self.accounts.invalidate(&ProxyKey::Account(*account));
        }
    }
}

impl std::fmt::Debug for ProxyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyCache")
            .field("accounts", &self.accounts)
            .field("guilds", &self.guilds)
            .finish()
    }
}
