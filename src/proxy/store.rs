//! Backing store for proxy configuration.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::Collection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::model::{CachedAccount, GuildConfig, Member, MemberGuildSettings, System, SystemGuildSettings, SystemId};
use crate::database::Database;
use crate::error::{CacheError, EntityKind, Result};

#[async_trait]
pub trait ProxyStore: Send + Sync {
    /// The full bundle for the system an account is linked to, if any.
    async fn account_bundle(&self, account_id: u64) -> Result<Option<CachedAccount>>;

    async fn linked_accounts(&self, system: SystemId) -> Result<Vec<u64>>;

    /// Select the guild's configuration, inserting the default row first if
    /// there is none.
    async fn get_or_create_guild_config(&self, guild_id: u64) -> Result<GuildConfig>;
}

/// Account -> system link (the `accounts` collection).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AccountLink {
    uid: u64,
    system: SystemId,
}

pub struct MongoProxyStore {
    accounts: Collection<AccountLink>,
    systems: Collection<System>,
    members: Collection<Member>,
    system_guild: Collection<SystemGuildSettings>,
    member_guild: Collection<MemberGuildSettings>,
    servers: Collection<GuildConfig>,
}

impl MongoProxyStore {
    pub fn new(db: &Database) -> Self {
        Self {
            accounts: db.collection("accounts"),
            systems: db.collection("systems"),
            members: db.collection("members"),
            system_guild: db.collection("system_guild"),
            member_guild: db.collection("member_guild"),
            servers: db.collection("servers"),
        }
    }
}

/// Discord ids are stored as signed 64-bit integers.
fn bson_id(id: u64) -> Result<i64> {
    i64::try_from(id).map_err(|_| CacheError::IdOutOfRange(id))
}

async fn find_all<T>(collection: &Collection<T>, filter: Document) -> Result<Vec<T>>
where
    T: DeserializeOwned + Send + Sync,
{
    let cursor = collection.find(filter).await?;
    Ok(cursor.try_collect().await?)
}

#[async_trait]
impl ProxyStore for MongoProxyStore {
    async fn account_bundle(&self, account_id: u64) -> Result<Option<CachedAccount>> {
        let uid = bson_id(account_id)?;
        let Some(link) = self.accounts.find_one(doc! { "uid": uid }).await? else {
            return Ok(None);
        };
        let Some(system) = self.systems.find_one(doc! { "id": link.system }).await? else {
            return Ok(None);
        };

        let (accounts, members, system_guild) = tokio::try_join!(
            self.linked_accounts(system.id),
            find_all(&self.members, doc! { "system": system.id }),
            find_all(&self.system_guild, doc! { "system": system.id }),
        )?;

        let member_ids: Vec<Bson> = members.iter().map(|m| Bson::Int32(m.id)).collect();
        let member_guild = find_all(&self.member_guild, doc! { "member": { "$in": member_ids } }).await?;

        trace!(
            "Loaded system {} with {} members for account {}",
            system.id,
            members.len(),
            account_id
        );

        Ok(Some(CachedAccount {
            system,
            members,
            system_guild,
            member_guild,
            accounts,
        }))
    }

    async fn linked_accounts(&self, system: SystemId) -> Result<Vec<u64>> {
        let links = find_all(&self.accounts, doc! { "system": system }).await?;
        Ok(links.into_iter().map(|l| l.uid).collect())
    }

    async fn get_or_create_guild_config(&self, guild_id: u64) -> Result<GuildConfig> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let defaults = doc! {
            "log_channel": Bson::Null,
            "log_blacklist": [],
            "blacklist": [],
            "log_cleanup_enabled": false,
        };

        let id = bson_id(guild_id)?;
        self.servers
            .find_one_and_update(doc! { "id": id }, doc! { "$setOnInsert": defaults })
            .with_options(options)
            .await?
            .ok_or_else(|| CacheError::not_found(EntityKind::Guild, guild_id))
    }
}
