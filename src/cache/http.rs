//! Read-only view of the remote cache service.
//!
//! The service is filled by a separate ingestion pipeline, so writes never go
//! over the wire. They only reach the local comparison cache when auditing is
//! enabled.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::audit::DivergenceAudit;
use super::routing::ClusterRouter;
use super::DiscordCache;
use crate::error::{CacheError, EntityKind, Result};
use crate::model::{ids, Channel, Guild, LastMessage, Role, SelfMember, User};

/// Body of a `POST /await_event` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AwaitEventRequest {
    Reaction {
        #[serde(with = "ids")]
        message_id: u64,
        #[serde(with = "ids")]
        user_id: u64,
        target: String,
        timeout: Option<u64>,
    },
    Message {
        #[serde(with = "ids")]
        channel_id: u64,
        #[serde(with = "ids")]
        author_id: u64,
        target: String,
        timeout: Option<u64>,
        options: Option<Vec<String>>,
    },
    Interaction {
        id: String,
        target: String,
        timeout: Option<u64>,
    },
}

pub struct HttpDelegatingCache {
    client: Client,
    router: ClusterRouter,
    target: String,
    own_user: OnceLock<u64>,
    audit: Option<DivergenceAudit>,
}

impl HttpDelegatingCache {
    /// `target` tells the remote side where to deliver awaited events.
    pub fn new(router: ClusterRouter, target: Option<String>, own_user_id: Option<u64>) -> Result<Self> {
        // Reads are answered with 302 and must not be followed.
        let client = Client::builder().redirect(Policy::none()).build()?;

        let own_user = OnceLock::new();
        if let Some(id) = own_user_id {
            let _ = own_user.set(id);
        }

        Ok(Self {
            client,
            router,
            target: target.unwrap_or_default(),
            own_user,
            audit: None,
        })
    }

    pub fn with_audit(mut self, audit: DivergenceAudit) -> Self {
        self.audit = Some(audit);
        self
    }

    async fn query<T: DeserializeOwned>(&self, guild_id: Option<u64>, path: &str) -> Result<Option<T>> {
        let url = format!("{}{}", self.router.base_for_guild(guild_id), path);
        trace!("Querying remote cache: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() && status != StatusCode::FOUND {
            return Err(CacheError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.bytes().await?;
        Ok(Some(serde_json::from_slice(&body)?))
    }

    /// Latest message summary for a channel.
    pub async fn last_message(&self, guild_id: u64, channel_id: u64) -> Result<Option<LastMessage>> {
        self.query(
            Some(guild_id),
            &format!("/guilds/{guild_id}/channels/{channel_id}/last_message"),
        )
        .await
    }

    pub async fn await_reaction(
        &self,
        guild_id: Option<u64>,
        message_id: u64,
        user_id: u64,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let request = AwaitEventRequest::Reaction {
            message_id,
            user_id,
            target: self.target.clone(),
            timeout: timeout.map(whole_seconds),
        };
        self.send_await(self.router.base_for_guild(guild_id), &request).await
    }

    pub async fn await_message(
        &self,
        guild_id: Option<u64>,
        channel_id: u64,
        author_id: u64,
        timeout: Option<Duration>,
        options: Option<Vec<String>>,
    ) -> Result<()> {
        let request = AwaitEventRequest::Message {
            channel_id,
            author_id,
            target: self.target.clone(),
            timeout: timeout.map(whole_seconds),
            options,
        };
        self.send_await(self.router.base_for_guild(guild_id), &request).await
    }

    pub async fn await_interaction(&self, shard_id: u64, id: &str, timeout: Option<Duration>) -> Result<()> {
        let request = AwaitEventRequest::Interaction {
            id: id.to_string(),
            target: self.target.clone(),
            timeout: timeout.map(whole_seconds),
        };
        self.send_await(self.router.base_for_shard(shard_id), &request).await
    }

    async fn send_await(&self, base: String, request: &AwaitEventRequest) -> Result<()> {
        let url = format!("{base}/await_event");
        debug!("Registering event await at {}", url);

        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();
        if status != StatusCode::NO_CONTENT {
            return Err(CacheError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }
        Ok(())
    }
}

/// The service counts timeouts in whole seconds; round up so a short timeout
/// never turns into zero.
fn whole_seconds(timeout: Duration) -> u64 {
    timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0)
}

#[async_trait]
impl DiscordCache for HttpDelegatingCache {
    async fn save_own_user(&self, user_id: u64) -> Result<()> {
        let _ = self.own_user.set(user_id);
        Ok(())
    }

    async fn save_guild(&self, guild: &Guild) -> Result<()> {
        match &self.audit {
            Some(audit) => audit.local().save_guild(guild).await,
            None => Ok(()),
        }
    }

    async fn save_channel(&self, channel: &Channel) -> Result<()> {
        match &self.audit {
            Some(audit) => audit.local().save_channel(channel).await,
            None => Ok(()),
        }
    }

    async fn save_user(&self, user: &User) -> Result<()> {
        match &self.audit {
            Some(audit) => audit.local().save_user(user).await,
            None => Ok(()),
        }
    }

    async fn save_self_member(&self, guild_id: u64, member: &SelfMember) -> Result<()> {
        match &self.audit {
            Some(audit) => audit.local().save_self_member(guild_id, member).await,
            None => Ok(()),
        }
    }

    async fn save_role(&self, guild_id: u64, role: &Role) -> Result<()> {
        match &self.audit {
            Some(audit) => audit.local().save_role(guild_id, role).await,
            None => Ok(()),
        }
    }

    async fn save_dm_channel_stub(&self, channel_id: u64) -> Result<()> {
        match &self.audit {
            Some(audit) => audit.local().save_dm_channel_stub(channel_id).await,
            None => Ok(()),
        }
    }

    async fn remove_guild(&self, guild_id: u64) -> Result<()> {
        match &self.audit {
            Some(audit) => audit.local().remove_guild(guild_id).await,
            None => Ok(()),
        }
    }

    async fn remove_channel(&self, channel_id: u64) -> Result<()> {
        match &self.audit {
            Some(audit) => audit.local().remove_channel(channel_id).await,
            None => Ok(()),
        }
    }

    async fn remove_user(&self, user_id: u64) -> Result<()> {
        match &self.audit {
            Some(audit) => audit.local().remove_user(user_id).await,
            None => Ok(()),
        }
    }

    async fn remove_role(&self, guild_id: u64, role_id: u64) -> Result<()> {
        match &self.audit {
            Some(audit) => audit.local().remove_role(guild_id, role_id).await,
            None => Ok(()),
        }
    }

    async fn own_user(&self) -> Result<Option<u64>> {
        Ok(self.own_user.get().copied())
    }

    async fn try_get_guild(&self, guild_id: u64) -> Result<Option<Guild>> {
        let remote = self.query(Some(guild_id), &format!("/guilds/{guild_id}")).await?;

        match &self.audit {
            Some(audit) => {
                let local = audit.local().try_get_guild(guild_id).await?;
                Ok(audit.reconcile(EntityKind::Guild, guild_id, remote, local))
            }
            None => Ok(remote),
        }
    }

    async fn try_get_channel(&self, guild_id: Option<u64>, channel_id: u64) -> Result<Option<Channel>> {
        // DM channels have no guild; the service files them under guild 0.
        let path = format!("/guilds/{}/channels/{channel_id}", guild_id.unwrap_or(0));
        let remote = self.query(guild_id, &path).await?;

        match &self.audit {
            Some(audit) => {
                let local = audit.local().try_get_channel(guild_id, channel_id).await?;
                Ok(audit.reconcile(EntityKind::Channel, channel_id, remote, local))
            }
            None => Ok(remote),
        }
    }

    /// Users are resolved through the REST read-through instead.
    async fn try_get_user(&self, _user_id: u64) -> Result<Option<User>> {
        Ok(None)
    }

    async fn try_get_self_member(&self, guild_id: u64) -> Result<Option<SelfMember>> {
        let remote = self
            .query(Some(guild_id), &format!("/guilds/{guild_id}/members/@me"))
            .await?;

        match &self.audit {
            Some(audit) => {
                let local = audit.local().try_get_self_member(guild_id).await?;
                Ok(audit.reconcile(EntityKind::SelfMember, guild_id, remote, local))
            }
            None => Ok(remote),
        }
    }

    /// The service has no role endpoint; only the comparison cache can answer.
    async fn try_get_role(&self, role_id: u64) -> Result<Option<Role>> {
        match &self.audit {
            Some(audit) => audit.local().try_get_role(role_id).await,
            None => Ok(None),
        }
    }

    async fn get_guild_channels(&self, guild_id: u64) -> Result<Vec<Channel>> {
        let mut remote: Option<Vec<Channel>> = self
            .query(Some(guild_id), &format!("/guilds/{guild_id}/channels"))
            .await?;

        let channels = match &self.audit {
            Some(audit) => {
                let mut local = match audit.local().get_guild_channels(guild_id).await {
                    Ok(channels) => Some(channels),
                    Err(e) if e.is_not_found() => None,
                    Err(e) => return Err(e),
                };

                // Order is not part of the contract.
                for list in [&mut remote, &mut local].into_iter().flatten() {
                    list.sort_by_key(|c| c.id);
                }

                audit.reconcile(EntityKind::GuildChannels, guild_id, remote, local)
            }
            None => remote,
        };

        channels.ok_or_else(|| CacheError::not_found(EntityKind::Guild, guild_id))
    }
}
