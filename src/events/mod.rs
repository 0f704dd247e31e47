//! Gateway events and the dispatcher that feeds them into the cache.
//!
//! Supporting a new event:
//! 1. Add its payload to `payload.rs`
//! 2. Add a variant below and map its name in `GatewayEvent::from_parts`
//! 3. Handle it in `EventDispatcher::handle`

mod dispatcher;
pub mod payload;

use serde::Deserialize;
use serde_json::Value;

pub use dispatcher::EventDispatcher;
use payload::*;

use crate::error::Result;
use crate::model::{Channel, Guild};

/// The subset of gateway dispatches that touch the cache.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Ready(Ready),
    GuildCreate(Box<GuildCreate>),
    GuildUpdate(Guild),
    GuildDelete(GuildDelete),
    ChannelCreate(Channel),
    ChannelUpdate(Channel),
    ChannelDelete(ChannelDelete),
    ThreadCreate(Channel),
    ThreadUpdate(Channel),
    ThreadDelete(ChannelDelete),
    ThreadListSync(ThreadListSync),
    GuildRoleCreate(GuildRoleUpsert),
    GuildRoleUpdate(GuildRoleUpsert),
    GuildRoleDelete(GuildRoleDelete),
    MessageCreate(Box<MessageCreate>),
    MessageUpdate(ChannelRef),
    MessageDelete(ChannelRef),
    MessageDeleteBulk(ChannelRef),
    MessageReactionAdd(ChannelRef),
    GuildMemberAdd(GuildMemberUpsert),
    GuildMemberUpdate(GuildMemberUpsert),
}

/// Raw dispatch frame: `{"op": 0, "t": "...", "s": 1, "d": {...}}`.
#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(default)]
    t: Option<String>,
    #[serde(default)]
    d: Value,
}

impl GatewayEvent {
    /// Parse one gateway frame. Frames for events the cache ignores, and
    /// non-dispatch frames, yield `None`.
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        let frame: Frame = serde_json::from_str(raw)?;
        match frame.t {
            Some(name) => Self::from_parts(&name, frame.d),
            None => Ok(None),
        }
    }

    pub fn from_parts(name: &str, data: Value) -> Result<Option<Self>> {
        use serde_json::from_value as de;

        let event = match name {
            "READY" => Self::Ready(de(data)?),
            "GUILD_CREATE" => Self::GuildCreate(Box::new(de(data)?)),
            "GUILD_UPDATE" => Self::GuildUpdate(de(data)?),
            "GUILD_DELETE" => Self::GuildDelete(de(data)?),
            "CHANNEL_CREATE" => Self::ChannelCreate(de(data)?),
            "CHANNEL_UPDATE" => Self::ChannelUpdate(de(data)?),
            "CHANNEL_DELETE" => Self::ChannelDelete(de(data)?),
            "THREAD_CREATE" => Self::ThreadCreate(de(data)?),
            "THREAD_UPDATE" => Self::ThreadUpdate(de(data)?),
            "THREAD_DELETE" => Self::ThreadDelete(de(data)?),
            "THREAD_LIST_SYNC" => Self::ThreadListSync(de(data)?),
            "GUILD_ROLE_CREATE" => Self::GuildRoleCreate(de(data)?),
            "GUILD_ROLE_UPDATE" => Self::GuildRoleUpdate(de(data)?),
            "GUILD_ROLE_DELETE" => Self::GuildRoleDelete(de(data)?),
            "MESSAGE_CREATE" => Self::MessageCreate(Box::new(de(data)?)),
            "MESSAGE_UPDATE" => Self::MessageUpdate(de(data)?),
            "MESSAGE_DELETE" => Self::MessageDelete(de(data)?),
            "MESSAGE_DELETE_BULK" => Self::MessageDeleteBulk(de(data)?),
            "MESSAGE_REACTION_ADD" => Self::MessageReactionAdd(de(data)?),
            "GUILD_MEMBER_ADD" => Self::GuildMemberAdd(de(data)?),
            "GUILD_MEMBER_UPDATE" => Self::GuildMemberUpdate(de(data)?),
            _ => return Ok(None),
        };

        Ok(Some(event))
    }

    /// Gateway name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready(_) => "READY",
            Self::GuildCreate(_) => "GUILD_CREATE",
            Self::GuildUpdate(_) => "GUILD_UPDATE",
            Self::GuildDelete(_) => "GUILD_DELETE",
            Self::ChannelCreate(_) => "CHANNEL_CREATE",
            Self::ChannelUpdate(_) => "CHANNEL_UPDATE",
            Self::ChannelDelete(_) => "CHANNEL_DELETE",
            Self::ThreadCreate(_) => "THREAD_CREATE",
            Self::ThreadUpdate(_) => "THREAD_UPDATE",
            Self::ThreadDelete(_) => "THREAD_DELETE",
            Self::ThreadListSync(_) => "THREAD_LIST_SYNC",
            Self::GuildRoleCreate(_) => "GUILD_ROLE_CREATE",
            Self::GuildRoleUpdate(_) => "GUILD_ROLE_UPDATE",
            Self::GuildRoleDelete(_) => "GUILD_ROLE_DELETE",
            Self::MessageCreate(_) => "MESSAGE_CREATE",
            Self::MessageUpdate(_) => "MESSAGE_UPDATE",
            Self::MessageDelete(_) => "MESSAGE_DELETE",
            Self::MessageDeleteBulk(_) => "MESSAGE_DELETE_BULK",
            Self::MessageReactionAdd(_) => "MESSAGE_REACTION_ADD",
            Self::GuildMemberAdd(_) => "GUILD_MEMBER_ADD",
            Self::GuildMemberUpdate(_) => "GUILD_MEMBER_UPDATE",
        }
    }
}
