//! Error types shared by every cache backend.

use std::fmt;

use thiserror::Error;

/// Kind of cached entity, used to tag errors and divergence reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Guild,
    Channel,
    User,
    Role,
    SelfMember,
    GuildChannels,
    LastMessage,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Guild => "guild",
            Self::Channel => "channel",
            Self::User => "user",
            Self::Role => "role",
            Self::SelfMember => "self member",
            Self::GuildChannels => "guild channels",
            Self::LastMessage => "last message",
        };
        f.write_str(name)
    }
}

/// Errors returned by cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The entity is not cached. Only strict accessors and
    /// `get_guild_channels` report this; `try_get_*` return `None`.
    #[error("{kind} {id} not found in cache")]
    NotFound { kind: EntityKind, id: u64 },

    /// Nothing has told the cache who we are yet (no READY, no config).
    #[error("own user id is not known yet")]
    OwnUserUnknown,

    /// The remote service answered with a status we don't handle.
    #[error("unexpected status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to encode cache record: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode cache record: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("invalid json payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("id {0} does not fit in a database integer")]
    IdOutOfRange(u64),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CacheError {
    pub fn not_found(kind: EntityKind, id: u64) -> Self {
        Self::NotFound { kind, id }
    }

    /// Whether this error only means "not cached".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = CacheError> = std::result::Result<T, E>;
