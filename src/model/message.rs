//! Last-message summaries served by the remote cache service.

use serde::{Deserialize, Serialize};

use super::ids;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedMessage {
    #[serde(with = "ids")]
    pub id: u64,
    #[serde(default, with = "ids::option")]
    pub referenced_message: Option<u64>,
    pub author_username: String,
}

/// The newest message in a channel, plus the one before it if known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastMessage {
    pub current: CachedMessage,
    #[serde(default)]
    pub previous: Option<CachedMessage>,
}
