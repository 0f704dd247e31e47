//! User and membership models.

use serde::{Deserialize, Serialize};

use super::ids;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(with = "ids")]
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub discriminator: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

/// Our own membership in a guild. Only the role list is tracked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelfMember {
    #[serde(default, with = "ids::vec")]
    pub roles: Vec<u64>,
}

/// Member entry embedded in guild-create payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildMember {
    pub user: User,
    #[serde(default, with = "ids::vec")]
    pub roles: Vec<u64>,
}

impl GuildMember {
    pub fn to_self_member(&self) -> SelfMember {
        SelfMember {
            roles: self.roles.clone(),
        }
    }
}
