//! Guild and role models.

use serde::{Deserialize, Serialize};

use super::ids;

/// Server boost level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum PremiumTier {
    #[default]
    None,
    Tier1,
    Tier2,
    Tier3,
    Other(u8),
}

impl From<u8> for PremiumTier {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Tier1,
            2 => Self::Tier2,
            3 => Self::Tier3,
            other => Self::Other(other),
        }
    }
}

impl From<PremiumTier> for u8 {
    fn from(tier: PremiumTier) -> Self {
        match tier {
            PremiumTier::None => 0,
            PremiumTier::Tier1 => 1,
            PremiumTier::Tier2 => 2,
            PremiumTier::Tier3 => 3,
            PremiumTier::Other(other) => other,
        }
    }
}

/// Guild snapshot as delivered by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guild {
    #[serde(with = "ids")]
    pub id: u64,
    pub name: String,
    #[serde(with = "ids")]
    pub owner_id: u64,
    #[serde(default)]
    pub premium_tier: PremiumTier,
    #[serde(default)]
    pub roles: Vec<Role>,
}

/// Guild role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    #[serde(with = "ids")]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub position: i32,
    /// Permission bitset.
    #[serde(with = "ids")]
    pub permissions: u64,
    #[serde(default)]
    pub mentionable: bool,
}

impl Guild {
    /// Find an embedded role by id.
    pub fn role(&self, role_id: u64) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == role_id)
    }
}
