//! Account, system and guild configuration records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type SystemId = i32;
pub type MemberId = i32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct System {
    pub id: SystemId,
    /// Short public identifier.
    pub hid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyTag {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub hid: String,
    pub system: SystemId,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub proxy_tags: Vec<ProxyTag>,
    #[serde(default)]
    pub keep_proxy: bool,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoproxyMode {
    #[default]
    Off,
    Front,
    Latch,
    Member,
}

fn enabled() -> bool {
    true
}

/// A system's settings in one guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemGuildSettings {
    pub guild: u64,
    pub system: SystemId,
    #[serde(default = "enabled")]
    pub proxy_enabled: bool,
    #[serde(default)]
    pub autoproxy_mode: AutoproxyMode,
    #[serde(default)]
    pub autoproxy_member: Option<MemberId>,
}

impl SystemGuildSettings {
    pub fn new(guild: u64, system: SystemId) -> Self {
        Self {
            guild,
            system,
            proxy_enabled: true,
            autoproxy_mode: AutoproxyMode::Off,
            autoproxy_member: None,
        }
    }
}

/// A member's overrides in one guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberGuildSettings {
    pub member: MemberId,
    pub guild: u64,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl MemberGuildSettings {
    pub fn new(member: MemberId, guild: u64) -> Self {
        Self {
            member,
            guild,
            display_name: None,
            avatar_url: None,
        }
    }
}

/// Per-guild bot configuration (the `servers` collection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    pub id: u64,
    #[serde(default)]
    pub log_channel: Option<u64>,
    #[serde(default)]
    pub log_blacklist: Vec<u64>,
    #[serde(default)]
    pub blacklist: Vec<u64>,
    #[serde(default)]
    pub log_cleanup_enabled: bool,
}

impl GuildConfig {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            log_channel: None,
            log_blacklist: Vec::new(),
            blacklist: Vec::new(),
            log_cleanup_enabled: false,
        }
    }
}

/// Everything needed to proxy for one system, shared by all of its accounts.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedAccount {
    pub system: System,
    pub members: Vec<Member>,
    pub system_guild: Vec<SystemGuildSettings>,
    pub member_guild: Vec<MemberGuildSettings>,
    pub accounts: Vec<u64>,
}

impl CachedAccount {
    /// Stored settings, or the defaults when the system has none for the guild.
    pub fn settings_for_guild(&self, guild: u64) -> SystemGuildSettings {
        self.system_guild
            .iter()
            .find(|s| s.guild == guild)
            .cloned()
            .unwrap_or_else(|| SystemGuildSettings::new(guild, self.system.id))
    }

    pub fn settings_for_member_guild(&self, member: MemberId, guild: u64) -> MemberGuildSettings {
        self.member_guild
            .iter()
            .find(|m| m.member == member && m.guild == guild)
            .cloned()
            .unwrap_or_else(|| MemberGuildSettings::new(member, guild))
    }
}
