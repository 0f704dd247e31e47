//! Entity models shared by every backend.
//!
//! These mirror the JSON shapes of the gateway and the remote cache service.
//! The Redis backend stores its own compact records (see `cache::codec`).

mod channel;
mod guild;
pub mod ids;
mod message;
mod permissions;
mod user;

pub use channel::{Channel, ChannelType, Overwrite, OverwriteType};
pub use guild::{Guild, PremiumTier, Role};
pub use message::{CachedMessage, LastMessage};
pub use permissions::{channel_permissions, Permissions};
pub use user::{GuildMember, SelfMember, User};
