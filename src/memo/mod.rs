//! Expiring in-process memo tables built on Moka.
//!
//! Each entry carries its own sliding and absolute expiration, so one table
//! can hold values with different lifetimes.

mod config;
mod registry;
mod typed;

pub use config::{Expiration, MemoConfig};
pub use registry::MemoRegistry;
pub use typed::MemoTable;
