//! Core module
//!
//! Contains the cache configuration and cycle statistics

mod config;
mod debug;

pub use config::{CacheConfig, ConfigError};
pub use debug::CycleStats;
