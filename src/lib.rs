//! Lazily materialized, evictable assets
//!
//! This crate provides:
//! - Shared asset handles that build their element on demand
//! - Heat-based eviction driven by a periodic registry cycle
//! - Key-deduplicated, file-backed resources
//! - Derived assets computed from other assets

pub mod assets;
pub mod core;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::assets::{
        Asset, AssetError, AssetPath, AssetServer, CycleReport, Registry, ResourceTable, WeakAsset,
    };
    pub use crate::core::{CacheConfig, CycleStats};
}
