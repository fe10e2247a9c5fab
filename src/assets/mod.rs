//! Asset lifecycle management
//!
//! Provides lazily materialized, evictable assets with:
//! - Shared handles that regenerate their element on demand
//! - Heat tracking and a periodic eviction cycle
//! - Key-based deduplication for file-backed resources
//! - Derived assets built from other assets

mod derive;
mod error;
mod handle;
mod heat;
mod path;
mod regenerate;
mod registry;
mod storage;

pub use error::AssetError;
pub use handle::{Asset, ManagedAsset, WeakAsset};
pub use heat::next_heat;
pub use path::AssetPath;
pub use regenerate::{Cleanup, Generator, KeyedLoader, Regenerate};
pub use registry::{CycleReport, Registry};
pub use storage::{AssetServer, ResourceTable};
