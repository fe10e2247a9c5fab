//! Registry of live assets and the periodic eviction cycle
//!
//! Every [`Asset`](super::Asset) registers a weak reference to itself here on
//! construction. Once per frame (or tick) the owner of the registry calls
//! [`Registry::cycle`], which ages the heat of every live asset and, once the
//! population has reached the configured baseline, drops the elements of
//! cold ones.
//!
//! # Locking
//!
//! A single mutex guards the id → weak-reference map. It is held only while
//! the map is read or modified; heat updates, drops and user callbacks run
//! on a snapshot with the lock released. Assets unregister themselves from
//! their `Drop` impl, which takes the same lock, so a strong reference
//! obtained from the map is never released while the lock is held.
//!
//! The cycle never waits on an asset: one that is being regenerated (or
//! read) when the cycle reaches it is skipped until the next cycle.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::handle::{ManagedAsset, TrackedAsset};
use crate::core::{CacheConfig, ConfigError};

/// Outcome of one [`Registry::cycle`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Live assets visited this cycle
    pub live: usize,
    /// Dead entries removed from the registry
    pub pruned: usize,
    /// Assets whose element was dropped because they were cold
    pub evicted: usize,
    /// Assets still materialized after the cycle
    pub active: usize,
}

struct RegistryShared {
    config: CacheConfig,
    assets: Mutex<FxHashMap<u64, Weak<dyn TrackedAsset>>>,
    /// Serializes `cycle` against itself
    cycle_lock: Mutex<()>,
}

/// Process-wide collection of every live asset.
///
/// Cloning yields another reference to the same registry. Construct one at
/// startup and pass it to asset constructors; tests can use a fresh one each.
#[derive(Clone)]
pub struct Registry {
    shared: Arc<RegistryShared>,
}

impl Registry {
    /// Create a registry with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::from_valid_config(CacheConfig::default())
    }

    /// Create a registry with the given configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the configuration fails
    /// [`CacheConfig::validate`]
    pub fn with_config(config: CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: CacheConfig) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                config,
                assets: Mutex::new(FxHashMap::default()),
                cycle_lock: Mutex::new(()),
            }),
        }
    }

    /// The configuration driving heat and eviction
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    pub(crate) fn register(&self, id: u64, asset: Weak<dyn TrackedAsset>) {
        self.shared.assets.lock().insert(id, asset);
    }

    /// Remove an asset's entry. Called by the asset itself when its last
    /// handle is dropped.
    pub(crate) fn unregister(&self, id: u64) -> bool {
        self.shared.assets.lock().remove(&id).is_some()
    }

    /// Number of live registered assets
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared
            .assets
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Check if no live asset is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live assets whose element is currently materialized
    #[must_use]
    pub fn count_active(&self) -> usize {
        self.snapshot().iter().filter(|asset| asset.is_loaded()).count()
    }

    /// Strong references to every live asset, taken under the lock
    fn snapshot(&self) -> Vec<Arc<dyn TrackedAsset>> {
        let assets = self.shared.assets.lock();
        assets.values().filter_map(Weak::upgrade).collect()
    }

    /// Like [`snapshot`](Self::snapshot), also removing dead entries.
    /// Returns the live assets and the number of entries removed.
    fn prune_and_snapshot(&self) -> (Vec<Arc<dyn TrackedAsset>>, usize) {
        let mut assets = self.shared.assets.lock();
        let before = assets.len();
        let mut live = Vec::with_capacity(before);
        assets.retain(|_, weak| match weak.upgrade() {
            Some(asset) => {
                live.push(asset);
                true
            }
            None => false,
        });
        let pruned = before - assets.len();
        drop(assets);
        (live, pruned)
    }

    /// Run one maintenance pass.
    ///
    /// Ages the heat of every live asset. If the number of live assets is at
    /// least `baseline_num_assets`, assets whose heat reached 0 have their
    /// element dropped; the assets themselves stay registered and regenerate
    /// on their next `get`. Dead entries are pruned.
    ///
    /// Assets whose element slot is busy, or that were used after their heat
    /// was aged, are left alone. Concurrent calls are serialized.
    pub fn cycle(&self) -> CycleReport {
        let _cycle = self.shared.cycle_lock.lock();
        let config = &self.shared.config;

        let (live, pruned) = self.prune_and_snapshot();
        let drop_cold = live.len() >= config.baseline_num_assets;

        let mut evicted = 0;
        for asset in &live {
            let heat = asset.update_heat(config);
            log::trace!("Asset {} ({}) heat {heat}", asset.id(), asset.describe());

            if drop_cold && heat == 0 && asset.try_evict() {
                evicted += 1;
            }
        }

        let report = CycleReport {
            live: live.len(),
            pruned,
            evicted,
            active: live.iter().filter(|asset| asset.is_loaded()).count(),
        };

        if evicted > 0 {
            log::info!(
                "Evicted {} cold assets ({} live, {} active)",
                report.evicted,
                report.live,
                report.active
            );
        }
        report
    }

    /// Drop the element of every live asset regardless of heat, e.g. after
    /// the graphics context was lost. Returns the number of elements dropped.
    ///
    /// Assets in the middle of a regeneration are skipped.
    pub fn drop_all(&self) -> usize {
        let dropped = self
            .snapshot()
            .iter()
            .filter(|asset| asset.try_drop_element())
            .count();
        log::info!("Dropped all assets ({dropped} were loaded)");
        dropped
    }

    /// Call `action` on every live asset.
    ///
    /// Iterates over a snapshot, so `action` may create or drop assets.
    pub fn for_each(&self, mut action: impl FnMut(&dyn ManagedAsset)) {
        for asset in self.snapshot() {
            action(asset.as_managed());
        }
    }

    /// Call `action` on every live asset whose element is materialized
    pub fn for_each_active(&self, mut action: impl FnMut(&dyn ManagedAsset)) {
        self.for_each(|asset| {
            if asset.is_loaded() {
                action(asset);
            }
        });
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.shared.config)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
