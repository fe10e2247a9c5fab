//! Asset handle implementation
//!
//! An [`Asset`] is a cache cell holding at most one element. The element is
//! built lazily by the asset's regeneration strategy, can be dropped at any
//! time (explicitly or by the registry cycle), and is rebuilt on the next
//! [`Asset::get`].

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use super::error::AssetError;
use super::heat::Heat;
use super::regenerate::{Cleanup, Generator, KeyedLoader, Regenerate};
use super::registry::Registry;
use crate::core::CacheConfig;

/// Global counter for generating unique asset IDs
static NEXT_ASSET_ID: AtomicU64 = AtomicU64::new(1);

/// How long `Display` waits for a busy element slot
const DISPLAY_WAIT: Duration = Duration::from_millis(5);

/// Generate a new unique asset ID
fn next_id() -> u64 {
    NEXT_ASSET_ID.fetch_add(1, Ordering::Relaxed)
}

/// Type-erased view of an asset, as seen by [`Registry`] iteration.
pub trait ManagedAsset: Send + Sync {
    /// Unique identifier of the asset
    fn id(&self) -> u64;

    /// Current heat
    fn heat(&self) -> u32;

    /// Whether the element is currently materialized
    fn is_loaded(&self) -> bool;

    /// Drop the element, running its cleanup. Waits for an in-flight
    /// regeneration. Returns `false` if it was already empty.
    fn drop_element(&self) -> bool;

    /// Label of the regeneration strategy
    fn describe(&self) -> String;
}

/// Registry-only operations. Heat aging must stay with the serialized cycle.
pub(crate) trait TrackedAsset: ManagedAsset {
    /// Age the heat by one cycle. Returns the new heat.
    fn update_heat(&self, config: &CacheConfig) -> u32;

    /// Drop the element if it is still cold and nobody holds the slot.
    /// Returns `true` if an element was dropped.
    fn try_evict(&self) -> bool;

    /// Drop the element unless a regeneration is in flight
    fn try_drop_element(&self) -> bool;

    fn as_managed(&self) -> &dyn ManagedAsset;
}

struct AssetInner<T> {
    id: u64,
    /// Held across regeneration, so at most one thread builds the element.
    element: Mutex<Option<Arc<T>>>,
    /// Mirrors `element.is_some()` without taking the lock
    loaded: AtomicBool,
    heat: Heat,
    source: Box<dyn Regenerate<T>>,
    cleanup: Option<Cleanup<T>>,
    registry: Registry,
}

impl<T> AssetInner<T> {
    fn run_cleanup(&self, element: &T) {
        let Some(cleanup) = &self.cleanup else {
            return;
        };

        let error = match panic::catch_unwind(AssertUnwindSafe(|| cleanup(element))) {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e,
            Err(payload) => AssetError::cleanup(panic_message(&*payload)),
        };
        log::error!(
            "Cleanup of asset {} ({}) failed: {error}",
            self.id,
            self.source.describe()
        );
    }

    /// Take the element out of a locked slot and clean it up
    fn release(&self, slot: &mut Option<Arc<T>>) -> bool {
        let Some(element) = slot.take() else {
            return false;
        };
        self.loaded.store(false, Ordering::Release);

        // Cleanup runs under the slot lock so a concurrent `get` cannot
        // rebuild the element before the old one is released.
        self.run_cleanup(&element);
        log::debug!("Dropped asset {} ({})", self.id, self.source.describe());
        true
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("cleanup panicked")
    }
}

impl<T: Send + Sync> ManagedAsset for AssetInner<T> {
    fn id(&self) -> u64 {
        self.id
    }

    fn heat(&self) -> u32 {
        self.heat.value()
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    fn drop_element(&self) -> bool {
        self.release(&mut self.element.lock())
    }

    fn describe(&self) -> String {
        self.source.describe()
    }
}

impl<T: Send + Sync> TrackedAsset for AssetInner<T> {
    fn update_heat(&self, config: &CacheConfig) -> u32 {
        self.heat.update(config)
    }

    fn try_evict(&self) -> bool {
        let Some(mut slot) = self.element.try_lock() else {
            log::trace!("Asset {} busy, not evicted", self.id);
            return false;
        };
        // A `get` finished after the heat was aged
        if self.heat.was_used() {
            return false;
        }
        self.release(&mut slot)
    }

    fn try_drop_element(&self) -> bool {
        match self.element.try_lock() {
            Some(mut slot) => self.release(&mut slot),
            None => {
                log::trace!("Asset {} busy, not dropped", self.id);
                false
            }
        }
    }

    fn as_managed(&self) -> &dyn ManagedAsset {
        self
    }
}

impl<T> Drop for AssetInner<T> {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
        if let Some(element) = self.element.get_mut().take() {
            self.run_cleanup(&element);
        }
    }
}

/// A shared handle to a lazily materialized, evictable element of type `T`.
///
/// Cloning is cheap and yields the same handle (same [`id`](Self::id)). The
/// handle registers itself with its [`Registry`] on construction and
/// unregisters when the last clone is dropped.
///
/// Callers must not hold on to the element between frames: fetch it through
/// [`get`](Self::get) each time, since the registry may drop it whenever the
/// asset goes cold.
pub struct Asset<T> {
    inner: Arc<AssetInner<T>>,
}

impl<T: Send + Sync + 'static> Asset<T> {
    /// Create an asset generated by `generate`
    pub fn new<F>(registry: &Registry, generate: F) -> Self
    where
        F: Fn() -> Result<T, AssetError> + Send + Sync + 'static,
    {
        Self::from_source(registry, Generator::new(generate), None)
    }

    /// Create an asset generated by `generate`, running `cleanup` on every
    /// element it drops
    pub fn with_cleanup<F, C>(registry: &Registry, generate: F, cleanup: C) -> Self
    where
        F: Fn() -> Result<T, AssetError> + Send + Sync + 'static,
        C: Fn(&T) -> Result<(), AssetError> + Send + Sync + 'static,
    {
        Self::from_source(registry, Generator::new(generate), Some(Box::new(cleanup)))
    }

    /// Create an asset loaded from `key` by `loader`
    pub fn keyed<K, L, E>(registry: &Registry, key: K, loader: L) -> Self
    where
        K: fmt::Display + Send + Sync + 'static,
        L: Fn(&K) -> Result<T, E> + Send + Sync + 'static,
        E: fmt::Display + 'static,
    {
        Self::from_source(registry, KeyedLoader::new(key, loader), None)
    }

    /// Create an asset from any regeneration strategy
    pub fn from_source<S>(registry: &Registry, source: S, cleanup: Option<Cleanup<T>>) -> Self
    where
        S: Regenerate<T> + 'static,
    {
        let inner = Arc::new(AssetInner {
            id: next_id(),
            element: Mutex::new(None),
            loaded: AtomicBool::new(false),
            heat: Heat::default(),
            source: Box::new(source),
            cleanup,
            registry: registry.clone(),
        });

        let weak: Weak<dyn TrackedAsset> = Arc::downgrade(&inner) as Weak<dyn TrackedAsset>;
        registry.register(inner.id, weak);

        Self { inner }
    }

    /// Get the element, regenerating it if it is not materialized.
    ///
    /// Marks the asset as used for the current cycle on success.
    ///
    /// # Errors
    ///
    /// Returns the strategy's error if regeneration fails. The asset stays
    /// empty and the next call retries.
    pub fn get(&self) -> Result<Arc<T>, AssetError> {
        let mut slot = self.inner.element.lock();
        let element = if let Some(element) = slot.as_ref() {
            Arc::clone(element)
        } else {
            let element = match self.inner.source.produce() {
                Ok(value) => Arc::new(value),
                Err(e) => {
                    log::warn!(
                        "Failed to regenerate asset {} ({}): {e}",
                        self.inner.id,
                        self.inner.source.describe()
                    );
                    return Err(e);
                }
            };
            *slot = Some(Arc::clone(&element));
            self.inner.loaded.store(true, Ordering::Release);
            log::debug!(
                "Materialized asset {} ({})",
                self.inner.id,
                self.inner.source.describe()
            );
            element
        };

        // Marked under the slot lock so an eviction that takes the slot next
        // sees the use.
        self.inner.heat.mark_used();
        drop(slot);
        Ok(element)
    }

    /// Drop the element if present, running the cleanup callback.
    ///
    /// Returns `false` if the asset was already empty.
    pub fn drop_element(&self) -> bool {
        self.inner.drop_element()
    }

    /// The element if it is currently materialized. Does not regenerate and
    /// does not count as a use.
    #[must_use]
    pub fn peek(&self) -> Option<Arc<T>> {
        self.inner.element.lock().clone()
    }
}

impl<T> Asset<T> {
    /// Get the unique ID of this asset
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Whether the element is currently materialized
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.load(Ordering::Acquire)
    }

    /// Current heat
    #[must_use]
    pub fn heat(&self) -> u32 {
        self.inner.heat.value()
    }

    /// Label of the regeneration strategy
    #[must_use]
    pub fn describe(&self) -> String {
        self.inner.source.describe()
    }

    /// The registry this asset is registered with
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Create a weak handle that doesn't keep the asset alive
    #[must_use]
    pub fn downgrade(&self) -> WeakAsset<T> {
        WeakAsset {
            id: self.inner.id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Get the strong reference count
    #[must_use]
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl<T> Clone for Asset<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Asset<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl<T> Eq for Asset<T> {}

impl<T> Hash for Asset<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl<T> fmt::Debug for Asset<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Asset")
            .field("id", &self.inner.id)
            .field("source", &self.inner.source.describe())
            .field("heat", &self.heat())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl<T: fmt::Display> fmt::Display for Asset<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // A slot held this long is being regenerated and has no element yet
        let element = self
            .inner
            .element
            .try_lock_for(DISPLAY_WAIT)
            .and_then(|slot| slot.clone());
        match element {
            Some(element) => write!(f, "[{element}]"),
            None => f.write_str("[empty resource]"),
        }
    }
}

/// A weak handle to an asset that doesn't keep it registered.
///
/// Use `upgrade()` to attempt to get a strong handle.
pub struct WeakAsset<T> {
    id: u64,
    inner: Weak<AssetInner<T>>,
}

impl<T> WeakAsset<T> {
    /// Get the unique ID of this asset
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Attempt to upgrade to a strong handle.
    ///
    /// Returns `None` if every strong handle has been dropped.
    #[must_use]
    pub fn upgrade(&self) -> Option<Asset<T>> {
        self.inner.upgrade().map(|inner| Asset { inner })
    }

    /// Check if the asset is still alive
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl<T> Clone for WeakAsset<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for WeakAsset<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for WeakAsset<T> {}

impl<T> Hash for WeakAsset<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for WeakAsset<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakAsset")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}
