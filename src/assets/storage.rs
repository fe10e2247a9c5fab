//! Keyed asset storage
//!
//! Provides key-based lookup for assets so that every request for the same
//! resource (e.g. the same file path) shares a single [`Asset`].

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::error::AssetError;
use super::handle::Asset;
use super::path::AssetPath;
use super::regenerate::{Cleanup, KeyedLoader, Regenerate};
use super::registry::Registry;

/// Map from an immutable key to the one asset created for it.
///
/// Lookups and creation happen under one lock, so concurrent first requests
/// for the same key create exactly one asset. The table keeps its assets
/// alive until they are [removed](Self::remove).
pub struct ResourceTable<K, T> {
    registry: Registry,
    entries: Mutex<FxHashMap<K, Asset<T>>>,
}

impl<K, T> ResourceTable<K, T>
where
    K: Eq + Hash + Clone,
    T: Send + Sync + 'static,
{
    /// Create an empty table whose assets register with `registry`
    #[must_use]
    pub fn new(registry: &Registry) -> Self {
        Self {
            registry: registry.clone(),
            entries: Mutex::new(FxHashMap::default()),
        }
    }

    /// Get the asset for `key`, creating it with the strategy returned by
    /// `factory` if there is none yet.
    ///
    /// `factory` runs at most once per key and must not call back into this
    /// table.
    pub fn get_or_create<S, F>(&self, key: K, factory: F) -> Asset<T>
    where
        S: Regenerate<T> + 'static,
        F: FnOnce(&K) -> S,
    {
        self.get_or_create_with(key, |key| (factory(key), None))
    }

    /// Like [`get_or_create`](Self::get_or_create), where `factory` also
    /// supplies an optional cleanup callback
    pub fn get_or_create_with<S, F>(&self, key: K, factory: F) -> Asset<T>
    where
        S: Regenerate<T> + 'static,
        F: FnOnce(&K) -> (S, Option<Cleanup<T>>),
    {
        let mut entries = self.entries.lock();
        entries
            .entry(key)
            .or_insert_with_key(|key| {
                let (source, cleanup) = factory(key);
                let asset = Asset::from_source(&self.registry, source, cleanup);
                log::debug!("Created keyed asset {} ({})", asset.id(), asset.describe());
                asset
            })
            .clone()
    }

    /// Get an existing asset by key
    #[must_use]
    pub fn get(&self, key: &K) -> Option<Asset<T>> {
        self.entries.lock().get(key).cloned()
    }

    /// Check if an asset exists for `key`
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Forget the asset for `key`.
    ///
    /// Later requests create a new asset; handles already given out keep
    /// working.
    pub fn remove(&self, key: &K) -> Option<Asset<T>> {
        self.entries.lock().remove(key)
    }

    /// Get the number of keyed assets
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Forget every asset
    pub fn clear(&self) {
        let entries = std::mem::take(&mut *self.entries.lock());
        drop(entries);
    }

    /// All keys currently in the table
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        self.entries.lock().keys().cloned().collect()
    }
}

impl<K, T> ResourceTable<K, T>
where
    K: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Get the asset for `key`, loading it with `loader` when needed
    pub fn load<L, E>(&self, key: K, loader: L) -> Asset<T>
    where
        L: Fn(&K) -> Result<T, E> + Send + Sync + 'static,
        E: fmt::Display + 'static,
    {
        self.get_or_create(key, |key| KeyedLoader::new(key.clone(), loader))
    }

    /// Like [`load`](Self::load), running `cleanup` on every element the
    /// asset drops
    pub fn load_with_cleanup<L, E, C>(&self, key: K, loader: L, cleanup: C) -> Asset<T>
    where
        L: Fn(&K) -> Result<T, E> + Send + Sync + 'static,
        E: fmt::Display + 'static,
        C: Fn(&T) -> Result<(), AssetError> + Send + Sync + 'static,
    {
        self.get_or_create_with(key, |key| {
            let cleanup: Cleanup<T> = Box::new(cleanup);
            (KeyedLoader::new(key.clone(), loader), Some(cleanup))
        })
    }
}

impl<K, T> fmt::Debug for ResourceTable<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceTable")
            .field("len", &self.entries.lock().len())
            .finish_non_exhaustive()
    }
}

/// File-backed assets of every type, keyed by [`AssetPath`] under one root
/// directory
pub struct AssetServer {
    registry: Registry,
    root: PathBuf,
    /// One `ResourceTable<AssetPath, T>` per asset type
    tables: Mutex<FxHashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl AssetServer {
    /// Create a server reading files under `root`
    #[must_use]
    pub fn new(registry: &Registry, root: impl Into<PathBuf>) -> Self {
        Self {
            registry: registry.clone(),
            root: root.into(),
            tables: Mutex::new(FxHashMap::default()),
        }
    }

    /// The directory asset paths are resolved against
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The registry every asset of this server registers with
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Get or create the table for asset type `T`
    pub fn table<T: Send + Sync + 'static>(&self) -> Arc<ResourceTable<AssetPath, T>> {
        let mut tables = self.tables.lock();
        let type_id = TypeId::of::<T>();

        if let Some(table) = tables
            .get(&type_id)
            .and_then(|table| Arc::clone(table).downcast::<ResourceTable<AssetPath, T>>().ok())
        {
            return table;
        }

        let table = Arc::new(ResourceTable::new(&self.registry));
        tables.insert(type_id, Arc::clone(&table) as Arc<dyn Any + Send + Sync>);
        table
    }

    /// Get the asset of type `T` for `path`, building it from the file's
    /// bytes with `decode` when needed
    pub fn load<T, D, E>(&self, path: impl Into<AssetPath>, decode: D) -> Asset<T>
    where
        T: Send + Sync + 'static,
        D: Fn(&[u8]) -> Result<T, E> + Send + Sync + 'static,
        E: fmt::Display + 'static,
    {
        let root = self.root.clone();
        self.table::<T>().get_or_create(path.into(), move |path| {
            KeyedLoader::new(path.clone(), move |path: &AssetPath| {
                let bytes = path.read_bytes(&root)?;
                decode(&bytes).map_err(|e| AssetError::generation(e.to_string()))
            })
        })
    }

    /// Get the asset of type `T` for `path` from a UTF-8 text file
    pub fn load_text<T, D, E>(&self, path: impl Into<AssetPath>, decode: D) -> Asset<T>
    where
        T: Send + Sync + 'static,
        D: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
        E: fmt::Display + 'static,
    {
        let root = self.root.clone();
        self.table::<T>().get_or_create(path.into(), move |path| {
            KeyedLoader::new(path.clone(), move |path: &AssetPath| {
                let text = path.read_to_string(&root)?;
                decode(&text).map_err(|e| AssetError::generation(e.to_string()))
            })
        })
    }
}

impl fmt::Debug for AssetServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetServer")
            .field("root", &self.root)
            .field("tables", &self.tables.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::assets::Generator;

    #[test]
    fn test_same_key_same_asset() {
        let registry = Registry::new();
        let table: ResourceTable<AssetPath, usize> = ResourceTable::new(&registry);
        let factory_calls = AtomicUsize::new(0);

        let make = |path: &AssetPath| {
            factory_calls.fetch_add(1, Ordering::SeqCst);
            let len = path.as_str().len();
            Generator::new(move || Ok::<_, AssetError>(len))
        };

        let a = table.get_or_create(AssetPath::new("models/tree.obj"), make);
        let b = table.get_or_create(AssetPath::from_segments(&["models", "tree.obj"]), make);

        assert_eq!(a, b);
        assert_eq!(factory_calls.load(Ordering::SeqCst), 1);
        assert_eq!(table.len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_then_recreate() {
        let registry = Registry::new();
        let table = ResourceTable::new(&registry);
        let first = table.load(AssetPath::new("a.txt"), |_: &AssetPath| Ok::<_, AssetError>(1));
        let removed = table.remove(&AssetPath::new("a.txt")).unwrap();
        assert_eq!(first, removed);
        assert!(!table.contains(&AssetPath::new("a.txt")));

        let second = table.load(AssetPath::new("a.txt"), |_: &AssetPath| Ok::<_, AssetError>(2));
        assert_ne!(first, second);
        assert_eq!(*first.get().unwrap(), 1);
        assert_eq!(*second.get().unwrap(), 2);
    }

    #[test]
    fn test_non_path_keys() {
        let registry = Registry::new();
        let table: ResourceTable<(u32, u32), String> = ResourceTable::new(&registry);
        let a = table.get_or_create((16, 9), |&(w, h)| {
            Generator::new(move || Ok::<_, AssetError>(format!("{w}x{h}")))
        });
        let b = table.get_or_create((16, 9), |_| {
            Generator::new(|| Ok::<_, AssetError>(String::new()))
        });
        assert_eq!(*b.get().unwrap(), "16x9");
        assert_eq!(a, b);
        assert_eq!(table.keys(), vec![(16, 9)]);
    }

    #[test]
    fn test_clear_unregisters_unused_assets() {
        let registry = Registry::new();
        let table = ResourceTable::new(&registry);
        let kept = table.load(AssetPath::new("kept"), |_: &AssetPath| Ok::<_, AssetError>(0_u8));
        table.load(AssetPath::new("dropped"), |_: &AssetPath| Ok::<_, AssetError>(1_u8));
        assert_eq!(registry.len(), 2);

        table.clear();
        assert!(table.is_empty());
        assert_eq!(registry.len(), 1);
        assert_eq!(*kept.get().unwrap(), 0);
    }

    #[test]
    fn test_load_with_cleanup() {
        let registry = Registry::new();
        let table = ResourceTable::new(&registry);
        let cleanups = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&cleanups);
        let asset = table.load_with_cleanup(
            AssetPath::new("gpu/buffer"),
            |_: &AssetPath| Ok::<_, AssetError>(vec![0_u8; 4]),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );
        asset.get().unwrap();
        asset.drop_element();
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_server_loads_files_per_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("numbers.txt"), "1 2 3").unwrap();

        let registry = Registry::new();
        let server = AssetServer::new(&registry, dir.path());

        let sum = server.load_text("numbers.txt", |text: &str| {
            text.split_whitespace()
                .map(str::parse::<u32>)
                .sum::<Result<u32, _>>()
        });
        let raw = server.load("numbers.txt", |bytes: &[u8]| Ok::<_, AssetError>(bytes.to_vec()));
        let sum_again = server.load_text("numbers.txt", |_: &str| Ok::<u32, AssetError>(0));

        assert_eq!(*sum.get().unwrap(), 6);
        assert_eq!(raw.get().unwrap().len(), 5);
        assert_eq!(sum, sum_again);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_server_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new();
        let server = AssetServer::new(&registry, dir.path());

        let missing = server.load("nope.bin", |bytes: &[u8]| Ok::<_, AssetError>(bytes.len()));
        let err = missing.get().unwrap_err();
        assert!(matches!(err, AssetError::Load { ref key, .. } if key == "nope.bin"));
        assert!(err.to_string().contains("Could not find resource nope.bin"));
    }
}
