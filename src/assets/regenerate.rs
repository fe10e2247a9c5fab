//! Regeneration strategies
//!
//! An asset does not know how to build its element; it holds a strategy value
//! implementing [`Regenerate`] and calls it whenever the element is missing.

use std::fmt;

use super::error::AssetError;

/// Something that can (re)build an asset's element on demand.
pub trait Regenerate<T>: Send + Sync {
    /// Build a fresh element.
    ///
    /// # Errors
    ///
    /// Returns an error if the element cannot be produced. The asset stays
    /// empty and the next `get` tries again.
    fn produce(&self) -> Result<T, AssetError>;

    /// Short human-readable label used in logs and diagnostics
    fn describe(&self) -> String {
        String::from("generated")
    }
}

/// Callback run on an element when it is dropped from its asset
pub type Cleanup<T> = Box<dyn Fn(&T) -> Result<(), AssetError> + Send + Sync>;

/// Strategy backed by a zero-argument generator function.
pub struct Generator<F> {
    generate: F,
}

impl<F> Generator<F> {
    /// Wrap a generator function
    pub fn new(generate: F) -> Self {
        Self { generate }
    }
}

impl<T, F> Regenerate<T> for Generator<F>
where
    F: Fn() -> Result<T, AssetError> + Send + Sync,
{
    fn produce(&self) -> Result<T, AssetError> {
        (self.generate)()
    }
}

impl<F> fmt::Debug for Generator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Generator")
    }
}

/// Strategy that loads its element from a key, usually an
/// [`AssetPath`](super::AssetPath).
///
/// Loader failures are reported as [`AssetError::Load`] carrying the key.
pub struct KeyedLoader<K, T> {
    key: K,
    load: Box<dyn Fn(&K) -> Result<T, String> + Send + Sync>,
}

impl<K: 'static, T: 'static> KeyedLoader<K, T> {
    /// Create a loader for `key`
    pub fn new<L, E>(key: K, loader: L) -> Self
    where
        L: Fn(&K) -> Result<T, E> + Send + Sync + 'static,
        E: fmt::Display + 'static,
    {
        Self {
            key,
            load: Box::new(move |key| loader(key).map_err(|e| e.to_string())),
        }
    }
}

impl<K, T> KeyedLoader<K, T> {
    /// The key this loader reads from
    #[must_use]
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K, T> Regenerate<T> for KeyedLoader<K, T>
where
    K: fmt::Display + Send + Sync,
{
    fn produce(&self) -> Result<T, AssetError> {
        (self.load)(&self.key).map_err(|message| AssetError::Load {
            key: self.key.to_string(),
            message,
        })
    }

    fn describe(&self) -> String {
        self.key.to_string()
    }
}

impl<K: fmt::Debug, T> fmt::Debug for KeyedLoader<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedLoader").field("key", &self.key).finish_non_exhaustive()
    }
}
