//! Derived assets
//!
//! A derived asset builds its element from another asset's element, e.g. a
//! mesh extracted from a loaded model file. The source element is only
//! borrowed for the duration of the transform; source and derived asset are
//! dropped and regenerated independently.

use super::error::AssetError;
use super::handle::Asset;
use super::regenerate::{Cleanup, Regenerate};

/// Strategy that reads a source asset and transforms its element
struct Derived<A, F> {
    source: Asset<A>,
    transform: F,
}

impl<A, B, F> Regenerate<B> for Derived<A, F>
where
    A: Send + Sync + 'static,
    F: Fn(&A) -> Result<B, AssetError> + Send + Sync,
{
    fn produce(&self) -> Result<B, AssetError> {
        let element = self.source.get()?;
        (self.transform)(&element)
    }

    fn describe(&self) -> String {
        format!("derived from {}", self.source.describe())
    }
}

impl<A: Send + Sync + 'static> Asset<A> {
    /// Create an asset whose element is `transform` applied to this asset's
    /// element.
    ///
    /// The new asset is registered with the same registry and keeps this
    /// asset (not its element) alive.
    pub fn derive<B, F>(&self, transform: F) -> Asset<B>
    where
        B: Send + Sync + 'static,
        F: Fn(&A) -> B + Send + Sync + 'static,
    {
        self.derive_from(move |a| Ok(transform(a)), None)
    }

    /// Like [`derive`](Self::derive), running `cleanup` on every element the
    /// derived asset drops
    pub fn derive_with_cleanup<B, F, C>(&self, transform: F, cleanup: C) -> Asset<B>
    where
        B: Send + Sync + 'static,
        F: Fn(&A) -> B + Send + Sync + 'static,
        C: Fn(&B) -> Result<(), AssetError> + Send + Sync + 'static,
    {
        self.derive_from(move |a| Ok(transform(a)), Some(Box::new(cleanup)))
    }

    /// Like [`derive`](Self::derive) with a transform that may fail
    pub fn try_derive<B, F>(&self, transform: F) -> Asset<B>
    where
        B: Send + Sync + 'static,
        F: Fn(&A) -> Result<B, AssetError> + Send + Sync + 'static,
    {
        self.derive_from(transform, None)
    }

    fn derive_from<B, F>(&self, transform: F, cleanup: Option<Cleanup<B>>) -> Asset<B>
    where
        B: Send + Sync + 'static,
        F: Fn(&A) -> Result<B, AssetError> + Send + Sync + 'static,
    {
        let source = Derived {
            source: self.clone(),
            transform,
        };
        Asset::from_source(self.registry(), source, cleanup)
    }
}
