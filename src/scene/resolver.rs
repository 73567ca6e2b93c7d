//! Asset resolution.
//!
//! The resolver is a black-box collaborator: given a candidate asset path
//! (anchored to the layer it was authored in), it either returns a
//! resolved location or reports the asset missing. Template clip
//! derivation leans on this heavily - unresolvable candidates are normal
//! and silently skipped.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use parking_lot::RwLock;

use crate::scene::{Layer, LayerHandle};

/// Resolve `candidate` relative to the directory of `anchor`.
///
/// Absolute candidates are returned unchanged; relative ones are joined
/// onto the anchor's directory textually.
pub fn anchor_relative_path(anchor: &str, candidate: &str) -> String {
    if candidate.starts_with('/') || Path::new(candidate).is_absolute() {
        return candidate.to_string();
    }
    match anchor.rfind('/') {
        Some(i) => format!("{}/{}", &anchor[..i], candidate),
        None => candidate.to_string(),
    }
}

/// Black-box asset resolver.
pub trait AssetResolver: Send + Sync {
    /// Resolve a candidate asset path relative to an anchor layer
    /// identifier. Returns the resolved path, or None if the asset does
    /// not exist.
    fn resolve(&self, anchor: &str, candidate: &str) -> Option<String>;

    /// Open the layer at a previously resolved path. Resolvers without
    /// access to layer content return None and clip queries degrade to
    /// "no samples".
    fn open(&self, resolved: &str) -> Option<LayerHandle> {
        let _ = resolved;
        None
    }
}

/// In-memory resolver backed by a registry of layers.
///
/// The primary resolver for tests and for callers that assemble layers
/// programmatically.
#[derive(Default)]
pub struct MemoryResolver {
    layers: BTreeMap<String, LayerHandle>,
}

impl MemoryResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a layer under its resolved path.
    pub fn insert(&mut self, path: impl Into<String>, layer: LayerHandle) {
        self.layers.insert(path.into(), layer);
    }

    /// Register an empty layer under a path, making it resolvable.
    pub fn insert_empty(&mut self, path: impl Into<String>) {
        let path = path.into();
        let layer = Layer::new(path.clone());
        self.layers.insert(path, LayerHandle::new(layer));
    }
}

impl AssetResolver for MemoryResolver {
    fn resolve(&self, anchor: &str, candidate: &str) -> Option<String> {
        let full = anchor_relative_path(anchor, candidate);
        self.layers.contains_key(&full).then_some(full)
    }

    fn open(&self, resolved: &str) -> Option<LayerHandle> {
        self.layers.get(resolved).cloned()
    }
}

/// Filesystem resolver: a candidate resolves when the file exists.
///
/// `open` is unsupported - layer file formats are outside this library.
pub struct OsResolver;

impl AssetResolver for OsResolver {
    fn resolve(&self, anchor: &str, candidate: &str) -> Option<String> {
        let full = anchor_relative_path(anchor, candidate);
        Path::new(&full).exists().then_some(full)
    }
}

/// Short-lived memoizing wrapper around a resolver.
///
/// Template derivation resolves many candidates against the same
/// directory; a scope holder opened around such a batch de-duplicates the
/// calls. Purely a performance aid - correctness never depends on it.
pub struct ScopedResolverCache<'a> {
    inner: &'a dyn AssetResolver,
    cache: RwLock<HashMap<(String, String), Option<String>>>,
}

impl<'a> ScopedResolverCache<'a> {
    /// Open a caching scope over another resolver.
    pub fn new(inner: &'a dyn AssetResolver) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

impl AssetResolver for ScopedResolverCache<'_> {
    fn resolve(&self, anchor: &str, candidate: &str) -> Option<String> {
        let key = (anchor.to_string(), candidate.to_string());
        if let Some(cached) = self.cache.read().get(&key) {
            return cached.clone();
        }
        let result = self.inner.resolve(anchor, candidate);
        self.cache.write().insert(key, result.clone());
        result
    }

    fn open(&self, resolved: &str) -> Option<LayerHandle> {
        self.inner.open(resolved)
    }
}
