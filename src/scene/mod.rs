//! Scene description collaborators.
//!
//! The clip engine sits on top of a layered scene description store. This
//! module provides the interface surface of those collaborators:
//! - [`ScenePath`] - Absolute prim and property paths
//! - [`Value`] / [`Dictionary`] - Typed metadata values with recursive merge
//! - [`StringListOp`] - List-editing operations (the `clipSets` field)
//! - [`Layer`] / [`LayerStack`] / [`LayerOffset`] - The key-value store
//! - [`AssetResolver`] - Black-box asset path resolution

mod path;
mod value;
mod listop;
mod layer;
mod resolver;

pub use path::ScenePath;
pub use value::{Value, Dictionary};
pub use listop::StringListOp;
pub use layer::{Layer, LayerHandle, LayerOffset, LayerStack, LayerStackHandle, DEFAULT_FIELD};
pub use resolver::{
    AssetResolver, MemoryResolver, OsResolver, ScopedResolverCache, anchor_relative_path,
};
