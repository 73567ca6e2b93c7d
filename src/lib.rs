//! # usd-clips
//!
//! Clip-set resolution and time-sample lookup for USD-style scene
//! description.
//!
//! Value clips let a prim source its time-varying attribute values from a
//! sequence of external files ("clips"), each active over a window of
//! stage time. This crate composes the authored clip metadata across a
//! prim's composition structure, expands templated clip sequences from
//! `#`-pattern filenames, validates the result, and answers point and
//! bracketing time-sample queries against the active clip.
//!
//! ## Modules
//!
//! - [`util`] - Errors, time codes, intervals
//! - [`scene`] - Scene-description boundary (paths, values, layers,
//!   asset resolution)
//! - [`compose`] - Clip metadata access and clip set definition
//!   composition over a prim index
//! - [`clip`] - Value clips, template derivation, clip set queries
//!
//! ## Example
//!
//! ```ignore
//! use usd_clips::prelude::*;
//!
//! let sets = compose_clip_sets(&prim_index, &resolver, &ClipsConfig::default());
//! for set in &sets {
//!     let value = set.query_time_sample(&attr, 101.0, &LinearInterpolator, &resolver);
//!     println!("{}: {:?}", set.name(), value);
//! }
//! ```

pub mod util;
pub mod scene;
pub mod compose;
pub mod clip;

// Re-export commonly used types
pub use util::{Error, Result, TimeCode, EARLIEST_TIME, LATEST_TIME};
pub use clip::{compose_clip_sets, ClipSet, ValueClip};
pub use compose::{compose_clip_set_definitions, ClipSetDefinition, ClipsConfig};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clip::{
        compose_clip_sets, ClipSet, HeldInterpolator, Interpolator, LinearInterpolator, ValueClip,
    };
    pub use crate::compose::{
        compose_clip_set_definitions, ClipSetDefinition, ClipsAccessor, ClipsConfig, PrimIndex,
    };
    pub use crate::compose::CompositionNode;
    pub use crate::scene::{
        AssetResolver, Dictionary, Layer, LayerHandle, LayerOffset, LayerStack, LayerStackHandle,
        MemoryResolver, OsResolver, ScenePath, Value,
    };
    pub use crate::util::{Error, Result, TimeCode, EARLIEST_TIME, LATEST_TIME};
}
