//! Composition of clip metadata across a prim's composition structure.
//!
//! - `keys`: field and dictionary key constants
//! - `node`: prim index and composition node types
//! - `metadata`: authoring/reading accessor and legacy-format config
//! - `definition`: the clip set definition composer

pub mod keys;

mod definition;
mod metadata;
mod node;

pub use definition::{compose_clip_set_definitions, ClipSetDefinition};
pub use metadata::{ClipsAccessor, ClipsConfig};
pub use node::{CompositionNode, PrimIndex};
