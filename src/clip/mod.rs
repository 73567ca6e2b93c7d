//! Value clips and clip sets.
//!
//! - `template`: derive clip tables from a `#`-pattern asset path
//! - `interpolator`: held / linear sample interpolation
//! - `clip`: a single clip interval and its time mapping
//! - `set`: the validated, queryable clip set

#[allow(clippy::module_inception)]
mod clip;
mod interpolator;
mod set;
mod template;

pub use clip::{TimeMapping, TimeMappings, ValueClip};
pub use interpolator::{HeldInterpolator, Interpolator, LinearInterpolator};
pub use set::{compose_clip_sets, ClipSet};
pub use template::{derive_clip_info, DerivedClipInfo};
