//! Error types for the clip resolution library.

use thiserror::Error;

/// Main error type for clip operations.
///
/// All conditions here are local and recoverable: callers treat a failed
/// clip set as "no clips contribute opinions here" and keep resolving
/// values from weaker sources.
#[derive(Error, Debug)]
pub enum Error {
    /// Path string failed to parse as an absolute scene path
    #[error("Invalid scene path: {0:?}")]
    InvalidPath(String),

    /// Clip set name is empty or otherwise unusable
    #[error("Invalid clip set name: {0:?}")]
    InvalidClipSetName(String),

    /// A field required for clip set construction is not present
    #[error("Missing required clip metadata '{field}' for clip set '{clip_set}'")]
    MissingRequiredField {
        clip_set: String,
        field: &'static str,
    },

    /// The authored clip prim path is unusable
    #[error("Invalid clip prim path {path:?} for clip set '{clip_set}': {reason}")]
    InvalidClipPrimPath {
        clip_set: String,
        path: String,
        reason: String,
    },

    /// An entry in the clip asset path array is an empty string
    #[error("Empty clip asset path at index {index} for clip set '{clip_set}'")]
    EmptyClipAssetPath { clip_set: String, index: usize },

    /// An active entry references a clip index outside the asset path array
    #[error(
        "Clip index {index} at time {time} is outside the range of \
         {count} clip asset paths for clip set '{clip_set}'"
    )]
    ActiveIndexOutOfRange {
        clip_set: String,
        time: f64,
        index: i64,
        count: usize,
    },

    /// Two active entries specify different clips at the same time
    #[error(
        "Conflicting active clips {index_a} and {index_b} at time {time} \
         for clip set '{clip_set}'"
    )]
    ConflictingActiveTimes {
        clip_set: String,
        time: f64,
        index_a: usize,
        index_b: usize,
    },

    /// A stage time appears more than twice in the clip times table
    #[error(
        "Time {time} appears {count} times in clip times for clip set \
         '{clip_set}'; at most two entries per time are allowed"
    )]
    TooManyTimeMappings {
        clip_set: String,
        time: f64,
        count: usize,
    },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Result type alias for clip operations.
pub type Result<T> = std::result::Result<T, Error>;
