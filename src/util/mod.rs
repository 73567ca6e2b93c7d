//! Utility types and functions for clip resolution.
//!
//! This module contains fundamental types used throughout the library:
//! - [`TimeCode`] / [`Interval`] - Time values, sentinels and intervals
//! - [`Error`] / [`Result`] - Error handling

mod error;
mod time;

pub use error::*;
pub use time::*;
