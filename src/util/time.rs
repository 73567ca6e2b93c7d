//! Time types for clip resolution.
//!
//! Stage ("external") and clip ("internal") times are both measured in
//! time codes. Clip intervals use sentinel values that bound every real
//! authored time, so the first clip of a set covers all time before its
//! first activation and the last covers all time after.

/// Time code - the unit of stage and clip time.
pub type TimeCode = f64;

/// Sentinel bounding all real times from below. The first clip interval
/// in a set starts here.
pub const EARLIEST_TIME: TimeCode = f64::NEG_INFINITY;

/// Sentinel bounding all real times from above. The last clip interval
/// in a set ends here.
pub const LATEST_TIME: TimeCode = f64::INFINITY;

/// A time interval with independently closed or open endpoints.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    pub min: TimeCode,
    pub max: TimeCode,
    pub min_closed: bool,
    pub max_closed: bool,
}

impl Interval {
    /// Closed interval [min, max].
    pub fn closed(min: TimeCode, max: TimeCode) -> Self {
        Self { min, max, min_closed: true, max_closed: true }
    }

    /// Half-open interval [min, max) - the shape of a clip's active range.
    pub fn half_open(min: TimeCode, max: TimeCode) -> Self {
        Self { min, max, min_closed: true, max_closed: false }
    }

    /// Check whether the interval contains no points.
    pub fn is_empty(&self) -> bool {
        self.min > self.max || (self.min == self.max && !(self.min_closed && self.max_closed))
    }

    /// Check whether a time lies inside the interval.
    pub fn contains(&self, t: TimeCode) -> bool {
        if t < self.min || t > self.max {
            return false;
        }
        if t == self.min && !self.min_closed {
            return false;
        }
        if t == self.max && !self.max_closed {
            return false;
        }
        true
    }

    /// Check whether two intervals share at least one point.
    pub fn intersects(&self, other: &Interval) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        if self.min > other.max || other.min > self.max {
            return false;
        }
        if self.min == other.max && !(self.min_closed && other.max_closed) {
            return false;
        }
        if other.min == self.max && !(other.min_closed && self.max_closed) {
            return false;
        }
        true
    }
}

/// Format a time for diagnostics, rendering the sentinels as "-inf"/"inf".
pub fn format_time(t: TimeCode) -> String {
    if t == EARLIEST_TIME {
        "-inf".to_string()
    } else if t == LATEST_TIME {
        "inf".to_string()
    } else {
        format!("{:.3}", t)
    }
}
