//! Sample interpolation strategies.

use glam::DVec2;

use crate::scene::Value;
use crate::util::TimeCode;

/// Strategy for producing a value between two bracketing samples.
pub trait Interpolator {
    fn interpolate(
        &self,
        lower: &Value,
        upper: &Value,
        lower_time: TimeCode,
        upper_time: TimeCode,
        time: TimeCode,
    ) -> Value;
}

/// Held interpolation: the lower bracketing sample wins.
pub struct HeldInterpolator;

impl Interpolator for HeldInterpolator {
    fn interpolate(
        &self,
        lower: &Value,
        _upper: &Value,
        _lower_time: TimeCode,
        _upper_time: TimeCode,
        _time: TimeCode,
    ) -> Value {
        lower.clone()
    }
}

/// Linear interpolation for numeric values; anything else is held.
pub struct LinearInterpolator;

fn lerp(a: f64, b: f64, parameter: f64) -> f64 {
    a + (b - a) * parameter
}

impl Interpolator for LinearInterpolator {
    fn interpolate(
        &self,
        lower: &Value,
        upper: &Value,
        lower_time: TimeCode,
        upper_time: TimeCode,
        time: TimeCode,
    ) -> Value {
        if upper_time <= lower_time {
            return lower.clone();
        }
        let parameter = (time - lower_time) / (upper_time - lower_time);

        match (lower, upper) {
            (Value::Double(a), Value::Double(b)) => Value::Double(lerp(*a, *b, parameter)),
            (Value::DoubleArray(a), Value::DoubleArray(b)) if a.len() == b.len() => {
                Value::DoubleArray(
                    a.iter()
                        .zip(b)
                        .map(|(a, b)| lerp(*a, *b, parameter))
                        .collect(),
                )
            }
            (Value::Vec2dArray(a), Value::Vec2dArray(b)) if a.len() == b.len() => Value::Vec2dArray(
                a.iter()
                    .zip(b)
                    .map(|(a, b)| DVec2::new(lerp(a.x, b.x, parameter), lerp(a.y, b.y, parameter)))
                    .collect(),
            ),
            // Shape mismatches and non-numeric types hold the lower value.
            _ => lower.clone(),
        }
    }
}
