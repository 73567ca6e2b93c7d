//! A single value clip.
//!
//! A [`ValueClip`] names an asset layer, the prim subtree it provides
//! samples for, the half-open `[start, end)` stage-time window in which
//! it is active, and the `times` mapping between stage (external) time
//! and clip-internal time. The mapping is piecewise linear and
//! many-to-one: several external times may map to one internal time, so
//! internal-to-external translation always searches the whole mapping.

use std::fmt;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::warn;

use crate::clip::Interpolator;
use crate::scene::{AssetResolver, Layer, LayerHandle, LayerStackHandle, ScenePath, Value};
use crate::util::{format_time, Interval, TimeCode};

/// One knot of the stage-to-clip time mapping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeMapping {
    /// Stage time.
    pub external: TimeCode,
    /// Time inside the clip layer.
    pub internal: TimeCode,
}

impl TimeMapping {
    pub fn new(external: TimeCode, internal: TimeCode) -> Self {
        Self { external, internal }
    }
}

/// The stage-to-clip mapping table. Typically a handful of knots, so it
/// lives inline.
pub type TimeMappings = SmallVec<[TimeMapping; 8]>;

/// Find the mapping segment `(m1, m2)` bracketing `time` by external
/// time. Relies on the sentinel knots duplicated at both ends of the
/// table; never returns `m1 == m2`.
fn bracketing_time_segment(times: &[TimeMapping], time: TimeCode) -> Option<(usize, usize)> {
    if times.is_empty() {
        return None;
    }
    if time <= times[0].external {
        Some((0, 1))
    } else if time >= times[times.len() - 1].external {
        Some((times.len() - 2, times.len() - 1))
    } else {
        let m2 = times.partition_point(|m| m.external < time);
        Some((m2 - 1, m2))
    }
}

/// Bracket `time` within a sorted, nonempty list of external times,
/// clamping to the ends.
fn bracket_sorted_times(times: &[TimeCode], time: TimeCode) -> (TimeCode, TimeCode) {
    let first = times[0];
    let last = times[times.len() - 1];
    if time <= first {
        (first, first)
    } else if time >= last {
        (last, last)
    } else {
        let upper_idx = times.partition_point(|t| *t < time);
        let upper = times[upper_idx];
        if upper == time {
            (time, time)
        } else {
            (times[upper_idx - 1], upper)
        }
    }
}

fn bracket_mapping_times(times: &[TimeMapping], time: TimeCode) -> (TimeCode, TimeCode) {
    let first = times[0].external;
    let last = times[times.len() - 1].external;
    if time <= first {
        (first, first)
    } else if time >= last {
        (last, last)
    } else {
        let upper_idx = times.partition_point(|m| m.external < time);
        let upper = times[upper_idx].external;
        if upper == time {
            (time, time)
        } else {
            (times[upper_idx - 1].external, upper)
        }
    }
}

/// One clip in a clip set.
pub struct ValueClip {
    /// Layer stack the clip metadata was anchored in.
    pub source_layer_stack: LayerStackHandle,
    /// Prim path at the anchoring site.
    pub source_prim_path: ScenePath,
    /// Index of the anchoring layer; the clip asset path resolves
    /// relative to it.
    pub source_layer_index: usize,
    /// Asset path of the clip layer.
    pub asset_path: String,
    /// Root of the subtree inside the clip layer that provides values.
    pub clip_prim_path: ScenePath,
    /// Stage time at which this clip becomes active (inclusive).
    pub start_time: TimeCode,
    /// Stage time at which this clip stops being active (exclusive).
    pub end_time: TimeCode,

    /// Sorted mapping knots with sentinels duplicated at both ends.
    times: TimeMappings,

    /// Lazily opened clip layer. Opening is deferred until a query needs
    /// actual sample data.
    layer: Mutex<Option<LayerHandle>>,
}

const DUMMY_CLIP_TAG: &str = "dummy_clip";

impl ValueClip {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source_layer_stack: LayerStackHandle,
        source_prim_path: ScenePath,
        source_layer_index: usize,
        asset_path: impl Into<String>,
        clip_prim_path: ScenePath,
        start_time: TimeCode,
        end_time: TimeCode,
        mut times: TimeMappings,
    ) -> Self {
        // Sort the mapping and duplicate the end knots as sentinels so
        // segment lookups never fall off the table.
        if !times.is_empty() {
            times.sort_by(|a, b| a.external.total_cmp(&b.external));
            let front = times[0];
            let back = times[times.len() - 1];
            times.insert(0, front);
            times.push(back);
        }

        Self {
            source_layer_stack,
            source_prim_path,
            source_layer_index,
            asset_path: asset_path.into(),
            clip_prim_path,
            start_time,
            end_time,
            times,
            layer: Mutex::new(None),
        }
    }

    /// The stage-time window in which this clip is active.
    pub fn active_interval(&self) -> Interval {
        Interval::half_open(self.start_time, self.end_time)
    }

    /// Map a stage-namespace path into the clip layer's namespace.
    pub fn translate_path_to_clip(&self, path: &ScenePath) -> ScenePath {
        path.replace_prefix(&self.source_prim_path, &self.clip_prim_path)
    }

    /// Map a stage time to a time inside the clip layer.
    pub fn translate_time_to_internal(&self, time: TimeCode) -> TimeCode {
        let Some((i1, i2)) = bracketing_time_segment(&self.times, time) else {
            return time;
        };
        let m1 = self.times[i1];
        let m2 = self.times[i2];

        // Exact hits short-circuit to avoid precision loss in the lerp.
        if m1.external == m2.external || time == m1.external {
            m1.internal
        } else if time == m2.external {
            m2.internal
        } else {
            (m2.internal - m1.internal) / (m2.external - m1.external) * (time - m1.external)
                + m1.internal
        }
    }

    fn translate_time_to_external(
        &self,
        internal: TimeCode,
        m1: TimeMapping,
        m2: TimeMapping,
    ) -> TimeCode {
        if m1.internal == m2.internal || internal == m1.internal {
            m1.external
        } else if internal == m2.internal {
            m2.external
        } else {
            (m2.external - m1.external) / (m2.internal - m1.internal) * (internal - m1.internal)
                + m1.external
        }
    }

    /// Open the clip layer, caching the handle. An unresolvable clip
    /// warns once and degrades to an anonymous empty layer so every
    /// subsequent query sees "no samples" instead of re-erroring.
    fn layer_for_clip(&self, resolver: &dyn AssetResolver) -> LayerHandle {
        let mut guard = self.layer.lock();
        if let Some(layer) = guard.as_ref() {
            return layer.clone();
        }

        let anchor = self
            .source_layer_stack
            .layer(self.source_layer_index)
            .map(|l| l.identifier().to_string())
            .unwrap_or_default();
        let opened = resolver
            .resolve(&anchor, &self.asset_path)
            .and_then(|resolved| resolver.open(&resolved));

        let layer = match opened {
            Some(layer) => layer,
            None => {
                warn!("Unable to open clip layer @{}@", self.asset_path);
                LayerHandle::new(Layer::anonymous(DUMMY_CLIP_TAG))
            }
        };

        *guard = Some(layer.clone());
        layer
    }

    /// The clip layer if it has already been opened successfully.
    pub fn layer_if_open(&self) -> Option<LayerHandle> {
        self.layer
            .lock()
            .as_ref()
            .filter(|l| !l.is_anonymous())
            .cloned()
    }

    /// Whether the clip layer has any samples for a property.
    pub fn has_authored_samples(&self, path: &ScenePath, resolver: &dyn AssetResolver) -> bool {
        let clip_path = self.translate_path_to_clip(path);
        self.layer_for_clip(resolver).has_time_samples(&clip_path)
    }

    /// The clip layer's default value for a property, if authored.
    pub fn default_value(&self, path: &ScenePath, resolver: &dyn AssetResolver) -> Option<Value> {
        let clip_path = self.translate_path_to_clip(path);
        self.layer_for_clip(resolver)
            .default_value(&clip_path)
            .cloned()
    }

    /// Query a property value at a stage time.
    ///
    /// The time is translated into the clip layer; a sample authored at
    /// exactly that internal time is returned directly, otherwise the
    /// bracketing samples are interpolated.
    pub fn query_time_sample(
        &self,
        path: &ScenePath,
        time: TimeCode,
        interpolator: &dyn Interpolator,
        resolver: &dyn AssetResolver,
    ) -> Option<Value> {
        let clip_path = self.translate_path_to_clip(path);
        let clip_time = self.translate_time_to_internal(time);
        let layer = self.layer_for_clip(resolver);

        if let Some(value) = layer.query_time_sample(&clip_path, clip_time) {
            return Some(value.clone());
        }

        let (lower, upper) = layer.bracketing_time_samples(&clip_path, clip_time)?;
        let lower_value = layer.query_time_sample(&clip_path, lower)?.clone();
        if clip_time <= lower {
            return Some(lower_value);
        }
        let upper_value = layer.query_time_sample(&clip_path, upper)?.clone();
        if clip_time >= upper {
            return Some(upper_value);
        }
        Some(interpolator.interpolate(&lower_value, &upper_value, lower, upper, clip_time))
    }

    /// Try to translate `time_in_clip` back to the external domain using
    /// the segment `(m1, m2)`.
    fn translate_bracket(
        &self,
        m1: TimeMapping,
        m2: TimeMapping,
        time: TimeCode,
        time_in_clip: TimeCode,
        lower_upper_match: bool,
        translating_lower: bool,
    ) -> Option<TimeCode> {
        let lower = m1.internal.min(m2.internal);
        let upper = m1.internal.max(m2.internal);
        if !(lower <= time_in_clip && time_in_clip <= upper) {
            return None;
        }

        if m1.internal != m2.internal {
            Some(self.translate_time_to_external(time_in_clip, m1, m2))
        } else if lower_upper_match && time == m1.external {
            Some(m1.external)
        } else if lower_upper_match && time == m2.external {
            Some(m2.external)
        } else if translating_lower {
            Some(m1.external)
        } else {
            Some(m2.external)
        }
    }

    fn bracketing_time_samples_internal(
        &self,
        path: &ScenePath,
        time: TimeCode,
        resolver: &dyn AssetResolver,
    ) -> Option<(TimeCode, TimeCode)> {
        let layer = self.layer_for_clip(resolver);
        let clip_path = self.translate_path_to_clip(path);
        let time_in_clip = self.translate_time_to_internal(time);

        let (lower_in_clip, upper_in_clip) =
            layer.bracketing_time_samples(&clip_path, time_in_clip)?;

        let Some((m1, m2)) = bracketing_time_segment(&self.times, time) else {
            return Some((lower_in_clip, upper_in_clip));
        };

        // The external-to-internal mapping is many-to-one, so a given
        // internal time can translate to multiple external times. Walk
        // outward from the segment containing `time` to find the nearest
        // translation on each side.
        let lower_upper_match = lower_in_clip == upper_in_clip;

        let mut translated_lower = None;
        for (i1, i2) in (0..=m1).rev().zip((0..=m2).rev()) {
            translated_lower = self.translate_bracket(
                self.times[i1],
                self.times[i2],
                time,
                lower_in_clip,
                lower_upper_match,
                true,
            );
            if translated_lower.is_some() {
                break;
            }
        }

        let mut translated_upper = None;
        for (i1, i2) in (m1..self.times.len()).zip(m2..self.times.len()) {
            translated_upper = self.translate_bracket(
                self.times[i1],
                self.times[i2],
                time,
                upper_in_clip,
                lower_upper_match,
                false,
            );
            if translated_upper.is_some() {
                break;
            }
        }

        match (translated_lower, translated_upper) {
            (Some(lower), Some(upper)) => Some((lower, upper)),
            (Some(lower), None) => Some((lower, lower)),
            (None, Some(upper)) => Some((upper, upper)),
            (None, None) => {
                // Both internal times fall outside the mapping range;
                // clamp to the nearest mapped external time. The clip may
                // not have a sample exactly there, which query_time_sample
                // handles by interpolating in the internal domain.
                let front = self.times[0];
                let back = self.times[self.times.len() - 1];
                let clamp = |t: TimeCode| {
                    if t < front.internal {
                        Some(front.external)
                    } else if t > back.internal {
                        Some(back.external)
                    } else {
                        None
                    }
                };
                match (clamp(lower_in_clip), clamp(upper_in_clip)) {
                    (Some(lower), Some(upper)) => Some((lower, upper)),
                    (Some(lower), None) => Some((lower, lower)),
                    (None, Some(upper)) => Some((upper, upper)),
                    (None, None) => None,
                }
            }
        }
    }

    /// Get the stage times bracketing `time` for a property, merging the
    /// clip layer's samples with the authored mapping knots.
    pub fn bracketing_time_samples(
        &self,
        path: &ScenePath,
        time: TimeCode,
        resolver: &dyn AssetResolver,
    ) -> Option<(TimeCode, TimeCode)> {
        let from_clip = self.bracketing_time_samples_internal(path, time, resolver);
        let from_mappings = if self.times.is_empty() {
            None
        } else {
            Some(bracket_mapping_times(&self.times, time))
        };

        match (from_clip, from_mappings) {
            (Some((clip_lower, clip_upper)), Some((map_lower, map_upper))) => {
                let mut candidates = vec![clip_lower, clip_upper, map_lower, map_upper];
                candidates.sort_by(f64::total_cmp);
                candidates.dedup();
                Some(bracket_sorted_times(&candidates, time))
            }
            (None, Some(bracket)) => Some(bracket),
            (Some(bracket), None) => Some(bracket),
            (None, None) => None,
        }
    }

    /// Internal sample times for a property, merged with the mapping
    /// knots' internal times.
    fn merged_internal_times(&self, path: &ScenePath, resolver: &dyn AssetResolver) -> Vec<TimeCode> {
        let clip_path = self.translate_path_to_clip(path);
        let mut times = self.layer_for_clip(resolver).list_time_samples(&clip_path);
        times.extend(self.times.iter().map(|m| m.internal));
        times.sort_by(f64::total_cmp);
        times.dedup();
        times
    }

    /// List the stage times at which this clip contributes samples for a
    /// property.
    pub fn list_time_samples(
        &self,
        path: &ScenePath,
        resolver: &dyn AssetResolver,
    ) -> Vec<TimeCode> {
        let internal_times = self.merged_internal_times(path, resolver);
        if self.times.is_empty() {
            return internal_times;
        }

        let mut samples: Vec<TimeCode> = Vec::new();
        let active = self.active_interval();

        // Every internal sample has to be checked against the entire
        // mapping function; a mapping like {0:5, 5:10, 10:5} sends one
        // internal time to several external times.
        for &t in &internal_times {
            for pair in self.times.windows(2) {
                let (m1, m2) = (pair[0], pair[1]);

                // Skip mapping segments entirely outside the window in
                // which this clip is active.
                let segment = Interval::closed(m1.external, m2.external);
                if !segment.intersects(&active) {
                    continue;
                }

                if m1.internal <= t && t <= m2.internal {
                    if m1.internal == m2.internal {
                        samples.push(m1.external);
                        samples.push(m2.external);
                    } else {
                        samples.push(self.translate_time_to_external(t, m1, m2));
                    }
                }
            }
        }

        // Internal samples entirely outside the mapping range clamp to
        // the nearest mapped external time, mirroring the bracketing
        // query's behavior.
        if samples.is_empty() {
            let front = self.times[0];
            let back = self.times[self.times.len() - 1];
            for &t in &internal_times {
                if t < front.internal {
                    samples.push(front.external);
                } else if t > back.internal {
                    samples.push(back.external);
                }
            }
        }

        samples.sort_by(f64::total_cmp);
        samples.dedup();
        samples
    }
}

impl fmt::Display for ValueClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}<{}> (start: {} end: {})",
            self.asset_path,
            self.clip_prim_path,
            format_time(self.start_time),
            format_time(self.end_time)
        )
    }
}

impl fmt::Debug for ValueClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueClip")
            .field("asset_path", &self.asset_path)
            .field("clip_prim_path", &self.clip_prim_path)
            .field("start_time", &self.start_time)
            .field("end_time", &self.end_time)
            .field("times", &self.times)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{HeldInterpolator, LinearInterpolator};
    use crate::scene::{LayerStack, MemoryResolver};
    use crate::util::{EARLIEST_TIME, LATEST_TIME};
    use smallvec::smallvec;
    use std::sync::Arc;

    fn prim(s: &str) -> ScenePath {
        ScenePath::parse(s).unwrap()
    }

    fn prop(s: &str) -> ScenePath {
        ScenePath::parse(s).unwrap()
    }

    /// A clip whose layer has `size` samples: 0.0 at t=0, 10.0 at t=10.
    fn test_setup(times: TimeMappings) -> (ValueClip, MemoryResolver) {
        let mut clip_layer = Layer::new("clip.usd");
        let attr = prop("/Clip/Model.size");
        clip_layer.set_time_sample(&attr, 0.0, Value::Double(0.0));
        clip_layer.set_time_sample(&attr, 10.0, Value::Double(10.0));

        let mut resolver = MemoryResolver::new();
        resolver.insert("clip.usd", Arc::new(clip_layer));

        let stack = Arc::new(LayerStack::new(
            "stack:root",
            vec![Arc::new(Layer::new("root.usda"))],
        ));
        let clip = ValueClip::new(
            stack,
            prim("/Model"),
            0,
            "clip.usd",
            prim("/Clip/Model"),
            EARLIEST_TIME,
            LATEST_TIME,
            times,
        );
        (clip, resolver)
    }

    #[test]
    fn test_path_translation() {
        let (clip, _) = test_setup(smallvec![]);
        assert_eq!(
            clip.translate_path_to_clip(&prop("/Model.size")),
            prop("/Clip/Model.size")
        );
        assert_eq!(
            clip.translate_path_to_clip(&prop("/Model/Child.size")),
            prop("/Clip/Model/Child.size")
        );
        // Paths outside the source subtree pass through unchanged.
        assert_eq!(
            clip.translate_path_to_clip(&prop("/Other.size")),
            prop("/Other.size")
        );
    }

    #[test]
    fn test_time_translation_identity_without_mappings() {
        let (clip, _) = test_setup(smallvec![]);
        assert_eq!(clip.translate_time_to_internal(3.5), 3.5);
    }

    #[test]
    fn test_time_translation_linear() {
        let (clip, _) = test_setup(smallvec![
            TimeMapping::new(0.0, 0.0),
            TimeMapping::new(10.0, 5.0),
        ]);
        assert_eq!(clip.translate_time_to_internal(0.0), 0.0);
        assert_eq!(clip.translate_time_to_internal(4.0), 2.0);
        assert_eq!(clip.translate_time_to_internal(10.0), 5.0);
        // Outside the mapping range the end segments extrapolate flat via
        // the sentinels.
        assert_eq!(clip.translate_time_to_internal(-5.0), 0.0);
        assert_eq!(clip.translate_time_to_internal(20.0), 5.0);
    }

    #[test]
    fn test_query_exact_and_interpolated() {
        let (clip, resolver) = test_setup(smallvec![
            TimeMapping::new(0.0, 0.0),
            TimeMapping::new(20.0, 10.0),
        ]);
        let attr = prop("/Model.size");

        let v = clip
            .query_time_sample(&attr, 0.0, &HeldInterpolator, &resolver)
            .unwrap();
        assert_eq!(v, Value::Double(0.0));

        // External 10 -> internal 5, between the clip's samples.
        let v = clip
            .query_time_sample(&attr, 10.0, &LinearInterpolator, &resolver)
            .unwrap();
        assert_eq!(v, Value::Double(5.0));

        let v = clip
            .query_time_sample(&attr, 10.0, &HeldInterpolator, &resolver)
            .unwrap();
        assert_eq!(v, Value::Double(0.0));
    }

    #[test]
    fn test_query_missing_property() {
        let (clip, resolver) = test_setup(smallvec![]);
        assert!(clip
            .query_time_sample(&prop("/Model.missing"), 0.0, &HeldInterpolator, &resolver)
            .is_none());
    }

    #[test]
    fn test_unresolvable_clip_degrades_to_no_samples() {
        let stack = Arc::new(LayerStack::new(
            "stack:root",
            vec![Arc::new(Layer::new("root.usda"))],
        ));
        let clip = ValueClip::new(
            stack,
            prim("/Model"),
            0,
            "missing.usd",
            prim("/Model"),
            EARLIEST_TIME,
            LATEST_TIME,
            smallvec![],
        );
        let resolver = MemoryResolver::new();
        assert!(clip
            .query_time_sample(&prop("/Model.size"), 0.0, &HeldInterpolator, &resolver)
            .is_none());
        assert!(clip.layer_if_open().is_none());
    }

    #[test]
    fn test_bracketing_many_to_one_mapping() {
        // External 0..20 maps down onto internal 0..10 and back: the
        // mapping {0:0, 10:10, 20:0} revisits internal times.
        let (clip, resolver) = test_setup(smallvec![
            TimeMapping::new(0.0, 0.0),
            TimeMapping::new(10.0, 10.0),
            TimeMapping::new(20.0, 0.0),
        ]);
        let attr = prop("/Model.size");

        // At external 15 (internal 5) the nearest clip samples translate
        // within the descending segment.
        let (lower, upper) = clip
            .bracketing_time_samples(&attr, 15.0, &resolver)
            .unwrap();
        assert_eq!((lower, upper), (10.0, 20.0));

        let (lower, upper) = clip.bracketing_time_samples(&attr, 5.0, &resolver).unwrap();
        assert_eq!((lower, upper), (0.0, 10.0));
    }

    #[test]
    fn test_bracketing_merges_mapping_knots() {
        // Clip has samples at internal 0 and 10; mapping adds a knot at
        // external 4 that is not itself a sample time of the layer.
        let (clip, resolver) = test_setup(smallvec![
            TimeMapping::new(0.0, 0.0),
            TimeMapping::new(4.0, 2.0),
            TimeMapping::new(10.0, 10.0),
        ]);
        let attr = prop("/Model.size");

        let (lower, upper) = clip.bracketing_time_samples(&attr, 3.0, &resolver).unwrap();
        assert_eq!((lower, upper), (0.0, 4.0));
    }

    #[test]
    fn test_list_time_samples() {
        let (clip, resolver) = test_setup(smallvec![
            TimeMapping::new(0.0, 0.0),
            TimeMapping::new(20.0, 10.0),
        ]);
        let attr = prop("/Model.size");
        // Layer samples at internal 0 and 10 map to external 0 and 20;
        // the knots themselves add no new times here.
        assert_eq!(clip.list_time_samples(&attr, &resolver), vec![0.0, 20.0]);
    }

    #[test]
    fn test_list_time_samples_without_mappings() {
        let (clip, resolver) = test_setup(smallvec![]);
        let attr = prop("/Model.size");
        assert_eq!(clip.list_time_samples(&attr, &resolver), vec![0.0, 10.0]);
    }

    #[test]
    fn test_display() {
        let (clip, _) = test_setup(smallvec![]);
        assert_eq!(
            clip.to_string(),
            "clip.usd</Clip/Model> (start: -inf end: inf)"
        );
    }
}
