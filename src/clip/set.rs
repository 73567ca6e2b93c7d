//! Clip sets.
//!
//! A [`ClipSet`] is the validated runtime object built from a composed
//! [`ClipSetDefinition`]: an ordered list of [`ValueClip`] intervals that
//! partition the whole time axis, an optional manifest clip consulted
//! for fallback defaults, and the query logic that picks the active clip
//! for a time.

use tracing::{info, warn};

use crate::clip::{Interpolator, TimeMapping, TimeMappings, ValueClip};
use crate::compose::{compose_clip_set_definitions, ClipSetDefinition, ClipsConfig, PrimIndex};
use crate::scene::{AssetResolver, LayerStackHandle, ScenePath, Value};
use crate::util::{Error, Result, TimeCode, EARLIEST_TIME, LATEST_TIME};

/// A named, queryable set of value clips for one prim.
pub struct ClipSet {
    name: String,
    source_layer_stack: LayerStackHandle,
    source_prim_path: ScenePath,
    clip_prim_path: ScenePath,
    value_clips: Vec<ValueClip>,
    manifest_clip: Option<ValueClip>,
    interpolate_missing_clip_values: bool,
    /// Informational status from construction, e.g. a missing manifest.
    status: Option<String>,
}

impl ClipSet {
    /// Validate a composed definition and build the clip intervals.
    ///
    /// Any violation of the authored-metadata rules fails construction
    /// for this one clip set; callers treat that as "no clips contribute
    /// here" and continue.
    pub fn new(name: impl Into<String>, definition: &ClipSetDefinition) -> Result<ClipSet> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidClipSetName(name));
        }

        let asset_paths =
            definition
                .clip_asset_paths
                .as_ref()
                .ok_or_else(|| Error::MissingRequiredField {
                    clip_set: name.clone(),
                    field: "assetPaths",
                })?;
        let prim_path_str =
            definition
                .clip_prim_path
                .as_ref()
                .ok_or_else(|| Error::MissingRequiredField {
                    clip_set: name.clone(),
                    field: "primPath",
                })?;
        let active = definition
            .clip_active
            .as_ref()
            .ok_or_else(|| Error::MissingRequiredField {
                clip_set: name.clone(),
                field: "active",
            })?;

        let clip_prim_path =
            ScenePath::parse(prim_path_str).map_err(|e| Error::InvalidClipPrimPath {
                clip_set: name.clone(),
                path: prim_path_str.clone(),
                reason: e.to_string(),
            })?;
        if !clip_prim_path.is_prim_path() {
            return Err(Error::InvalidClipPrimPath {
                clip_set: name.clone(),
                path: prim_path_str.clone(),
                reason: "must identify a prim, not a property".to_string(),
            });
        }

        for (index, path) in asset_paths.iter().enumerate() {
            if path.is_empty() {
                return Err(Error::EmptyClipAssetPath {
                    clip_set: name.clone(),
                    index,
                });
            }
        }

        // Sort the activation table and reject malformed entries. Exact
        // duplicate pairs are tolerated; same time with different clips
        // is a hard conflict.
        let mut active: Vec<(TimeCode, usize)> = active
            .iter()
            .map(|entry| {
                let index = entry.y as i64;
                if index < 0 || index as usize >= asset_paths.len() {
                    return Err(Error::ActiveIndexOutOfRange {
                        clip_set: name.clone(),
                        time: entry.x,
                        index,
                        count: asset_paths.len(),
                    });
                }
                Ok((entry.x, index as usize))
            })
            .collect::<Result<_>>()?;
        active.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        active.dedup();
        for pair in active.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(Error::ConflictingActiveTimes {
                    clip_set: name.clone(),
                    time: pair[0].0,
                    index_a: pair[0].1,
                    index_b: pair[1].1,
                });
            }
        }

        // At most two clip-times entries may share a stage time; exactly
        // two expresses an instantaneous jump in the mapping.
        let times = definition.clip_times.clone().unwrap_or_default();
        let mut stage_times: Vec<TimeCode> = times.iter().map(|entry| entry.x).collect();
        stage_times.sort_by(f64::total_cmp);
        let mut run_start = 0;
        for i in 0..stage_times.len() {
            if stage_times[i] != stage_times[run_start] {
                run_start = i;
            }
            let count = i - run_start + 1;
            if count > 2 {
                return Err(Error::TooManyTimeMappings {
                    clip_set: name.clone(),
                    time: stage_times[i],
                    count: stage_times[run_start..]
                        .iter()
                        .filter(|t| **t == stage_times[i])
                        .count(),
                });
            }
        }

        let mappings: TimeMappings = times
            .iter()
            .map(|entry| TimeMapping::new(entry.x, entry.y))
            .collect();

        // One interval per activation entry; the first extends back to
        // the earliest sentinel, the last forward to the latest, so the
        // intervals always cover the whole time axis.
        let mut value_clips = Vec::with_capacity(active.len());
        for (i, (time, clip_index)) in active.iter().enumerate() {
            let start = if i == 0 { EARLIEST_TIME } else { *time };
            let end = match active.get(i + 1) {
                Some((next_time, _)) => *next_time,
                None => LATEST_TIME,
            };
            value_clips.push(ValueClip::new(
                definition.source_layer_stack.clone(),
                definition.source_prim_path.clone(),
                definition.index_of_layer_where_asset_paths_found,
                asset_paths[*clip_index].clone(),
                clip_prim_path.clone(),
                start,
                end,
                mappings.clone(),
            ));
        }

        let mut status = None;
        let manifest_clip = match &definition.clip_manifest_asset_path {
            Some(manifest_path) => Some(ValueClip::new(
                definition.source_layer_stack.clone(),
                definition.source_prim_path.clone(),
                definition.index_of_layer_where_asset_paths_found,
                manifest_path.clone(),
                clip_prim_path.clone(),
                EARLIEST_TIME,
                LATEST_TIME,
                // The manifest is never queried for time samples.
                TimeMappings::new(),
            )),
            None => {
                info!(
                    "No manifest specified for clip set '{}' on prim <{}>",
                    name, definition.source_prim_path
                );
                status = Some("no manifest specified".to_string());
                None
            }
        };

        Ok(ClipSet {
            name,
            source_layer_stack: definition.source_layer_stack.clone(),
            source_prim_path: definition.source_prim_path.clone(),
            clip_prim_path,
            value_clips,
            manifest_clip,
            interpolate_missing_clip_values: definition
                .interpolate_missing_clip_values
                .unwrap_or(false),
            status,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_layer_stack(&self) -> &LayerStackHandle {
        &self.source_layer_stack
    }

    pub fn source_prim_path(&self) -> &ScenePath {
        &self.source_prim_path
    }

    pub fn clip_prim_path(&self) -> &ScenePath {
        &self.clip_prim_path
    }

    /// The clip intervals, sorted by start time.
    pub fn value_clips(&self) -> &[ValueClip] {
        &self.value_clips
    }

    pub fn manifest_clip(&self) -> Option<&ValueClip> {
        self.manifest_clip.as_ref()
    }

    pub fn interpolate_missing_clip_values(&self) -> bool {
        self.interpolate_missing_clip_values
    }

    /// Informational construction status, if any.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Find the clip active at `time`.
    ///
    /// The intervals partition the time axis, so this succeeds for every
    /// real time whenever the set has any clips at all.
    pub fn active_clip(&self, time: TimeCode) -> Option<&ValueClip> {
        let idx = self
            .value_clips
            .partition_point(|clip| clip.start_time <= time);
        if idx == 0 {
            return None;
        }
        self.value_clips.get(idx - 1)
    }

    fn active_clip_index(&self, time: TimeCode) -> Option<usize> {
        let idx = self
            .value_clips
            .partition_point(|clip| clip.start_time <= time);
        idx.checked_sub(1)
    }

    /// Interpolate a value from the nearest sibling clips that do have
    /// authored samples for `path`.
    fn interpolate_from_sibling_clips(
        &self,
        active_index: usize,
        path: &ScenePath,
        time: TimeCode,
        interpolator: &dyn Interpolator,
        resolver: &dyn AssetResolver,
    ) -> Option<Value> {
        let previous = self.value_clips[..active_index]
            .iter()
            .rev()
            .find(|clip| clip.has_authored_samples(path, resolver));
        let next = self.value_clips[active_index + 1..]
            .iter()
            .find(|clip| clip.has_authored_samples(path, resolver));

        // Sample each neighbor at its own edge nearest the query time,
        // then interpolate across the gap in stage time.
        let lower = previous.and_then(|clip| {
            let last = *clip.list_time_samples(path, resolver).last()?;
            let value = clip.query_time_sample(path, last, interpolator, resolver)?;
            Some((last, value))
        });
        let upper = next.and_then(|clip| {
            let first = *clip.list_time_samples(path, resolver).first()?;
            let value = clip.query_time_sample(path, first, interpolator, resolver)?;
            Some((first, value))
        });

        match (lower, upper) {
            (Some((lower_time, lower_value)), Some((upper_time, upper_value))) => Some(
                interpolator.interpolate(&lower_value, &upper_value, lower_time, upper_time, time),
            ),
            (Some((_, value)), None) | (None, Some((_, value))) => Some(value),
            (None, None) => None,
        }
    }

    /// Query a property value at a stage time.
    ///
    /// Delegates to the active clip. When that clip has no samples at
    /// all for the property, sibling clips are consulted if
    /// `interpolateMissingClipValues` is set, then the manifest's
    /// default value. `None` means no clip-based opinion exists; callers
    /// fall back to weaker sources.
    pub fn query_time_sample(
        &self,
        path: &ScenePath,
        time: TimeCode,
        interpolator: &dyn Interpolator,
        resolver: &dyn AssetResolver,
    ) -> Option<Value> {
        let active_index = self.active_clip_index(time)?;
        let clip = &self.value_clips[active_index];

        if clip.has_authored_samples(path, resolver) {
            return clip.query_time_sample(path, time, interpolator, resolver);
        }

        if self.interpolate_missing_clip_values {
            if let Some(value) =
                self.interpolate_from_sibling_clips(active_index, path, time, interpolator, resolver)
            {
                return Some(value);
            }
        }

        self.manifest_clip
            .as_ref()
            .and_then(|manifest| manifest.default_value(path, resolver))
    }

    /// Get the stage times bracketing `time` for a property, from the
    /// active clip only. The manifest never participates: this
    /// enumerates authored samples, not resolved values.
    pub fn bracketing_time_samples(
        &self,
        path: &ScenePath,
        time: TimeCode,
        resolver: &dyn AssetResolver,
    ) -> Option<(TimeCode, TimeCode)> {
        self.active_clip(time)?
            .bracketing_time_samples(path, time, resolver)
    }

    /// List every stage time at which any clip in this set contributes a
    /// sample for a property.
    pub fn list_time_samples(&self, path: &ScenePath, resolver: &dyn AssetResolver) -> Vec<TimeCode> {
        let mut samples: Vec<TimeCode> = self
            .value_clips
            .iter()
            .flat_map(|clip| clip.list_time_samples(path, resolver))
            .collect();
        samples.sort_by(f64::total_cmp);
        samples.dedup();
        samples
    }
}

/// Compose and construct every clip set that applies to a prim.
///
/// Unconstructible sets are logged and skipped; composition of the
/// remaining sets is unaffected.
pub fn compose_clip_sets(
    prim_index: &PrimIndex,
    resolver: &dyn AssetResolver,
    config: &ClipsConfig,
) -> Vec<ClipSet> {
    compose_clip_set_definitions(prim_index, resolver, config)
        .into_iter()
        .filter_map(|(name, definition)| match ClipSet::new(name.as_str(), &definition) {
            Ok(set) => Some(set),
            Err(err) => {
                warn!(
                    "Invalid clips metadata for clip set '{}' on prim <{}>: {}",
                    name,
                    prim_index.path(),
                    err
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{HeldInterpolator, LinearInterpolator};
    use crate::scene::{Layer, LayerStack, MemoryResolver};
    use glam::DVec2;
    use std::sync::Arc;

    fn prim(s: &str) -> ScenePath {
        ScenePath::parse(s).unwrap()
    }

    fn test_definition() -> ClipSetDefinition {
        let stack = Arc::new(LayerStack::new(
            "stack:root",
            vec![Arc::new(Layer::new("root.usda"))],
        ));
        ClipSetDefinition {
            source_layer_stack: stack,
            source_prim_path: prim("/Model"),
            index_of_layer_where_asset_paths_found: 0,
            clip_asset_paths: Some(vec!["a.usd".to_string(), "b.usd".to_string()]),
            clip_prim_path: Some("/Model".to_string()),
            clip_manifest_asset_path: None,
            clip_active: Some(vec![DVec2::new(0.0, 0.0), DVec2::new(10.0, 1.0)]),
            clip_times: None,
            interpolate_missing_clip_values: None,
        }
    }

    #[test]
    fn test_construction_and_intervals() {
        let set = ClipSet::new("cache", &test_definition()).unwrap();
        assert_eq!(set.name(), "cache");
        assert_eq!(set.value_clips().len(), 2);

        let clips = set.value_clips();
        assert_eq!(clips[0].start_time, EARLIEST_TIME);
        assert_eq!(clips[0].end_time, 10.0);
        assert_eq!(clips[1].start_time, 10.0);
        assert_eq!(clips[1].end_time, LATEST_TIME);

        // No manifest is informational, not an error.
        assert_eq!(set.status(), Some("no manifest specified"));
    }

    #[test]
    fn test_active_clip_partitions_time_axis() {
        let set = ClipSet::new("cache", &test_definition()).unwrap();
        for (time, expected) in [
            (f64::NEG_INFINITY, "a.usd"),
            (-100.0, "a.usd"),
            (0.0, "a.usd"),
            (9.999, "a.usd"),
            (10.0, "b.usd"),
            (1e9, "b.usd"),
        ] {
            assert_eq!(set.active_clip(time).unwrap().asset_path, expected);
        }
    }

    #[test]
    fn test_missing_required_fields() {
        let mut def = test_definition();
        def.clip_active = None;
        match ClipSet::new("cache", &def) {
            Err(Error::MissingRequiredField { field, .. }) => assert_eq!(field, "active"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }

        let mut def = test_definition();
        def.clip_prim_path = None;
        assert!(matches!(
            ClipSet::new("cache", &def),
            Err(Error::MissingRequiredField {
                field: "primPath",
                ..
            })
        ));

        let mut def = test_definition();
        def.clip_asset_paths = None;
        assert!(matches!(
            ClipSet::new("cache", &def),
            Err(Error::MissingRequiredField {
                field: "assetPaths",
                ..
            })
        ));
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(matches!(
            ClipSet::new("", &test_definition()),
            Err(Error::InvalidClipSetName(_))
        ));
    }

    #[test]
    fn test_invalid_prim_path_rejected() {
        let mut def = test_definition();
        def.clip_prim_path = Some("relative/path".to_string());
        assert!(matches!(
            ClipSet::new("cache", &def),
            Err(Error::InvalidClipPrimPath { .. })
        ));

        let mut def = test_definition();
        def.clip_prim_path = Some("/Model.attr".to_string());
        assert!(matches!(
            ClipSet::new("cache", &def),
            Err(Error::InvalidClipPrimPath { .. })
        ));
    }

    #[test]
    fn test_empty_asset_path_entry_rejected() {
        let mut def = test_definition();
        def.clip_asset_paths = Some(vec!["a.usd".to_string(), String::new()]);
        assert!(matches!(
            ClipSet::new("cache", &def),
            Err(Error::EmptyClipAssetPath { index: 1, .. })
        ));
    }

    #[test]
    fn test_active_index_out_of_range_rejected() {
        let mut def = test_definition();
        def.clip_active = Some(vec![DVec2::new(0.0, 5.0)]);
        assert!(matches!(
            ClipSet::new("cache", &def),
            Err(Error::ActiveIndexOutOfRange { index: 5, .. })
        ));
    }

    #[test]
    fn test_conflicting_active_times_rejected() {
        let mut def = test_definition();
        def.clip_active = Some(vec![DVec2::new(0.0, 0.0), DVec2::new(0.0, 1.0)]);
        match ClipSet::new("cache", &def) {
            Err(Error::ConflictingActiveTimes {
                index_a, index_b, ..
            }) => {
                assert_eq!((index_a, index_b), (0, 1));
            }
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }

        // Exact duplicates are fine.
        let mut def = test_definition();
        def.clip_active = Some(vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(0.0, 0.0),
            DVec2::new(10.0, 1.0),
        ]);
        assert!(ClipSet::new("cache", &def).is_ok());
    }

    #[test]
    fn test_too_many_time_mappings_rejected() {
        let mut def = test_definition();
        def.clip_times = Some(vec![
            DVec2::new(5.0, 0.0),
            DVec2::new(5.0, 1.0),
            DVec2::new(5.0, 2.0),
        ]);
        assert!(matches!(
            ClipSet::new("cache", &def),
            Err(Error::TooManyTimeMappings { count: 3, .. })
        ));

        // Exactly two entries at one time is a legal jump discontinuity.
        let mut def = test_definition();
        def.clip_times = Some(vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(5.0, 5.0),
            DVec2::new(5.0, 0.0),
        ]);
        assert!(ClipSet::new("cache", &def).is_ok());
    }

    #[test]
    fn test_query_with_time_mapping() {
        let mut clip_layer = Layer::new("a.usd");
        let attr = prim("/Model.size");
        clip_layer.set_time_sample(&attr, 0.0, Value::Double(0.0));
        clip_layer.set_time_sample(&attr, 20.0, Value::Double(20.0));
        let mut resolver = MemoryResolver::new();
        resolver.insert("a.usd", Arc::new(clip_layer));

        let mut def = test_definition();
        def.clip_active = Some(vec![DVec2::new(0.0, 0.0)]);
        def.clip_times = Some(vec![DVec2::new(0.0, 0.0), DVec2::new(10.0, 20.0)]);
        let set = ClipSet::new("cache", &def).unwrap();

        // Stage time 5 maps to internal time 10 by linear interpolation
        // of the times table.
        let v = set
            .query_time_sample(&attr, 5.0, &LinearInterpolator, &resolver)
            .unwrap();
        assert_eq!(v, Value::Double(10.0));
    }

    #[test]
    fn test_manifest_default_fallback() {
        let clip_layer = Layer::new("a.usd");
        let mut manifest_layer = Layer::new("manifest.usd");
        let attr = prim("/Model.foo");
        manifest_layer.set_default_value(&attr, Value::Double(1.0));

        let mut resolver = MemoryResolver::new();
        resolver.insert("a.usd", Arc::new(clip_layer));
        resolver.insert("manifest.usd", Arc::new(manifest_layer));

        let mut def = test_definition();
        def.clip_asset_paths = Some(vec!["a.usd".to_string()]);
        def.clip_active = Some(vec![DVec2::new(0.0, 0.0)]);
        def.clip_manifest_asset_path = Some("manifest.usd".to_string());
        let set = ClipSet::new("cache", &def).unwrap();
        assert!(set.status().is_none());
        assert!(set.manifest_clip().is_some());

        let v = set
            .query_time_sample(&attr, 3.0, &HeldInterpolator, &resolver)
            .unwrap();
        assert_eq!(v, Value::Double(1.0));

        // Bracketing queries never consult the manifest.
        assert!(set.bracketing_time_samples(&attr, 3.0, &resolver).is_none());
    }

    #[test]
    fn test_interpolate_missing_clip_values() {
        // Clip b has no samples for the attribute; a and c do.
        let attr = prim("/Model.size");
        let mut layer_a = Layer::new("a.usd");
        layer_a.set_time_sample(&attr, 0.0, Value::Double(0.0));
        let layer_b = Layer::new("b.usd");
        let mut layer_c = Layer::new("c.usd");
        layer_c.set_time_sample(&attr, 20.0, Value::Double(20.0));

        let mut resolver = MemoryResolver::new();
        resolver.insert("a.usd", Arc::new(layer_a));
        resolver.insert("b.usd", Arc::new(layer_b));
        resolver.insert("c.usd", Arc::new(layer_c));

        let mut def = test_definition();
        def.clip_asset_paths = Some(vec![
            "a.usd".to_string(),
            "b.usd".to_string(),
            "c.usd".to_string(),
        ]);
        def.clip_active = Some(vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(10.0, 1.0),
            DVec2::new(20.0, 2.0),
        ]);

        // Without the flag, the gap clip yields nothing.
        let set = ClipSet::new("cache", &def).unwrap();
        assert!(set
            .query_time_sample(&attr, 15.0, &LinearInterpolator, &resolver)
            .is_none());

        // With the flag, the neighbors' edge samples interpolate across
        // the gap: 0.0 at t=0 and 20.0 at t=20 give 15.0 at t=15.
        def.interpolate_missing_clip_values = Some(true);
        let set = ClipSet::new("cache", &def).unwrap();
        let v = set
            .query_time_sample(&attr, 15.0, &LinearInterpolator, &resolver)
            .unwrap();
        assert_eq!(v, Value::Double(15.0));

        // Held interpolation holds the previous clip's edge value.
        let v = set
            .query_time_sample(&attr, 15.0, &HeldInterpolator, &resolver)
            .unwrap();
        assert_eq!(v, Value::Double(0.0));
    }

    #[test]
    fn test_list_time_samples_across_clips() {
        let attr = prim("/Model.size");
        let mut layer_a = Layer::new("a.usd");
        layer_a.set_time_sample(&attr, 0.0, Value::Double(0.0));
        layer_a.set_time_sample(&attr, 5.0, Value::Double(5.0));
        let mut layer_b = Layer::new("b.usd");
        layer_b.set_time_sample(&attr, 12.0, Value::Double(12.0));

        let mut resolver = MemoryResolver::new();
        resolver.insert("a.usd", Arc::new(layer_a));
        resolver.insert("b.usd", Arc::new(layer_b));

        let set = ClipSet::new("cache", &test_definition()).unwrap();
        assert_eq!(
            set.list_time_samples(&attr, &resolver),
            vec![0.0, 5.0, 12.0]
        );
    }

    #[test]
    fn test_empty_active_means_no_clips() {
        let mut def = test_definition();
        def.clip_active = Some(vec![]);
        let set = ClipSet::new("cache", &def).unwrap();
        assert!(set.value_clips().is_empty());
        assert!(set.active_clip(0.0).is_none());
    }
}
