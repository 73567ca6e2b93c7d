//! Clip metadata accessor.
//!
//! Reads and writes clip metadata on a (layer, prim path) site. Metadata
//! lives either nested inside the `clips` dictionary keyed by clip-set
//! name, or - for the `"default"` set when legacy mode is enabled - in
//! the flat pre-multi-clip-set fields.

use tracing::warn;

use crate::compose::keys::{self, info, legacy, CLIPS, CLIP_SETS, DEFAULT_CLIP_SET};
use crate::scene::{Dictionary, Layer, ScenePath, StringListOp, Value};
use crate::util::{Error, Result};

/// Configuration for clip metadata handling.
///
/// The legacy toggles are threaded explicitly rather than read from
/// ambient global state; callers decide once and pass the struct down.
#[derive(Clone, Copy, Debug)]
pub struct ClipsConfig {
    /// Respect legacy flat-field clip metadata when composing. When a prim
    /// carries legacy metadata, it wins outright over named clip sets.
    pub read_legacy_clips: bool,
    /// Route writes of the `"default"` clip set to the legacy flat fields.
    pub author_legacy_clips: bool,
}

impl Default for ClipsConfig {
    fn default() -> Self {
        Self {
            read_legacy_clips: true,
            author_legacy_clips: false,
        }
    }
}

/// Map a clip-info dictionary key to its legacy flat field, if one exists.
/// `templateActiveOffset` and `interpolateMissingClipValues` were never
/// backported to the legacy format.
fn legacy_field_for_key(key: &str) -> Option<&'static str> {
    match key {
        info::ASSET_PATHS => Some(legacy::CLIP_ASSET_PATHS),
        info::PRIM_PATH => Some(legacy::CLIP_PRIM_PATH),
        info::MANIFEST_ASSET_PATH => Some(legacy::CLIP_MANIFEST_ASSET_PATH),
        info::ACTIVE => Some(legacy::CLIP_ACTIVE),
        info::TIMES => Some(legacy::CLIP_TIMES),
        info::TEMPLATE_ASSET_PATH => Some(legacy::CLIP_TEMPLATE_ASSET_PATH),
        info::TEMPLATE_STRIDE => Some(legacy::CLIP_TEMPLATE_STRIDE),
        info::TEMPLATE_START_TIME => Some(legacy::CLIP_TEMPLATE_START_TIME),
        info::TEMPLATE_END_TIME => Some(legacy::CLIP_TEMPLATE_END_TIME),
        _ => None,
    }
}

/// Accessor for clip metadata at one (layer, prim path) site.
pub struct ClipsAccessor<'a> {
    layer: &'a mut Layer,
    path: ScenePath,
    config: ClipsConfig,
}

impl<'a> ClipsAccessor<'a> {
    /// Create an accessor for a prim spec in a layer.
    pub fn new(layer: &'a mut Layer, path: &ScenePath, config: ClipsConfig) -> Self {
        Self {
            layer,
            path: path.clone(),
            config,
        }
    }

    fn check_set_name(&self, clip_set: &str) -> Result<()> {
        if clip_set.is_empty() {
            return Err(Error::InvalidClipSetName(clip_set.to_string()));
        }
        Ok(())
    }

    /// Read one value from a named clip set.
    ///
    /// In legacy read mode, the `"default"` set consults the flat fields
    /// first and falls back to the `clips` dictionary entry.
    pub fn clip_value(&self, clip_set: &str, key: &str) -> Result<Option<Value>> {
        self.check_set_name(clip_set)?;

        if self.config.read_legacy_clips && clip_set == DEFAULT_CLIP_SET {
            if let Some(field) = legacy_field_for_key(key) {
                if let Some(value) = self.layer.field(&self.path, field) {
                    return Ok(Some(value.clone()));
                }
            }
        }

        let value = self
            .layer
            .field(&self.path, CLIPS)
            .and_then(Value::as_dictionary)
            .and_then(|clips| clips.get(clip_set))
            .and_then(Value::as_dictionary)
            .and_then(|set| set.get(key))
            .cloned();
        Ok(value)
    }

    /// Write one value into a named clip set.
    ///
    /// With `author_legacy_clips` set, `"default"` set keys that have a
    /// legacy counterpart go to the flat fields; keys without one fall
    /// through to the dictionary with a warning.
    pub fn set_clip_value(&mut self, clip_set: &str, key: &str, value: Value) -> Result<()> {
        self.check_set_name(clip_set)?;

        if self.config.author_legacy_clips && clip_set == DEFAULT_CLIP_SET {
            if let Some(field) = legacy_field_for_key(key) {
                self.layer.set_field(&self.path, field, value);
                return Ok(());
            }
            warn!(
                "Clip info key '{}' has no legacy field; authoring it in the \
                 'clips' dictionary for prim <{}>",
                key, self.path
            );
        }

        let mut clips = self
            .layer
            .field(&self.path, CLIPS)
            .and_then(Value::as_dictionary)
            .cloned()
            .unwrap_or_default();

        let mut set = clips
            .get(clip_set)
            .and_then(Value::as_dictionary)
            .cloned()
            .unwrap_or_default();
        set.insert(key, value);
        clips.insert(clip_set, set);

        self.layer.set_field(&self.path, CLIPS, clips);
        Ok(())
    }

    /// List the clip-set names present in the `clips` dictionary.
    pub fn clip_set_names(&self) -> Vec<String> {
        self.layer
            .field(&self.path, CLIPS)
            .and_then(Value::as_dictionary)
            .map(|clips| clips.iter().map(|(name, _)| name.to_string()).collect())
            .unwrap_or_default()
    }

    /// Author the `clipSets` list op.
    pub fn set_clip_sets(&mut self, op: StringListOp) {
        self.layer.set_field(&self.path, CLIP_SETS, op);
    }

    /// Read the `clipSets` list op, if authored.
    pub fn clip_sets(&self) -> Option<StringListOp> {
        self.layer
            .field(&self.path, CLIP_SETS)
            .and_then(Value::as_string_list_op)
            .cloned()
    }

    /// Remove an entire named clip set from the `clips` dictionary.
    pub fn remove_clip_set(&mut self, clip_set: &str) -> Result<()> {
        self.check_set_name(clip_set)?;
        if let Some(clips) = self.layer.field(&self.path, CLIPS).and_then(Value::as_dictionary) {
            let mut clips = clips.clone();
            clips.remove(clip_set);
            self.layer.set_field(&self.path, CLIPS, clips);
        }
        Ok(())
    }

    /// Check whether any recognized clip field is authored at this site.
    pub fn has_clip_metadata(&self) -> bool {
        keys::clip_related_fields()
            .iter()
            .any(|field| self.layer.has_field(&self.path, field))
    }

    /// Build a dictionary view of a named clip set, merging legacy flat
    /// fields into the `"default"` entry when legacy reads are enabled.
    pub fn clip_set_dictionary(&self, clip_set: &str) -> Result<Dictionary> {
        self.check_set_name(clip_set)?;

        let mut result = self
            .layer
            .field(&self.path, CLIPS)
            .and_then(Value::as_dictionary)
            .and_then(|clips| clips.get(clip_set))
            .and_then(Value::as_dictionary)
            .cloned()
            .unwrap_or_default();

        if self.config.read_legacy_clips && clip_set == DEFAULT_CLIP_SET {
            for (key, field) in [
                (info::ASSET_PATHS, legacy::CLIP_ASSET_PATHS),
                (info::PRIM_PATH, legacy::CLIP_PRIM_PATH),
                (info::MANIFEST_ASSET_PATH, legacy::CLIP_MANIFEST_ASSET_PATH),
                (info::ACTIVE, legacy::CLIP_ACTIVE),
                (info::TIMES, legacy::CLIP_TIMES),
                (info::TEMPLATE_ASSET_PATH, legacy::CLIP_TEMPLATE_ASSET_PATH),
                (info::TEMPLATE_STRIDE, legacy::CLIP_TEMPLATE_STRIDE),
                (info::TEMPLATE_START_TIME, legacy::CLIP_TEMPLATE_START_TIME),
                (info::TEMPLATE_END_TIME, legacy::CLIP_TEMPLATE_END_TIME),
            ] {
                if let Some(value) = self.layer.field(&self.path, field) {
                    result.insert(key, value.clone());
                }
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;

    fn prim(s: &str) -> ScenePath {
        ScenePath::parse(s).unwrap()
    }

    #[test]
    fn test_named_roundtrip() {
        let mut layer = Layer::new("root.usda");
        let path = prim("/Model");
        let mut accessor = ClipsAccessor::new(&mut layer, &path, ClipsConfig::default());

        accessor
            .set_clip_value("cache", info::PRIM_PATH, Value::String("/Model".into()))
            .unwrap();
        accessor
            .set_clip_value(
                "cache",
                info::ACTIVE,
                Value::Vec2dArray(vec![DVec2::new(0.0, 0.0)]),
            )
            .unwrap();

        let v = accessor.clip_value("cache", info::PRIM_PATH).unwrap().unwrap();
        assert_eq!(v.as_str(), Some("/Model"));
        assert_eq!(accessor.clip_set_names(), vec!["cache".to_string()]);
    }

    #[test]
    fn test_empty_set_name_is_error() {
        let mut layer = Layer::new("root.usda");
        let path = prim("/Model");
        let accessor = ClipsAccessor::new(&mut layer, &path, ClipsConfig::default());
        assert!(matches!(
            accessor.clip_value("", info::PRIM_PATH),
            Err(Error::InvalidClipSetName(_))
        ));
    }

    #[test]
    fn test_legacy_write_routes_to_flat_fields() {
        let mut layer = Layer::new("root.usda");
        let path = prim("/Model");
        let config = ClipsConfig {
            author_legacy_clips: true,
            ..Default::default()
        };
        let mut accessor = ClipsAccessor::new(&mut layer, &path, config);
        accessor
            .set_clip_value(DEFAULT_CLIP_SET, info::PRIM_PATH, Value::String("/M".into()))
            .unwrap();

        // Value landed in the flat field, not the dictionary
        assert!(layer.has_field(&path, legacy::CLIP_PRIM_PATH));
        assert!(!layer.has_field(&path, CLIPS));
    }

    #[test]
    fn test_legacy_read_prefers_flat_fields() {
        let mut layer = Layer::new("root.usda");
        let path = prim("/Model");
        layer.set_field(&path, legacy::CLIP_PRIM_PATH, Value::String("/Flat".into()));

        let mut clips = Dictionary::new();
        let mut set = Dictionary::new();
        set.insert(info::PRIM_PATH, Value::String("/Nested".into()));
        clips.insert(DEFAULT_CLIP_SET, set);
        layer.set_field(&path, CLIPS, clips);

        let accessor = ClipsAccessor::new(&mut layer, &path, ClipsConfig::default());
        let v = accessor
            .clip_value(DEFAULT_CLIP_SET, info::PRIM_PATH)
            .unwrap()
            .unwrap();
        assert_eq!(v.as_str(), Some("/Flat"));

        // With legacy reads disabled the dictionary entry wins
        let config = ClipsConfig {
            read_legacy_clips: false,
            ..Default::default()
        };
        let accessor = ClipsAccessor::new(&mut layer, &path, config);
        let v = accessor
            .clip_value(DEFAULT_CLIP_SET, info::PRIM_PATH)
            .unwrap()
            .unwrap();
        assert_eq!(v.as_str(), Some("/Nested"));
    }

    #[test]
    fn test_non_default_set_ignores_legacy_mode() {
        let mut layer = Layer::new("root.usda");
        let path = prim("/Model");
        let config = ClipsConfig {
            author_legacy_clips: true,
            ..Default::default()
        };
        let mut accessor = ClipsAccessor::new(&mut layer, &path, config);
        accessor
            .set_clip_value("cache", info::PRIM_PATH, Value::String("/M".into()))
            .unwrap();
        assert!(layer.has_field(&path, CLIPS));
        assert!(!layer.has_field(&path, legacy::CLIP_PRIM_PATH));
    }
}
