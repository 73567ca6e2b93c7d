//! Field names and dictionary keys for clip metadata.
//!
//! These strings are the wire format: they must match the authored scene
//! description bit-for-bit to stay compatible with existing files.

/// Per-prim dictionary field keyed by clip-set name.
pub const CLIPS: &str = "clips";

/// Per-prim list-op field naming which clip sets apply, and in what order.
pub const CLIP_SETS: &str = "clipSets";

/// The clip set used by the legacy, non-named API.
pub const DEFAULT_CLIP_SET: &str = "default";

/// Keys recognized inside each named clip-set dictionary.
pub mod info {
    pub const ASSET_PATHS: &str = "assetPaths";
    pub const PRIM_PATH: &str = "primPath";
    pub const MANIFEST_ASSET_PATH: &str = "manifestAssetPath";
    pub const ACTIVE: &str = "active";
    pub const TIMES: &str = "times";
    pub const TEMPLATE_ASSET_PATH: &str = "templateAssetPath";
    pub const TEMPLATE_STRIDE: &str = "templateStride";
    pub const TEMPLATE_START_TIME: &str = "templateStartTime";
    pub const TEMPLATE_END_TIME: &str = "templateEndTime";
    pub const TEMPLATE_ACTIVE_OFFSET: &str = "templateActiveOffset";
    pub const INTERPOLATE_MISSING: &str = "interpolateMissingClipValues";
}

/// Flat per-prim fields from the pre-multi-clip-set format.
pub mod legacy {
    pub const CLIP_ASSET_PATHS: &str = "clipAssetPaths";
    pub const CLIP_PRIM_PATH: &str = "clipPrimPath";
    pub const CLIP_MANIFEST_ASSET_PATH: &str = "clipManifestAssetPath";
    pub const CLIP_ACTIVE: &str = "clipActive";
    pub const CLIP_TIMES: &str = "clipTimes";
    pub const CLIP_TEMPLATE_ASSET_PATH: &str = "clipTemplateAssetPath";
    pub const CLIP_TEMPLATE_STRIDE: &str = "clipTemplateStride";
    pub const CLIP_TEMPLATE_START_TIME: &str = "clipTemplateStartTime";
    pub const CLIP_TEMPLATE_END_TIME: &str = "clipTemplateEndTime";
}

/// All recognized per-prim clip fields.
pub fn clip_related_fields() -> &'static [&'static str] {
    &[
        CLIPS,
        CLIP_SETS,
        legacy::CLIP_ASSET_PATHS,
        legacy::CLIP_PRIM_PATH,
        legacy::CLIP_MANIFEST_ASSET_PATH,
        legacy::CLIP_ACTIVE,
        legacy::CLIP_TIMES,
        legacy::CLIP_TEMPLATE_ASSET_PATH,
        legacy::CLIP_TEMPLATE_STRIDE,
        legacy::CLIP_TEMPLATE_START_TIME,
        legacy::CLIP_TEMPLATE_END_TIME,
    ]
}

/// Check whether a field name is one of the recognized clip fields.
pub fn is_clip_related_field(name: &str) -> bool {
    name.starts_with("clip") && clip_related_fields().contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_clip_related_field() {
        assert!(is_clip_related_field("clipSets"));
        assert!(is_clip_related_field("clipAssetPaths"));
        // 'clips' does not start with "clip" + token boundary in the
        // legacy check, but it is still in the recognized list
        assert!(is_clip_related_field("clips"));
        assert!(!is_clip_related_field("clipSomethingElse"));
        assert!(!is_clip_related_field("points"));
    }
}
