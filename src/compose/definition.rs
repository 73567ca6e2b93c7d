//! Clip set definition composition.
//!
//! Walks a prim's composition nodes from strongest to weakest, merging
//! each named clip set's metadata dictionaries and tracking the anchor -
//! the single strongest site carrying asset-path opinions - then unpacks
//! the merged result into one [`ClipSetDefinition`] per clip set, in a
//! deterministic composition-strength order.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use glam::DVec2;
use tracing::{debug, warn};

use crate::clip::{derive_clip_info, DerivedClipInfo};
use crate::compose::keys::{info, legacy, CLIPS, CLIP_SETS, DEFAULT_CLIP_SET};
use crate::compose::{ClipsConfig, CompositionNode, PrimIndex};
use crate::scene::{
    AssetResolver, Dictionary, LayerOffset, LayerStackHandle, ScenePath, StringListOp, Value,
};

/// Composed, resolved view of one clip set for one prim.
///
/// Created fresh per prim-index query and owned by the caller; equality
/// and hashing are by content so the owning layer can detect when a
/// rebuild is needed after composition changes.
#[derive(Clone, Debug)]
pub struct ClipSetDefinition {
    /// Layer stack of the anchoring node.
    pub source_layer_stack: LayerStackHandle,
    /// Prim path at the anchoring node.
    pub source_prim_path: ScenePath,
    /// Index of the layer within the anchor stack where asset paths were
    /// found; relative clip paths resolve against this layer.
    pub index_of_layer_where_asset_paths_found: usize,

    pub clip_asset_paths: Option<Vec<String>>,
    pub clip_prim_path: Option<String>,
    pub clip_manifest_asset_path: Option<String>,
    pub clip_active: Option<Vec<DVec2>>,
    pub clip_times: Option<Vec<DVec2>>,
    pub interpolate_missing_clip_values: Option<bool>,
}

impl ClipSetDefinition {
    fn from_anchor(anchor: &AnchorInfo) -> Self {
        Self {
            source_layer_stack: anchor.layer_stack.clone(),
            source_prim_path: anchor.prim_path.clone(),
            index_of_layer_where_asset_paths_found: anchor.layer_index,
            clip_asset_paths: None,
            clip_prim_path: None,
            clip_manifest_asset_path: None,
            clip_active: None,
            clip_times: None,
            interpolate_missing_clip_values: None,
        }
    }
}

impl PartialEq for ClipSetDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.source_layer_stack.identifier() == other.source_layer_stack.identifier()
            && self.source_prim_path == other.source_prim_path
            && self.index_of_layer_where_asset_paths_found
                == other.index_of_layer_where_asset_paths_found
            && self.clip_asset_paths == other.clip_asset_paths
            && self.clip_prim_path == other.clip_prim_path
            && self.clip_manifest_asset_path == other.clip_manifest_asset_path
            && self.clip_active == other.clip_active
            && self.clip_times == other.clip_times
            && self.interpolate_missing_clip_values == other.interpolate_missing_clip_values
    }
}

impl Eq for ClipSetDefinition {}

impl Hash for ClipSetDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source_layer_stack.identifier().hash(state);
        self.source_prim_path.hash(state);
        self.index_of_layer_where_asset_paths_found.hash(state);
        self.clip_asset_paths.hash(state);
        self.clip_prim_path.hash(state);
        self.clip_manifest_asset_path.hash(state);
        for array in [&self.clip_active, &self.clip_times] {
            if let Some(array) = array {
                for v in array {
                    v.x.to_bits().hash(state);
                    v.y.to_bits().hash(state);
                }
            } else {
                u8::MAX.hash(state);
            }
        }
        self.interpolate_missing_clip_values.hash(state);
    }
}

/// Provenance of the strongest asset-path-bearing site for a clip set.
/// Tracked separately from the merged dictionary: weaker layers keep
/// contributing sibling fields without moving the anchor.
#[derive(Clone, Debug)]
struct AnchorInfo {
    layer_stack: LayerStackHandle,
    prim_path: ScenePath,
    layer_index: usize,
    /// Position in the composed `clipSets` list; filled in after list-op
    /// application.
    layer_stack_order: usize,
    /// Offset from the anchoring layer to the composed root.
    offset: LayerOffset,
}

#[derive(Default, Debug)]
struct ComposedClipSet {
    anchor: Option<AnchorInfo>,
    info: Dictionary,
}

/// Shift the external (stage-time) component of `active`/`times` entries.
pub(crate) fn apply_layer_offset_to_external_times(offset: LayerOffset, array: &mut [DVec2]) {
    if offset.is_identity() {
        return;
    }
    for entry in array {
        entry.x = offset.apply(entry.x);
    }
}

fn apply_layer_offset_to_clip_info(
    node: &CompositionNode,
    layer_index: usize,
    key: &str,
    clip_info: &mut Dictionary,
) {
    if let Some(array) = clip_info.get(key).and_then(Value::as_vec2d_array) {
        let mut array = array.to_vec();
        apply_layer_offset_to_external_times(node.layer_offset_to_root(layer_index), &mut array);
        clip_info.insert(key, array);
    }
}

fn record_anchor_info(
    node: &CompositionNode,
    layer_index: usize,
    clip_info: &Dictionary,
    set: &mut ComposedClipSet,
) {
    // A clip set is anchored to the strongest site containing opinions
    // about asset paths.
    let has_asset_path_opinion = clip_info
        .get(info::ASSET_PATHS)
        .and_then(Value::as_asset_path_array)
        .is_some()
        || clip_info
            .get(info::TEMPLATE_ASSET_PATH)
            .and_then(Value::as_str)
            .is_some();
    if has_asset_path_opinion {
        set.anchor = Some(AnchorInfo {
            layer_stack: node.layer_stack.clone(),
            prim_path: node.path.clone(),
            layer_index,
            layer_stack_order: 0,
            offset: node.layer_offset_to_root(layer_index),
        });
    }
}

/// Compose the clip sets authored within a single node's layer stack.
///
/// Layers are scanned weakest to strongest so stronger opinions override
/// as they are merged in; the `clipSets` list op is applied in the same
/// order to compute which sets survive and their declared order.
fn resolve_clip_sets_in_node(
    node: &CompositionNode,
    root_path: &ScenePath,
) -> BTreeMap<String, ComposedClipSet> {
    let mut result: BTreeMap<String, ComposedClipSet> = BTreeMap::new();
    let prim_path = &node.path;
    let layers = node.layer_stack.layers();

    // Early out when no layer in the stack has a 'clips' field at all.
    let Some(weakest_with_clips) = layers
        .iter()
        .rposition(|layer| layer.has_field(prim_path, CLIPS))
    else {
        return result;
    };

    let mut added_clip_sets: Vec<String> = Vec::new();
    for i in (0..=weakest_with_clips).rev() {
        let layer = &layers[i];

        if let Some(clips) = layer.field(prim_path, CLIPS).and_then(Value::as_dictionary) {
            let mut sets_in_layer: Vec<String> = Vec::with_capacity(clips.len());

            for (name, value) in clips.iter() {
                if name.is_empty() {
                    warn!(
                        "Invalid unnamed clip set for prim <{}> in 'clips' \
                         dictionary on spec @{}@<{}>",
                        root_path,
                        layer.identifier(),
                        prim_path
                    );
                    continue;
                }
                let Some(info_in_layer) = value.as_dictionary() else {
                    warn!(
                        "Expected dictionary for entry '{}' for prim <{}> in \
                         'clips' dictionary on spec @{}@<{}>",
                        name,
                        root_path,
                        layer.identifier(),
                        prim_path
                    );
                    continue;
                };

                let set = result.entry(name.to_string()).or_default();
                let mut info_for_layer = info_in_layer.clone();

                record_anchor_info(node, i, &info_for_layer, set);

                // Offsets are applied at contribution time so that nested
                // sublayer offsets compose correctly across nodes.
                apply_layer_offset_to_clip_info(node, i, info::ACTIVE, &mut info_for_layer);
                apply_layer_offset_to_clip_info(node, i, info::TIMES, &mut info_for_layer);

                set.info = Dictionary::over_recursive(&info_for_layer, &set.info);
                sets_in_layer.push(name.to_string());
            }

            // Sets named in the clips dictionary are implicitly added so
            // users don't have to author the clipSets list op themselves;
            // sorted lexicographically for a stable default order.
            sets_in_layer.sort();
            StringListOp::with_added(sets_in_layer).apply_operations(&mut added_clip_sets);
        }

        if let Some(op) = layer
            .field(prim_path, CLIP_SETS)
            .and_then(Value::as_string_list_op)
        {
            op.apply_operations(&mut added_clip_sets);
        }
    }

    // Drop sets removed by the clipSets list op; record the declared
    // order for the anchored survivors.
    result.retain(|name, set| {
        match added_clip_sets.iter().position(|n| n == name) {
            Some(order) => {
                if let Some(anchor) = set.anchor.as_mut() {
                    anchor.layer_stack_order = order;
                }
                true
            }
            None => false,
        }
    });

    result
}

fn unpack_definition(
    anchor: &AnchorInfo,
    clip_info: &Dictionary,
    prim_index: &PrimIndex,
    resolver: &dyn AssetResolver,
) -> ClipSetDefinition {
    let mut def = ClipSetDefinition::from_anchor(anchor);

    def.clip_prim_path = clip_info
        .get(info::PRIM_PATH)
        .and_then(Value::as_str)
        .map(String::from);
    def.clip_manifest_asset_path = clip_info
        .get(info::MANIFEST_ASSET_PATH)
        .and_then(Value::as_asset_path)
        .map(String::from);
    def.interpolate_missing_clip_values = clip_info
        .get(info::INTERPOLATE_MISSING)
        .and_then(Value::as_bool);

    if let Some(paths) = clip_info
        .get(info::ASSET_PATHS)
        .and_then(Value::as_asset_path_array)
    {
        // Literal asset paths take precedence over template fields.
        def.clip_asset_paths = Some(paths.to_vec());
        def.clip_active = clip_info
            .get(info::ACTIVE)
            .and_then(Value::as_vec2d_array)
            .map(<[DVec2]>::to_vec);
        def.clip_times = clip_info
            .get(info::TIMES)
            .and_then(Value::as_vec2d_array)
            .map(<[DVec2]>::to_vec);
    } else if let Some(template) = clip_info
        .get(info::TEMPLATE_ASSET_PATH)
        .and_then(Value::as_str)
    {
        let stride = clip_info.get(info::TEMPLATE_STRIDE).and_then(Value::as_double);
        let start = clip_info
            .get(info::TEMPLATE_START_TIME)
            .and_then(Value::as_double);
        let end = clip_info
            .get(info::TEMPLATE_END_TIME)
            .and_then(Value::as_double);
        let active_offset = clip_info
            .get(info::TEMPLATE_ACTIVE_OFFSET)
            .and_then(Value::as_double);

        if let (Some(stride), Some(start), Some(end)) = (stride, start, end) {
            let derived = anchor
                .layer_stack
                .layer(anchor.layer_index)
                .and_then(|anchor_layer| {
                    derive_clip_info(
                        template,
                        stride,
                        active_offset,
                        start,
                        end,
                        anchor_layer,
                        resolver,
                        prim_index.path(),
                    )
                });

            if let Some(DerivedClipInfo {
                asset_paths,
                mut times,
                mut active,
            }) = derived
            {
                // Offsets affect when a clip is active, never which clips
                // exist; they are applied to the derived tables only,
                // using the anchor layer's offset. Template range fields
                // authored on other layers with different offsets keep
                // this simplification.
                apply_layer_offset_to_external_times(anchor.offset, &mut times);
                apply_layer_offset_to_external_times(anchor.offset, &mut active);
                def.clip_asset_paths = Some(asset_paths);
                def.clip_times = Some(times);
                def.clip_active = Some(active);
            }
        }
    }

    def
}

/// Resolve the legacy flat-field clip metadata, if any is authored.
///
/// The anchor is the strongest site carrying `clipAssetPaths` or
/// `clipTemplateAssetPath`; the remaining fields compose strongest-wins
/// across all nodes.
fn resolve_legacy_clip_info(
    prim_index: &PrimIndex,
    resolver: &dyn AssetResolver,
) -> Option<ClipSetDefinition> {
    let mut anchor: Option<AnchorInfo> = None;
    let mut template_asset_path: Option<String> = None;
    let mut literal_asset_paths: Option<Vec<String>> = None;

    'anchor_search: for node in prim_index.nodes() {
        let layers = node.layer_stack.layers();
        for (i, layer) in layers.iter().enumerate() {
            if let Some(paths) = layer
                .field(&node.path, legacy::CLIP_ASSET_PATHS)
                .and_then(Value::as_asset_path_array)
            {
                debug!(
                    "clipAssetPaths for prim <{}> found at spec @{}@<{}>",
                    prim_index.path(),
                    layer.identifier(),
                    node.path
                );
                literal_asset_paths = Some(paths.to_vec());
                anchor = Some(AnchorInfo {
                    layer_stack: node.layer_stack.clone(),
                    prim_path: node.path.clone(),
                    layer_index: i,
                    layer_stack_order: 0,
                    offset: node.layer_offset_to_root(i),
                });
                if layer.has_field(&node.path, legacy::CLIP_TEMPLATE_ASSET_PATH) {
                    warn!(
                        "Both template and non-template clip metadata are \
                         authored for prim <{}> at spec @{}@<{}>",
                        prim_index.path(),
                        layer.identifier(),
                        node.path
                    );
                }
                break 'anchor_search;
            }

            if let Some(template) = layer
                .field(&node.path, legacy::CLIP_TEMPLATE_ASSET_PATH)
                .and_then(Value::as_str)
            {
                debug!(
                    "clipTemplateAssetPath for prim <{}> found at spec @{}@<{}>",
                    prim_index.path(),
                    layer.identifier(),
                    node.path
                );
                template_asset_path = Some(template.to_string());
                anchor = Some(AnchorInfo {
                    layer_stack: node.layer_stack.clone(),
                    prim_path: node.path.clone(),
                    layer_index: i,
                    layer_stack_order: 0,
                    offset: node.layer_offset_to_root(i),
                });
                break 'anchor_search;
            }
        }
    }

    // Asset paths are a necessary component for clips; nothing to do
    // without them.
    let anchor = anchor?;
    let mut def = ClipSetDefinition::from_anchor(&anchor);
    def.clip_asset_paths = literal_asset_paths;

    let mut template_stride: Option<f64> = None;
    let mut template_start: Option<f64> = None;
    let mut template_end: Option<f64> = None;

    for node in prim_index.nodes() {
        let layers = node.layer_stack.layers();
        for (i, layer) in layers.iter().enumerate() {
            if def.clip_manifest_asset_path.is_none() {
                if let Some(manifest) = layer
                    .field(&node.path, legacy::CLIP_MANIFEST_ASSET_PATH)
                    .and_then(Value::as_asset_path)
                {
                    def.clip_manifest_asset_path = Some(manifest.to_string());
                }
            }

            if def.clip_prim_path.is_none() {
                if let Some(prim_path) = layer
                    .field(&node.path, legacy::CLIP_PRIM_PATH)
                    .and_then(Value::as_str)
                {
                    def.clip_prim_path = Some(prim_path.to_string());
                }
            }

            if template_asset_path.is_none() {
                if def.clip_active.is_none() {
                    if let Some(active) = layer
                        .field(&node.path, legacy::CLIP_ACTIVE)
                        .and_then(Value::as_vec2d_array)
                    {
                        let mut active = active.to_vec();
                        apply_layer_offset_to_external_times(
                            node.layer_offset_to_root(i),
                            &mut active,
                        );
                        def.clip_active = Some(active);
                    }
                }

                if def.clip_times.is_none() {
                    if let Some(times) = layer
                        .field(&node.path, legacy::CLIP_TIMES)
                        .and_then(Value::as_vec2d_array)
                    {
                        let mut times = times.to_vec();
                        apply_layer_offset_to_external_times(
                            node.layer_offset_to_root(i),
                            &mut times,
                        );
                        def.clip_times = Some(times);
                    }
                }
            } else {
                if template_stride.is_none() {
                    template_stride = layer
                        .field(&node.path, legacy::CLIP_TEMPLATE_STRIDE)
                        .and_then(Value::as_double);
                }
                if template_start.is_none() {
                    template_start = layer
                        .field(&node.path, legacy::CLIP_TEMPLATE_START_TIME)
                        .and_then(Value::as_double);
                }
                if template_end.is_none() {
                    template_end = layer
                        .field(&node.path, legacy::CLIP_TEMPLATE_END_TIME)
                        .and_then(Value::as_double);
                }

                if def.clip_asset_paths.is_none() {
                    if let (Some(template), Some(stride), Some(start), Some(end)) = (
                        template_asset_path.as_deref(),
                        template_stride,
                        template_start,
                        template_end,
                    ) {
                        // The legacy format has no active offset.
                        let derived = anchor
                            .layer_stack
                            .layer(anchor.layer_index)
                            .and_then(|anchor_layer| {
                                derive_clip_info(
                                    template,
                                    stride,
                                    None,
                                    start,
                                    end,
                                    anchor_layer,
                                    resolver,
                                    prim_index.path(),
                                )
                            });
                        if let Some(DerivedClipInfo {
                            asset_paths,
                            mut times,
                            mut active,
                        }) = derived
                        {
                            apply_layer_offset_to_external_times(anchor.offset, &mut times);
                            apply_layer_offset_to_external_times(anchor.offset, &mut active);
                            def.clip_asset_paths = Some(asset_paths);
                            def.clip_times = Some(times);
                            def.clip_active = Some(active);
                        }
                    }
                }
            }
        }
    }

    Some(def)
}

/// Compose all clip set definitions for a prim.
///
/// Returns `(name, definition)` pairs ordered deterministically by
/// (anchor layer-stack identifier, anchor prim path, declared list-op
/// order). Clip sets without any asset-path anchor are dropped silently;
/// they may be an intentional block of a weaker opinion.
pub fn compose_clip_set_definitions(
    prim_index: &PrimIndex,
    resolver: &dyn AssetResolver,
    config: &ClipsConfig,
) -> Vec<(String, ClipSetDefinition)> {
    if config.read_legacy_clips {
        if let Some(def) = resolve_legacy_clip_info(prim_index, resolver) {
            return vec![(DEFAULT_CLIP_SET.to_string(), def)];
        }
    }

    // Strongest to weakest across nodes; within each node the layer scan
    // has already produced a node-local composition.
    let mut composed: BTreeMap<String, ComposedClipSet> = BTreeMap::new();
    for node in prim_index.nodes() {
        for (name, node_set) in resolve_clip_sets_in_node(node, prim_index.path()) {
            let entry = composed.entry(name).or_default();
            if entry.anchor.is_none() {
                entry.anchor = node_set.anchor;
            }
            entry.info = Dictionary::over_recursive(&entry.info, &node_set.info);
        }
    }

    let mut anchored: Vec<(String, AnchorInfo, Dictionary)> = composed
        .into_iter()
        .filter_map(|(name, set)| set.anchor.map(|anchor| (name, anchor, set.info)))
        .collect();

    anchored.sort_by(|(_, a, _), (_, b, _)| {
        (a.layer_stack.identifier(), &a.prim_path, a.layer_stack_order).cmp(&(
            b.layer_stack.identifier(),
            &b.prim_path,
            b.layer_stack_order,
        ))
    });

    anchored
        .into_iter()
        .map(|(name, anchor, clip_info)| {
            let def = unpack_definition(&anchor, &clip_info, prim_index, resolver);
            (name, def)
        })
        .collect()
}
