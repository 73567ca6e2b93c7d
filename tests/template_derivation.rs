//! Template clip derivation against a real directory of frame files.

use std::fs::File;
use std::sync::Arc;

use glam::DVec2;
use tempfile::tempdir;
use usd_clips::compose::keys::info;
use usd_clips::prelude::*;

fn path(s: &str) -> ScenePath {
    ScenePath::parse(s).unwrap()
}

fn author_template_set(layer: &mut Layer, prim: &ScenePath, template: &str, end: f64) {
    let mut clips = ClipsAccessor::new(layer, prim, ClipsConfig::default());
    clips
        .set_clip_value("anim", info::TEMPLATE_ASSET_PATH, Value::String(template.into()))
        .unwrap();
    clips
        .set_clip_value("anim", info::TEMPLATE_STRIDE, Value::Double(1.0))
        .unwrap();
    clips
        .set_clip_value("anim", info::TEMPLATE_START_TIME, Value::Double(0.0))
        .unwrap();
    clips
        .set_clip_value("anim", info::TEMPLATE_END_TIME, Value::Double(end))
        .unwrap();
    clips
        .set_clip_value("anim", info::PRIM_PATH, Value::String("/Model".into()))
        .unwrap();
}

#[test]
fn test_sparse_frames_on_disk() {
    let dir = tempdir().unwrap();
    File::create(dir.path().join("clip.0.usd")).unwrap();
    File::create(dir.path().join("clip.2.usd")).unwrap();
    // clip.1.usd deliberately absent.

    let model = path("/Model");
    let root_identifier = dir.path().join("root.usda").to_string_lossy().into_owned();
    let mut root = Layer::new(root_identifier);
    author_template_set(&mut root, &model, "clip.#.usd", 2.0);

    let stack = Arc::new(LayerStack::new("stack:root", vec![Arc::new(root)]));
    let mut index = PrimIndex::new(model.clone());
    index.push_node(CompositionNode::new(stack, model));

    let defs = compose_clip_set_definitions(&index, &OsResolver, &ClipsConfig::default());
    assert_eq!(defs.len(), 1);
    let def = &defs[0].1;

    assert_eq!(
        def.clip_asset_paths.as_deref(),
        Some(&["clip.0.usd".to_string(), "clip.2.usd".to_string()][..])
    );
    assert_eq!(
        def.clip_times.as_deref(),
        Some(&[DVec2::new(0.0, 0.0), DVec2::new(2.0, 2.0)][..])
    );
    // Active indices stay dense across the hole in the frame range.
    assert_eq!(
        def.clip_active.as_deref(),
        Some(&[DVec2::new(0.0, 0.0), DVec2::new(2.0, 1.0)][..])
    );
}

#[test]
fn test_template_set_queries_through_memory_resolver() {
    let model = path("/Model");
    let attr = path("/Model.size");

    let mut resolver = MemoryResolver::new();
    for frame in 0..3 {
        let identifier = format!("frames/clip.{frame}.usd");
        let mut layer = Layer::new(identifier.clone());
        layer.set_time_sample(&attr, frame as f64, Value::Double(frame as f64 * 10.0));
        resolver.insert(identifier, Arc::new(layer));
    }

    let mut root = Layer::new("root.usda");
    author_template_set(&mut root, &model, "frames/clip.#.usd", 2.0);

    let stack = Arc::new(LayerStack::new("stack:root", vec![Arc::new(root)]));
    let mut index = PrimIndex::new(model.clone());
    index.push_node(CompositionNode::new(stack, model));

    let sets = compose_clip_sets(&index, &resolver, &ClipsConfig::default());
    assert_eq!(sets.len(), 1);
    let set = &sets[0];
    assert_eq!(set.value_clips().len(), 3);

    // Each frame's clip is active over its own unit interval.
    for frame in 0..3 {
        let time = frame as f64;
        assert_eq!(
            set.query_time_sample(&attr, time, &HeldInterpolator, &resolver),
            Some(Value::Double(time * 10.0))
        );
    }
    assert_eq!(
        set.active_clip(1.5).unwrap().asset_path,
        "frames/clip.1.usd"
    );
}

#[test]
fn test_subframe_template_on_disk() {
    let dir = tempdir().unwrap();
    File::create(dir.path().join("clip.001.25.usd")).unwrap();
    File::create(dir.path().join("clip.001.75.usd")).unwrap();

    let model = path("/Model");
    let root_identifier = dir.path().join("root.usda").to_string_lossy().into_owned();
    let mut root = Layer::new(root_identifier);

    let mut clips = ClipsAccessor::new(&mut root, &model, ClipsConfig::default());
    clips
        .set_clip_value(
            "anim",
            info::TEMPLATE_ASSET_PATH,
            Value::String("clip.###.##.usd".into()),
        )
        .unwrap();
    clips
        .set_clip_value("anim", info::TEMPLATE_STRIDE, Value::Double(0.5))
        .unwrap();
    clips
        .set_clip_value("anim", info::TEMPLATE_START_TIME, Value::Double(1.25))
        .unwrap();
    clips
        .set_clip_value("anim", info::TEMPLATE_END_TIME, Value::Double(1.75))
        .unwrap();
    clips
        .set_clip_value("anim", info::PRIM_PATH, Value::String("/Model".into()))
        .unwrap();

    let stack = Arc::new(LayerStack::new("stack:root", vec![Arc::new(root)]));
    let mut index = PrimIndex::new(model.clone());
    index.push_node(CompositionNode::new(stack, model));

    let defs = compose_clip_set_definitions(&index, &OsResolver, &ClipsConfig::default());
    let def = &defs[0].1;
    assert_eq!(
        def.clip_asset_paths.as_deref(),
        Some(&["clip.001.25.usd".to_string(), "clip.001.75.usd".to_string()][..])
    );
}
