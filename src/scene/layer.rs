//! Layers, layer offsets, and layer stacks.
//!
//! A [`Layer`] is an opaque hierarchical key-value store: fields keyed by
//! (path, field name) plus per-property time-sample tables. This library
//! never interprets layer file formats; layers arrive fully populated from
//! the caller or from the asset resolver.
//!
//! A [`LayerStack`] is an ordered set of layers (strongest first) with a
//! time offset from each layer to the stack root. Layer stacks are
//! read-only here and may be shared freely across clip sets.

use std::ops::Mul;
use std::sync::Arc;

use std::collections::BTreeMap;

use crate::scene::{ScenePath, Value};
use crate::util::TimeCode;

/// Shared handle to an immutable layer.
pub type LayerHandle = Arc<Layer>;

/// Field name under which a property's default (non-time-varying) value is
/// stored. Manifest fallback reads this field.
pub const DEFAULT_FIELD: &str = "default";

/// A hierarchical key-value store with time samples.
#[derive(Clone, Debug, Default)]
pub struct Layer {
    identifier: String,
    fields: BTreeMap<ScenePath, BTreeMap<String, Value>>,
    /// Per-property time samples, each list sorted by time.
    samples: BTreeMap<ScenePath, Vec<(TimeCode, Value)>>,
}

impl Layer {
    /// Create an empty layer with the given identifier.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Default::default()
        }
    }

    /// Create an anonymous in-memory layer. Used as the fallback when a
    /// clip layer cannot be opened, so queries degrade to "no samples"
    /// instead of erroring on every access.
    pub fn anonymous(tag: &str) -> Self {
        Self::new(format!("anon:{}", tag))
    }

    /// Get the layer identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Check whether this layer is an anonymous fallback layer.
    pub fn is_anonymous(&self) -> bool {
        self.identifier.starts_with("anon:")
    }

    // === Fields ===

    /// Get a field value at a path.
    pub fn field(&self, path: &ScenePath, key: &str) -> Option<&Value> {
        self.fields.get(path).and_then(|m| m.get(key))
    }

    /// Check if a field exists at a path.
    pub fn has_field(&self, path: &ScenePath, key: &str) -> bool {
        self.field(path, key).is_some()
    }

    /// Set a field value at a path.
    pub fn set_field(&mut self, path: &ScenePath, key: impl Into<String>, value: impl Into<Value>) {
        self.fields
            .entry(path.clone())
            .or_default()
            .insert(key.into(), value.into());
    }

    /// List the field names authored at a path.
    pub fn list_fields(&self, path: &ScenePath) -> Vec<&str> {
        self.fields
            .get(path)
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Get a property's default value, if authored.
    pub fn default_value(&self, path: &ScenePath) -> Option<&Value> {
        self.field(path, DEFAULT_FIELD)
    }

    /// Set a property's default value.
    pub fn set_default_value(&mut self, path: &ScenePath, value: impl Into<Value>) {
        self.set_field(path, DEFAULT_FIELD, value);
    }

    // === Time samples ===

    /// Author a time sample for a property, keeping the table sorted.
    pub fn set_time_sample(&mut self, path: &ScenePath, time: TimeCode, value: impl Into<Value>) {
        let samples = self.samples.entry(path.clone()).or_default();
        match samples.binary_search_by(|(t, _)| t.total_cmp(&time)) {
            Ok(i) => samples[i].1 = value.into(),
            Err(i) => samples.insert(i, (time, value.into())),
        }
    }

    /// Check whether a property has any authored time samples.
    pub fn has_time_samples(&self, path: &ScenePath) -> bool {
        self.samples.get(path).is_some_and(|s| !s.is_empty())
    }

    /// Query the sample authored at exactly the given time.
    pub fn query_time_sample(&self, path: &ScenePath, time: TimeCode) -> Option<&Value> {
        let samples = self.samples.get(path)?;
        samples
            .binary_search_by(|(t, _)| t.total_cmp(&time))
            .ok()
            .map(|i| &samples[i].1)
    }

    /// Get the authored sample times bracketing `time`.
    ///
    /// Before the first sample both brackets are the first time; after the
    /// last both are the last; exactly on a sample both are that time.
    pub fn bracketing_time_samples(
        &self,
        path: &ScenePath,
        time: TimeCode,
    ) -> Option<(TimeCode, TimeCode)> {
        let samples = self.samples.get(path)?;
        if samples.is_empty() {
            return None;
        }

        let first = samples[0].0;
        let last = samples[samples.len() - 1].0;
        if time <= first {
            return Some((first, first));
        }
        if time >= last {
            return Some((last, last));
        }

        let upper_idx = samples.partition_point(|(t, _)| *t < time);
        let upper = samples[upper_idx].0;
        if upper == time {
            Some((time, time))
        } else {
            Some((samples[upper_idx - 1].0, upper))
        }
    }

    /// List all authored sample times for a property, sorted.
    pub fn list_time_samples(&self, path: &ScenePath) -> Vec<TimeCode> {
        self.samples
            .get(path)
            .map(|s| s.iter().map(|(t, _)| *t).collect())
            .unwrap_or_default()
    }
}

/// A scale-and-offset time transform between layers.
///
/// `apply(t) = t * scale + offset`. Offsets compose with `*`, with the
/// left operand applied last.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerOffset {
    pub offset: f64,
    pub scale: f64,
}

impl LayerOffset {
    /// The identity transform.
    pub const IDENTITY: Self = Self { offset: 0.0, scale: 1.0 };

    /// Create an offset-and-scale transform.
    pub fn new(offset: f64, scale: f64) -> Self {
        Self { offset, scale }
    }

    /// Check for the identity transform.
    pub fn is_identity(&self) -> bool {
        self.offset == 0.0 && self.scale == 1.0
    }

    /// Transform a time.
    pub fn apply(&self, time: TimeCode) -> TimeCode {
        time * self.scale + self.offset
    }
}

impl Default for LayerOffset {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for LayerOffset {
    type Output = LayerOffset;

    /// Compose two transforms: `(a * b).apply(t) == a.apply(b.apply(t))`.
    fn mul(self, rhs: LayerOffset) -> LayerOffset {
        LayerOffset {
            scale: self.scale * rhs.scale,
            offset: self.scale * rhs.offset + self.offset,
        }
    }
}

/// Shared handle to an immutable layer stack.
pub type LayerStackHandle = Arc<LayerStack>;

/// An ordered set of layers, strongest first.
#[derive(Debug)]
pub struct LayerStack {
    identifier: String,
    layers: Vec<LayerHandle>,
    /// Time offset from each layer to the stack's root layer.
    offsets: Vec<LayerOffset>,
}

impl LayerStack {
    /// Create a layer stack with identity offsets.
    pub fn new(identifier: impl Into<String>, layers: Vec<LayerHandle>) -> Self {
        let offsets = vec![LayerOffset::IDENTITY; layers.len()];
        Self {
            identifier: identifier.into(),
            layers,
            offsets,
        }
    }

    /// Create a layer stack with per-layer offsets to the stack root.
    pub fn with_offsets(
        identifier: impl Into<String>,
        layers: Vec<(LayerHandle, LayerOffset)>,
    ) -> Self {
        let (layers, offsets) = layers.into_iter().unzip();
        Self {
            identifier: identifier.into(),
            layers,
            offsets,
        }
    }

    /// Get the stack identifier. Identifiers are the stack's identity for
    /// the deterministic composition-strength sort.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Get the layers, strongest first.
    pub fn layers(&self) -> &[LayerHandle] {
        &self.layers
    }

    /// Get a layer by index.
    pub fn layer(&self, index: usize) -> Option<&LayerHandle> {
        self.layers.get(index)
    }

    /// Get the number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Check if the stack has no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Get the time offset from the layer at `index` to the stack root.
    pub fn layer_offset_for_layer(&self, index: usize) -> LayerOffset {
        self.offsets.get(index).copied().unwrap_or_default()
    }
}
