//! Composition nodes.
//!
//! The composition graph itself is computed elsewhere; this library
//! receives it as an ordered sequence of nodes, strongest opinion first.
//! Each node pairs a layer stack with the prim path at which clip
//! metadata may be authored in that stack, plus the time transform from
//! the node to the composed root.

use crate::scene::{LayerOffset, LayerStackHandle, ScenePath};

/// One node of a composed prim's graph.
#[derive(Clone, Debug)]
pub struct CompositionNode {
    /// The layer stack contributing opinions at this node.
    pub layer_stack: LayerStackHandle,
    /// The prim path within `layer_stack` where opinions are authored.
    pub path: ScenePath,
    /// Time transform from this node to the root node.
    pub map_to_root: LayerOffset,
}

impl CompositionNode {
    /// Create a node with an identity time transform.
    pub fn new(layer_stack: LayerStackHandle, path: ScenePath) -> Self {
        Self {
            layer_stack,
            path,
            map_to_root: LayerOffset::IDENTITY,
        }
    }

    /// Create a node with an explicit node-to-root time transform.
    pub fn with_map_to_root(
        layer_stack: LayerStackHandle,
        path: ScenePath,
        map_to_root: LayerOffset,
    ) -> Self {
        Self {
            layer_stack,
            path,
            map_to_root,
        }
    }

    /// Time transform from a specific layer in this node's stack all the
    /// way to the composed root: first the layer's offset within its
    /// stack, then this node's offset to the root node.
    pub fn layer_offset_to_root(&self, layer_index: usize) -> LayerOffset {
        self.map_to_root * self.layer_stack.layer_offset_for_layer(layer_index)
    }
}

/// The externally computed composition of one prim: the prim's path on
/// the composed stage plus its nodes, strongest first.
#[derive(Clone, Debug)]
pub struct PrimIndex {
    path: ScenePath,
    nodes: Vec<CompositionNode>,
}

impl PrimIndex {
    /// Create an empty prim index for a composed prim path.
    pub fn new(path: ScenePath) -> Self {
        Self {
            path,
            nodes: Vec::new(),
        }
    }

    /// The composed prim's path.
    pub fn path(&self) -> &ScenePath {
        &self.path
    }

    /// Append a node. Nodes must be pushed strongest first.
    pub fn push_node(&mut self, node: CompositionNode) {
        self.nodes.push(node);
    }

    /// The nodes, strongest first.
    pub fn nodes(&self) -> &[CompositionNode] {
        &self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Layer, LayerStack};
    use std::sync::Arc;

    #[test]
    fn test_layer_offset_to_root_composes() {
        let root = Arc::new(Layer::new("root.usda"));
        let sub = Arc::new(Layer::new("sub.usda"));
        let stack = Arc::new(LayerStack::with_offsets(
            "stack:root.usda",
            vec![
                (root, LayerOffset::IDENTITY),
                (sub, LayerOffset::new(10.0, 1.0)),
            ],
        ));
        let node = CompositionNode::with_map_to_root(
            stack,
            ScenePath::parse("/Model").unwrap(),
            LayerOffset::new(0.0, 2.0),
        );

        // layer 1 -> stack root shifts by 10, node -> root scales by 2
        let offset = node.layer_offset_to_root(1);
        assert_eq!(offset.apply(0.0), 20.0);
        assert_eq!(offset.apply(1.0), 22.0);
    }
}
