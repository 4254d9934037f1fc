//! The node graph the planner walks and mutates via hints (§3, §9).

/// The `Graph` container and its traversal helpers.
mod graph;
/// Node kinds, the MCE/PLE payload types, and [`NodeId`]/[`PassId`].
pub mod node;

pub use graph::Graph;
pub use node::{
    AlgorithmHint, Edge, FuseOnlyPle, MceOpType, MceOperation, McePostProcess, Node, NodeId,
    NodeKind, PassId, PleKind, QuantInfo, ShapeMultiplier, WeightFormat,
};
