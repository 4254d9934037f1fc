//! Fused Pass Planner for a fixed-function NPU accelerator.
//!
//! The planner takes a typed, directed acyclic graph of tensor-producing
//! nodes and greedily groups maximal chains of fusible nodes into hardware
//! "passes" — each fusing an MCE (matrix/convolution engine) stage with
//! optional post-processing and a programmable PLE (pooling/elementwise)
//! kernel. For every pass it chooses a convolution algorithm (direct vs.
//! Winograd), a block configuration, a tiling/streaming strategy, and an
//! SRAM allocation, bound together by a bump/free allocator over a fixed
//! SRAM region.
//!
//! The planner is explicitly greedy: it makes no attempt at global
//! optimisation, never splits a node across passes, and gives no guarantee
//! of the minimum pass count. Its only recoverable failure mode is "no pass
//! this attempt", communicated back to the caller by mutating a hint field
//! on a graph node rather than by raising; the caller (here, [`plan_all`])
//! re-runs planning until either a pass commits or no further hint changes
//! the outcome.
//!
//! # Module map
//!
//! - [`common`] — shapes, data formats, and the fatal-assertion error type.
//! - [`caps`] — accelerator capability constants.
//! - [`graph`] — the node graph the planner walks and mutates via hints.
//! - [`alloc`] — the value-semantic SRAM allocator.
//! - [`algorithm`] — direct vs. Winograd selection.
//! - [`blockconfig`] — block-config filtering and ranking.
//! - [`strategy`] — tiling/streaming strategies and the strategy selector.
//! - [`fuser`] — the linear chain fuser.
//! - [`pass_builder`] — the hint protocol and pass commit logic.
//! - [`weight_encoder`] — the weight-encoding collaborator interface.
//! - [`command_stream`] — the command-stream emission collaborator interface.
//! - [`plan`] — the single-attempt and driver-loop entry points.

/// Direct vs. Winograd algorithm selection (§4.3).
pub mod algorithm;
/// The value-semantic SRAM bump/free allocator (§4.1).
pub mod alloc;
/// Block config filtering and ranking (§4.2).
pub mod blockconfig;
/// Accelerator capability constants (§6).
pub mod caps;
/// Command-stream emission interface and Sigmoid rescale math (§6).
pub mod command_stream;
/// Common types shared across the planner: shapes, formats, errors.
pub mod common;
/// The Linear Chain Fuser (§4.5).
pub mod fuser;
/// The node graph the planner walks and mutates via hints (§3).
pub mod graph;
/// Single-attempt and driver-loop planning entry points.
pub mod plan;
/// The Pass Builder hint protocol (§4.6).
pub mod pass_builder;
/// Tiling/streaming strategies and the strategy selector (§4.4, §6).
pub mod strategy;
/// Weight-encoding interface and stripe-depth derivation (§6).
pub mod weight_encoder;

pub use algorithm::Algorithm;
pub use alloc::SramAllocator;
pub use blockconfig::BlockConfig;
pub use caps::Capabilities;
pub use common::{DataFormat, FixGraphHint, Location, PlanError};
pub use fuser::{fuse_from, FuseResult};
pub use graph::{Graph, Node, NodeId, NodeKind};
pub use pass_builder::{build, BuildFlags, PassOutcome, PassRecord};
pub use plan::{plan_all, plan_from_seed, PlanConfig, PlanOutcome};
pub use strategy::{Strategy, TensorConfig};
