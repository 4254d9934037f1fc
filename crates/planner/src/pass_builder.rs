//! Pass Builder: the hint protocol (§4.6).
//!
//! Interprets a [`FuseResult`]. On success it commits the winning allocator
//! snapshot and produces a [`PassRecord`]; on failure it installs exactly
//! one hint onto exactly one node's `fix_graph_hint` field and reports
//! `NoPass`, applying that hint's concrete effect immediately so the next
//! fusion attempt observes it as already-true graph state (the outer retry
//! loop in [`crate::plan`] never needs to interpret hints itself).

use crate::common::{DataFormat, FixGraphHint, Location};
use crate::fuser::FuseResult;
use crate::graph::{Graph, NodeId, PassId};
use crate::strategy::TensorConfig;

/// Immutable record of one committed pass (§3 "Pass record").
#[derive(Debug, Clone)]
pub struct PassRecord {
    /// This pass's identity.
    pub id: PassId,
    /// Every node fused into this pass, in chain order.
    pub working_nodes: Vec<NodeId>,
    /// The winning tensor config.
    pub tensor_config: TensorConfig,
    /// Where the output ended up.
    pub output_location: Location,
    /// The algorithm used.
    pub algorithm: crate::algorithm::Algorithm,
    /// The output's SRAM offset, forwarded for emission and for a
    /// downstream pass that consumes this output directly from SRAM.
    pub output_sram_offset: u32,
    /// Whether the output was left compressed in DRAM.
    pub used_intermediate_compression: bool,
}

/// The result of one pass-builder attempt.
#[derive(Debug, Clone)]
pub enum PassOutcome {
    /// A pass was committed.
    Pass(PassRecord),
    /// No pass was produced this attempt; a hint may have been installed
    /// (none is installed only when fusion captured no MCE at all, or when
    /// hint 4's dependency-cone search finds nothing to evict).
    NoPass,
}

/// Global flags threaded through pass building (§6, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildFlags {
    /// Whether intermediate (DRAM-resident) output compression is enabled.
    pub intermediate_compression_enabled: bool,
}

fn set_hint_with_effect(graph: &mut Graph, node: NodeId, hint: FixGraphHint) {
    let Some(n) = graph.get_mut(node) else { return };
    tracing::debug!(node = node.0, hint = ?hint, "installing fix-graph hint");
    n.fix_graph_hint = Some(hint);
    match hint {
        FixGraphHint::ConvertOutputTo(format) => n.format = format,
        FixGraphHint::ForceLocationDram => n.location = Location::Dram,
        FixGraphHint::ForceUncompressed => n.compressed = false,
        FixGraphHint::AlgorithmDirect => {}
    }
}

/// Interprets `fuse_result` per §4.6, mutating `graph` and `allocator` as
/// the hint protocol or a commit requires.
#[tracing::instrument(skip(graph, allocator, fuse_result, flags))]
pub fn build(
    graph: &mut Graph,
    allocator: &mut crate::alloc::SramAllocator,
    fuse_result: &FuseResult,
    flags: BuildFlags,
) -> PassOutcome {
    if !fuse_result.mce_ever_captured {
        return PassOutcome::NoPass;
    }

    let Some(mce_node) = fuse_result.mce_node else {
        return PassOutcome::NoPass;
    };

    let Some(best) = &fuse_result.best else {
        // Strategy selection never succeeded for any attempted extension.
        if fuse_result.last_attempted_algorithm == Some(crate::algorithm::Algorithm::Winograd) {
            set_hint_with_effect(graph, mce_node, FixGraphHint::AlgorithmDirect);
        } else if let Some(victim) = graph.first_sram_resident_ancestor(mce_node) {
            set_hint_with_effect(graph, victim, FixGraphHint::ForceLocationDram);
        }
        return PassOutcome::NoPass;
    };

    if let Some(required) = best.required_output_format {
        let tail_format = graph.get(best.tail_node).map(|n| n.format);
        if tail_format != Some(required) {
            set_hint_with_effect(graph, best.tail_node, FixGraphHint::ConvertOutputTo(required));
            return PassOutcome::NoPass;
        }
    }

    if let Some(producer) = fuse_result.input_producer {
        let producer_state = graph.get(producer).map(|n| (n.format, n.compressed));
        if let Some((producer_format, producer_compressed)) = producer_state {
            let stripe = best.tensor_config.input.stripe_shape;
            let c_is_streamed = stripe.c < best.mce_input_shape.c;
            let w_or_c_is_streamed = stripe.w < best.mce_input_shape.w || c_is_streamed;

            if c_is_streamed && producer_format == DataFormat::Nhwc {
                set_hint_with_effect(graph, producer, FixGraphHint::ConvertOutputTo(DataFormat::Nhwcb));
                return PassOutcome::NoPass;
            }

            if producer_compressed && w_or_c_is_streamed {
                set_hint_with_effect(graph, producer, FixGraphHint::ForceUncompressed);
                return PassOutcome::NoPass;
            }
        }
    }

    commit(graph, allocator, best, flags)
}

fn commit(
    graph: &mut Graph,
    allocator: &mut crate::alloc::SramAllocator,
    best: &crate::fuser::RunningBest,
    flags: BuildFlags,
) -> PassOutcome {
    *allocator = best.allocator.clone();

    allocator.free(best.tensor_config.weights.offset);
    allocator.free(best.tensor_config.ple_code.offset);
    free_input_and_output(graph, allocator, best);

    let used_intermediate_compression = compute_use_intermediate_compression(graph, best, flags);

    let pass_id = graph.alloc_pass_id();
    for &node_id in &best.working_nodes {
        if let Some(n) = graph.get_mut(node_id) {
            n.owning_pass = Some(pass_id);
        }
    }

    if let Some(tail) = graph.get_mut(best.tail_node) {
        tail.location = best.output_location;
        tail.compressed = used_intermediate_compression;
        tail.output_sram_offset = (best.output_location == Location::Sram).then_some(best.tensor_config.output.offset);
    }

    PassOutcome::Pass(PassRecord {
        id: pass_id,
        working_nodes: best.working_nodes.clone(),
        tensor_config: best.tensor_config,
        output_location: best.output_location,
        algorithm: best.algorithm,
        output_sram_offset: best.tensor_config.output.offset,
        used_intermediate_compression,
    })
}

fn free_input_and_output(graph: &Graph, allocator: &mut crate::alloc::SramAllocator, best: &crate::fuser::RunningBest) {
    let input_producer_in_sram = best
        .working_nodes
        .first()
        .and_then(|&first| graph.get(first))
        .and_then(|first_node| first_node.inputs.first())
        .and_then(|edge| graph.get(edge.source))
        .is_some_and(|producer| producer.location == Location::Sram);

    if !input_producer_in_sram {
        allocator.free(best.tensor_config.input.offset);
    }
    if best.output_location == Location::Dram {
        allocator.free(best.tensor_config.output.offset);
    }
}

fn compute_use_intermediate_compression(graph: &Graph, best: &crate::fuser::RunningBest, flags: BuildFlags) -> bool {
    let Some(tail) = graph.get(best.tail_node) else {
        return false;
    };
    let prefers_compression = tail.compression_hint == Some(crate::common::CompressionHint::PreferCompressed);
    let stripe = best.tensor_config.output.stripe_shape;
    let covers_full_w_and_c = stripe.w >= tail.output_shape.w && stripe.c >= tail.output_shape.c;

    flags.intermediate_compression_enabled
        && prefers_compression
        && tail.format == DataFormat::Nhwcb
        && best.output_location == Location::Dram
        && covers_full_w_and_c
}
