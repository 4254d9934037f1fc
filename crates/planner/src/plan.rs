//! Single-attempt and driver-loop planning entry points (Part B §6, §9
//! "Hint-driven retry loop").
//!
//! [`plan_from_seed`] ties the fuser and pass builder together for one
//! attempt at one seed node; [`plan_all`] is a thin convenience that repeats
//! this over every node in the graph until the whole graph is either
//! covered by committed passes or stuck at a steady state. Neither
//! introduces new planning logic: the algorithm stays §4.5/§4.6, greedy and
//! single-threaded (§5).

use crate::alloc::SramAllocator;
use crate::blockconfig::BlockConfig;
use crate::caps::Capabilities;
use crate::fuser::fuse_from;
use crate::graph::{Graph, NodeId};
use crate::pass_builder::{build, BuildFlags, PassOutcome, PassRecord};
use crate::strategy::Strategy;

/// The outcome of one planning attempt at one seed node.
#[derive(Debug, Clone)]
pub enum PlanOutcome {
    /// A pass was committed starting at this seed.
    Pass(PassRecord),
    /// No pass was committed this attempt (a hint may have been installed
    /// on some node in the graph, per §4.6).
    NoPass,
}

/// Everything a planning attempt needs besides the graph, seed, and
/// allocator: the search space (§4.4 "ordered list of candidate
/// strategies", §4.2 "allowed block configs"), the target's capabilities,
/// and the global flags §4.6's commit step reads.
#[derive(Debug, Clone)]
pub struct PlanConfig {
    /// Accelerator capabilities.
    pub caps: Capabilities,
    /// Strategies to try, in order (§4.4, §5 ordering guarantee (c)).
    pub allowed_strategies: Vec<Strategy>,
    /// Block configs to try, before filtering/ranking (§4.2).
    pub allowed_block_configs: Vec<BlockConfig>,
    /// Whether Winograd is enabled for this compile at all (§4.3).
    pub winograd_globally_enabled: bool,
    /// Flags threaded into the pass builder's commit step (§4.6).
    pub build_flags: BuildFlags,
}

/// Runs one fusion + build attempt from `seed` (§4.5, §4.6).
#[tracing::instrument(skip(graph, allocator, config), fields(seed = seed.0))]
pub fn plan_from_seed(graph: &mut Graph, seed: NodeId, allocator: &mut SramAllocator, config: &PlanConfig) -> PlanOutcome {
    let fuse_result = fuse_from(
        graph,
        seed,
        allocator,
        &config.allowed_strategies,
        &config.allowed_block_configs,
        &config.caps,
        config.winograd_globally_enabled,
    );

    match build(graph, allocator, &fuse_result, config.build_flags) {
        PassOutcome::Pass(record) => {
            tracing::debug!(pass = record.id.0, nodes = record.working_nodes.len(), "committed pass");
            PlanOutcome::Pass(record)
        }
        PassOutcome::NoPass => PlanOutcome::NoPass,
    }
}

/// Upper bound on retries of a single seed before `plan_all` gives up and
/// advances past it. The progress argument (§4.6) guarantees every retry
/// installs a strictly stronger hint, so a well-formed graph converges in a
/// handful of attempts; this cap only guards a reference driver against a
/// pathological graph, and is not itself part of the planning algorithm.
const MAX_RETRIES_PER_SEED: u32 = 16;

/// Repeatedly plans from every not-yet-owned node in `graph`, in graph
/// order, re-attempting each seed until it either commits a pass or reaches
/// a steady state (no further hint changes the outcome), then advancing
/// (Part B §6).
pub fn plan_all(graph: &mut Graph, allocator: &mut SramAllocator, config: &PlanConfig) -> Vec<PassRecord> {
    let mut passes = Vec::new();
    let node_count = graph.len();

    for index in 0..node_count {
        let seed = NodeId(u32::try_from(index).unwrap_or(u32::MAX));
        if graph.get(seed).map_or(true, |n| n.owning_pass.is_some()) {
            continue;
        }

        for attempt in 0..MAX_RETRIES_PER_SEED {
            match plan_from_seed(graph, seed, allocator, config) {
                PlanOutcome::Pass(record) => {
                    passes.push(record);
                    break;
                }
                PlanOutcome::NoPass => {
                    if graph.get(seed).is_some_and(|n| n.owning_pass.is_some()) {
                        // A later retry on this same seed already got
                        // folded into an earlier seed's committed pass.
                        break;
                    }
                    if attempt + 1 == MAX_RETRIES_PER_SEED {
                        tracing::warn!(seed = seed.0, "planning did not converge within the retry cap");
                    }
                }
            }
        }
    }

    passes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{CompressionHint, DataFormat, Shape4D, WeightShape};
    use crate::graph::{AlgorithmHint, MceOpType, MceOperation, Node, NodeKind, QuantInfo, WeightFormat};

    fn default_config() -> PlanConfig {
        PlanConfig {
            caps: Capabilities::default(),
            allowed_strategies: vec![Strategy::S0, Strategy::S1, Strategy::S3],
            allowed_block_configs: vec![BlockConfig::new(16, 16), BlockConfig::new(8, 8), BlockConfig::new(32, 8)],
            winograd_globally_enabled: true,
            build_flags: BuildFlags {
                intermediate_compression_enabled: true,
            },
        }
    }

    #[test]
    fn plan_all_commits_a_single_mce_chain() {
        let mut graph = Graph::new();
        let source = graph.push(|id| {
            Node::new(
                id,
                Shape4D::new(1, 16, 16, 4),
                DataFormat::Nhwc,
                NodeKind::FormatConversion {
                    target_format: DataFormat::Nhwc,
                },
            )
            .with_location(crate::common::Location::Dram)
        });
        let _mce = graph.push(|id| {
            Node::new(
                id,
                Shape4D::new(1, 16, 16, 4),
                DataFormat::Nhwc,
                NodeKind::MceOperation(MceOperation {
                    op_type: MceOpType::Convolution,
                    weight_shape: WeightShape::new(1, 1, 4, 4),
                    weight_format: WeightFormat::Hwio,
                    quant_info: QuantInfo { scale: 1.0, zero_point: 0 },
                    stride: (1, 1),
                    upscale: 1,
                    algorithm_hint: AlgorithmHint::AllowWinograd,
                }),
            )
            .with_input(source)
            .with_compression_hint(CompressionHint::PreferCompressed)
        });

        let mut allocator = SramAllocator::new(10_000_000);
        let config = default_config();
        let passes = plan_all(&mut graph, &mut allocator, &config);

        assert_eq!(passes.len(), 1);
        assert!(graph[_mce].owning_pass.is_some());
    }
}
