//! Linear Chain Fuser (§4.5).
//!
//! Walks forward from a seed node over the graph's "next linear node"
//! relation, admitting nodes under the typed rules in the admission table,
//! and re-running algorithm choice, block-config filtering, and strategy
//! selection after every admission. The longest successful prefix is kept
//! as the running best: later failures never roll it back, only later
//! successes replace it (§9 open questions — intentional greedy-maximal
//! fusion, preserved as specified).

use crate::algorithm::{choose_algorithm, effective_weight_shape, Algorithm};
use crate::alloc::SramAllocator;
use crate::blockconfig::{filter_and_rank, BlockConfig};
use crate::caps::Capabilities;
use crate::common::{DataFormat, FixGraphHint, Location, LocationHint, Shape4D};
use crate::graph::{Graph, MceOpType, MceOperation, NodeId, NodeKind};
use crate::strategy::{select, InputResidency, Strategy, TensorConfig};

/// The fusion state recorded the last time strategy selection succeeded
/// during this walk.
#[derive(Debug, Clone)]
pub struct RunningBest {
    /// Every node from the seed to `tail_node`, in chain order.
    pub working_nodes: Vec<NodeId>,
    /// The SRAM allocator snapshot after this pass's allocations.
    pub allocator: SramAllocator,
    /// The winning tensor config.
    pub tensor_config: TensorConfig,
    /// The algorithm this pass uses.
    pub algorithm: Algorithm,
    /// The output format this pass requires, if any (§4.5).
    pub required_output_format: Option<DataFormat>,
    /// Where the output will live if this pass commits.
    pub output_location: Location,
    /// The last node admitted into this successful prefix.
    pub tail_node: NodeId,
    /// The MCE's input shape used for this attempt (§4.6 hints 5 and 6
    /// compare the chosen input stripe against this).
    pub mce_input_shape: Shape4D,
}

/// The outcome of one fusion walk, consumed by the Pass Builder (§4.6).
#[derive(Debug, Clone)]
pub struct FuseResult {
    /// Whether an `MceOperation` was ever captured during this walk.
    pub mce_ever_captured: bool,
    /// The captured MCE node, if any.
    pub mce_node: Option<NodeId>,
    /// The algorithm used by the last (possibly only) attempt.
    pub last_attempted_algorithm: Option<Algorithm>,
    /// The longest successful prefix, if strategy selection ever succeeded.
    pub best: Option<RunningBest>,
    /// The node producing the seed's primary input, if any.
    pub input_producer: Option<NodeId>,
}

fn mce_input_shape(graph: &Graph, mce_id: NodeId) -> Shape4D {
    graph[mce_id]
        .inputs
        .first()
        .and_then(|edge| graph.get(edge.source))
        .map_or(Shape4D::new(0, 0, 0, 0), |node| node.output_shape)
}

fn derive_required_output_format(
    tensor_config: &TensorConfig,
    mce: &MceOperation,
    strategy: Strategy,
    tail_format: DataFormat,
    output_shape: Shape4D,
    location_hint: Option<LocationHint>,
) -> (Option<DataFormat>, Location) {
    let stripe = tensor_config.output.stripe_shape;
    let is_fc = mce.op_type == MceOpType::FullyConnected;

    if !is_fc && (stripe.w < output_shape.w || stripe.c < output_shape.c) {
        (Some(DataFormat::Nhwcb), Location::Dram)
    } else if is_fc {
        (Some(DataFormat::Nhwc), Location::Dram)
    } else if strategy == Strategy::S3
        && tail_format == DataFormat::Nhwcb
        && location_hint != Some(LocationHint::RequireDram)
    {
        (Some(DataFormat::Nhwcb), Location::Sram)
    } else {
        (None, Location::Dram)
    }
}

/// Runs one fusion walk from `seed` (§4.5).
#[allow(clippy::too_many_lines)]
#[tracing::instrument(skip(graph, allocator, allowed_strategies, allowed_block_configs, caps), fields(seed = seed.0))]
pub fn fuse_from(
    graph: &Graph,
    seed: NodeId,
    allocator: &SramAllocator,
    allowed_strategies: &[Strategy],
    allowed_block_configs: &[BlockConfig],
    caps: &Capabilities,
    winograd_globally_enabled: bool,
) -> FuseResult {
    let mut mce_captured: Option<NodeId> = None;
    let mut extract_captured: Option<NodeId> = None;
    let mut ple_captured: Option<NodeId> = None;
    let mut found_post_conversions = false;
    let mut found_requantizes = false;
    let mut required_output_format: Option<DataFormat> = None;
    let mut algorithm: Option<Algorithm> = None;
    let mut best: Option<RunningBest> = None;
    let mut working_nodes: Vec<NodeId> = Vec::new();

    let input_producer = graph.get(seed).and_then(|n| n.inputs.first()).map(|e| e.source);

    let mut current = Some(seed);
    while let Some(id) = current {
        let Some(node) = graph.get(id) else { break };

        let admitted = match &node.kind {
            NodeKind::FormatConversion { target_format } => {
                if mce_captured.is_none() {
                    true
                } else if required_output_format.is_none() || required_output_format == Some(*target_format) {
                    found_post_conversions = true;
                    true
                } else {
                    false
                }
            }
            NodeKind::ExtractSubtensor { .. } => mce_captured.is_none() && extract_captured.is_none(),
            NodeKind::MceOperation(_) => mce_captured.is_none(),
            NodeKind::McePostProcess(_) => {
                mce_captured.is_some() && ple_captured.is_none() && !found_post_conversions && !found_requantizes
            }
            NodeKind::FuseOnlyPle(_) => mce_captured.is_some() && ple_captured.is_none() && !found_post_conversions,
            NodeKind::Requantize(_) => {
                mce_captured.is_some()
                    && ple_captured.map_or(true, |p| {
                        graph.get(p).and_then(|n| n.as_fuse_only_ple()).is_some_and(|ple| ple.agnostic_to_requantization)
                    })
            }
        };

        if !admitted {
            tracing::trace!(node = id.0, kind = node.kind.name(), "admission stopped the walk");
            break;
        }
        tracing::trace!(node = id.0, kind = node.kind.name(), "admitted node");

        match &node.kind {
            NodeKind::ExtractSubtensor { .. } => extract_captured = Some(id),
            NodeKind::MceOperation(_) => mce_captured = Some(id),
            NodeKind::FuseOnlyPle(_) => ple_captured = Some(id),
            NodeKind::Requantize(_) => found_requantizes = true,
            NodeKind::FormatConversion { .. } | NodeKind::McePostProcess(_) => {}
        }

        working_nodes.push(id);

        if let Some(mce_id) = mce_captured {
            let mce_node = &graph[mce_id];
            if let Some(mce) = mce_node.as_mce() {
                let chosen_algorithm = *algorithm.get_or_insert_with(|| {
                    if mce_node.fix_graph_hint == Some(FixGraphHint::AlgorithmDirect) {
                        Algorithm::Direct
                    } else {
                        choose_algorithm(mce, caps, winograd_globally_enabled)
                    }
                });

                let ple = ple_captured.and_then(|p| graph[p].as_fuse_only_ple());
                let tail_node = &graph[id];
                let rounded_weight_shape = effective_weight_shape(mce.weight_shape, chosen_algorithm);

                let block_configs = filter_and_rank(
                    mce,
                    ple,
                    chosen_algorithm,
                    allowed_block_configs,
                    caps,
                    tail_node.output_shape,
                );

                if !block_configs.is_empty() {
                    let mce_input_shape = mce_input_shape(graph, mce_id);
                    let shape_multiplier = ple.map_or(crate::graph::ShapeMultiplier::IDENTITY, |p| p.shape_multiplier);
                    let fused_ple_kind = ple.map(|p| p.kind);

                    let input_residency = input_producer.and_then(|p| graph.get(p)).map_or(
                        InputResidency { in_sram: false, sram_offset: None },
                        |producer| InputResidency {
                            in_sram: producer.location == Location::Sram,
                            sram_offset: producer.output_sram_offset,
                        },
                    );

                    if let Some((tensor_config, new_allocator)) = select(
                        caps,
                        allocator,
                        allowed_strategies,
                        &block_configs,
                        mce_input_shape,
                        tail_node.output_shape,
                        mce.weight_format,
                        rounded_weight_shape,
                        shape_multiplier,
                        input_residency,
                        chosen_algorithm,
                        mce.op_type,
                        fused_ple_kind,
                    ) {
                        let (format, location) = derive_required_output_format(
                            &tensor_config,
                            mce,
                            tensor_config.strategy,
                            tail_node.format,
                            tail_node.output_shape,
                            tail_node.location_hint,
                        );
                        required_output_format = format;
                        best = Some(RunningBest {
                            working_nodes: working_nodes.clone(),
                            allocator: new_allocator,
                            tensor_config,
                            algorithm: chosen_algorithm,
                            required_output_format: format,
                            output_location: location,
                            tail_node: id,
                            mce_input_shape,
                        });
                        tracing::debug!(tail = id.0, strategy = ?tensor_config.strategy, "strategy search succeeded, extended running best");
                    } else {
                        tracing::trace!(tail = id.0, "strategy search failed for this extension");
                    }
                }
            }
        }

        current = graph.next_linear_node(id);
    }

    FuseResult {
        mce_ever_captured: mce_captured.is_some(),
        mce_node: mce_captured,
        last_attempted_algorithm: algorithm,
        best,
        input_producer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Algorithm;
    use crate::caps::Capabilities;
    use crate::common::{CompressionHint, WeightShape};
    use crate::graph::{
        AlgorithmHint, FuseOnlyPle, McePostProcess, PleKind, QuantInfo, ShapeMultiplier, WeightFormat,
    };

    fn default_block_configs() -> Vec<BlockConfig> {
        vec![BlockConfig::new(16, 16), BlockConfig::new(8, 8), BlockConfig::new(32, 8)]
    }

    fn mce_kind(op_type: MceOpType, weight_shape: WeightShape) -> NodeKind {
        NodeKind::MceOperation(MceOperation {
            op_type,
            weight_shape,
            weight_format: WeightFormat::Hwio,
            quant_info: QuantInfo { scale: 1.0, zero_point: 0 },
            stride: (1, 1),
            upscale: 1,
            algorithm_hint: AlgorithmHint::AllowWinograd,
        })
    }

    #[test]
    fn simple_mce_only_chain_succeeds() {
        let mut graph = Graph::new();
        let source = graph.push(|id| crate::graph::Node::new(id, Shape4D::new(1, 16, 16, 4), DataFormat::Nhwc, NodeKind::FormatConversion { target_format: DataFormat::Nhwc }));
        let mce = graph.push(|id| {
            crate::graph::Node::new(
                id,
                Shape4D::new(1, 16, 16, 4),
                DataFormat::Nhwc,
                mce_kind(MceOpType::Convolution, WeightShape::new(3, 3, 4, 4)),
            )
            .with_input(source)
        });

        let allocator = SramAllocator::new(1_000_000);
        let caps = Capabilities::default();
        let result = fuse_from(
            &graph,
            source,
            &allocator,
            &[Strategy::S0, Strategy::S1],
            &default_block_configs(),
            &caps,
            true,
        );

        assert!(result.mce_ever_captured);
        assert_eq!(result.mce_node, Some(mce));
        let best = result.best.expect("direct convolution over ample SRAM must fit");
        assert_eq!(best.tail_node, mce);
    }

    #[test]
    fn requantize_admitted_after_agnostic_ple_scenario_s6() {
        let mut graph = Graph::new();
        let mce = graph.push(|id| {
            crate::graph::Node::new(
                id,
                Shape4D::new(1, 16, 16, 4),
                DataFormat::Nhwc,
                mce_kind(MceOpType::Convolution, WeightShape::new(1, 1, 4, 4)),
            )
        });
        let ple = graph.push(|id| {
            crate::graph::Node::new(
                id,
                Shape4D::new(1, 8, 8, 4),
                DataFormat::Nhwc,
                NodeKind::FuseOnlyPle(FuseOnlyPle {
                    kind: PleKind::MaxPool2x2S2,
                    agnostic_to_requantization: true,
                    shape_multiplier: ShapeMultiplier { h: 0.5, w: 0.5, c: 1.0 },
                }),
            )
            .with_input(mce)
        });
        let requant = graph.push(|id| {
            crate::graph::Node::new(
                id,
                Shape4D::new(1, 8, 8, 4),
                DataFormat::Nhwc,
                NodeKind::Requantize(QuantInfo { scale: 2.0, zero_point: 1 }),
            )
            .with_input(ple)
        });

        let allocator = SramAllocator::new(1_000_000);
        let caps = Capabilities::default();
        let result = fuse_from(
            &graph,
            mce,
            &allocator,
            &[Strategy::S0, Strategy::S1],
            &default_block_configs(),
            &caps,
            true,
        );

        let best = result.best.expect("chain must fuse through to the requantize node");
        assert_eq!(best.tail_node, requant);
        assert!(best.working_nodes.contains(&ple));
        assert!(best.working_nodes.contains(&requant));
    }

    #[test]
    fn requantize_rejected_after_non_agnostic_ple() {
        let mut graph = Graph::new();
        let mce = graph.push(|id| {
            crate::graph::Node::new(
                id,
                Shape4D::new(1, 16, 16, 4),
                DataFormat::Nhwc,
                mce_kind(MceOpType::Convolution, WeightShape::new(1, 1, 4, 4)),
            )
        });
        let ple = graph.push(|id| {
            crate::graph::Node::new(
                id,
                Shape4D::new(1, 8, 8, 4),
                DataFormat::Nhwc,
                NodeKind::FuseOnlyPle(FuseOnlyPle {
                    kind: PleKind::Sigmoid,
                    agnostic_to_requantization: false,
                    shape_multiplier: ShapeMultiplier::IDENTITY,
                }),
            )
            .with_input(mce)
        });
        let _requant = graph.push(|id| {
            crate::graph::Node::new(
                id,
                Shape4D::new(1, 8, 8, 4),
                DataFormat::Nhwc,
                NodeKind::Requantize(QuantInfo { scale: 2.0, zero_point: 1 }),
            )
            .with_input(ple)
        });

        let allocator = SramAllocator::new(1_000_000);
        let caps = Capabilities::default();
        let result = fuse_from(
            &graph,
            mce,
            &allocator,
            &[Strategy::S0, Strategy::S1],
            &default_block_configs(),
            &caps,
            true,
        );

        let best = result.best.expect("the PLE itself must still fuse");
        assert_eq!(best.tail_node, ple, "requantize must not be admitted after a non-agnostic PLE");
    }

    #[test]
    fn post_process_blocked_once_requantize_seen() {
        let mut graph = Graph::new();
        let mce = graph.push(|id| {
            crate::graph::Node::new(
                id,
                Shape4D::new(1, 16, 16, 4),
                DataFormat::Nhwc,
                mce_kind(MceOpType::Convolution, WeightShape::new(1, 1, 4, 4)),
            )
        });
        let requant = graph.push(|id| {
            crate::graph::Node::new(
                id,
                Shape4D::new(1, 16, 16, 4),
                DataFormat::Nhwc,
                NodeKind::Requantize(QuantInfo { scale: 2.0, zero_point: 1 }),
            )
            .with_input(mce)
        });
        let _post = graph.push(|id| {
            crate::graph::Node::new(
                id,
                Shape4D::new(1, 16, 16, 4),
                DataFormat::Nhwc,
                NodeKind::McePostProcess(McePostProcess {
                    has_bias: true,
                    requant: QuantInfo { scale: 1.0, zero_point: 0 },
                }),
            )
            .with_input(requant)
        });

        let allocator = SramAllocator::new(1_000_000);
        let caps = Capabilities::default();
        let result = fuse_from(
            &graph,
            mce,
            &allocator,
            &[Strategy::S0, Strategy::S1],
            &default_block_configs(),
            &caps,
            true,
        );

        let best = result.best.expect("requantize must still fuse");
        assert_eq!(best.tail_node, requant, "McePostProcess after a Requantize is a hard stop");
    }

    #[test]
    fn allocator_exhaustion_leaves_no_running_best() {
        let mut graph = Graph::new();
        let mce = graph.push(|id| {
            crate::graph::Node::new(
                id,
                Shape4D::new(1, 16, 16, 4),
                DataFormat::Nhwc,
                mce_kind(MceOpType::Convolution, WeightShape::new(3, 3, 4, 4)),
            )
            .with_compression_hint(CompressionHint::PreferCompressed)
        });
        let allocator = SramAllocator::new(4);
        let caps = Capabilities::default();
        let result = fuse_from(
            &graph,
            mce,
            &allocator,
            &[Strategy::S0, Strategy::S1],
            &default_block_configs(),
            &caps,
            true,
        );
        assert!(result.mce_ever_captured);
        assert!(result.best.is_none());
        assert_eq!(result.last_attempted_algorithm, Some(Algorithm::Winograd));
    }
}
