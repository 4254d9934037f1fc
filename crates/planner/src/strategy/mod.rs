//! Tiling/streaming strategies and the strategy selector (§4.4, §6).
//!
//! Strategies are expressed as an enumerated set sharing one `TrySetup`
//! operation (§9 "Strategy objects"), using the same static-dispatch-by-enum
//! shape as a branch-predictor wrapper: one enum, one inherent dispatch
//! method, no trait objects.

mod general;
mod fc;

use serde::{Deserialize, Serialize};

use crate::alloc::SramAllocator;
use crate::algorithm::Algorithm;
use crate::caps::Capabilities;
use crate::common::Shape4D;
use crate::graph::{MceOpType, PleKind, ShapeMultiplier, WeightFormat};
use crate::common::WeightShape;
use crate::blockconfig::BlockConfig;

pub use fc::StrategyFc;
pub use general::{General, GeneralKind};

/// A named SRAM tiling/streaming scheme (§3, §6).
///
/// `S2` is intentionally absent from the allowed set, matching the data
/// model's `strategy ∈ {S0,S1,S3,S4,S5,S6,S7,SFC}` exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Whole tensor resident in SRAM, single-buffered.
    S0,
    /// Double-buffered streaming along the batch axis.
    S1,
    /// Output stays resident in SRAM across the pass boundary when possible.
    S3,
    /// Streaming along the channel axis.
    S4,
    /// Streaming along the width axis.
    S5,
    /// Streaming along the height axis.
    S6,
    /// Streaming along height and width jointly.
    S7,
    /// Dedicated fully-connected strategy.
    Sfc,
}

impl Strategy {
    /// Maps `SFC` to `S1` for command-stream emission, which has no
    /// dedicated tag for the fully-connected strategy family (§6).
    #[must_use]
    pub const fn emission_tag(self) -> Self {
        match self {
            Self::Sfc => Self::S1,
            other => other,
        }
    }
}

/// One of the four SRAM allocations a pass requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Offset within the SRAM region.
    pub offset: u32,
    /// Stripe shape resident at any one time.
    pub stripe_shape: Shape4D,
    /// Total bytes reserved for this tile (may ring-buffer multiple stripes).
    pub tile_size: u32,
}

impl Allocation {
    const EMPTY: Self = Self {
        offset: 0,
        stripe_shape: Shape4D::new(0, 0, 0, 0),
        tile_size: 0,
    };
}

/// The per-pass plan produced by a successful strategy (§3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TensorConfig {
    /// Chosen strategy.
    pub strategy: Strategy,
    /// Chosen block width.
    pub block_width: u32,
    /// Chosen block height.
    pub block_height: u32,
    /// Input allocation.
    pub input: Allocation,
    /// Output allocation.
    pub output: Allocation,
    /// Weights allocation.
    pub weights: Allocation,
    /// PLE code allocation.
    pub ple_code: Allocation,
}

impl TensorConfig {
    /// A placeholder config overwritten by a successful `TrySetup`.
    pub const EMPTY: Self = Self {
        strategy: Strategy::S0,
        block_width: 0,
        block_height: 0,
        input: Allocation::EMPTY,
        output: Allocation::EMPTY,
        weights: Allocation::EMPTY,
        ple_code: Allocation::EMPTY,
    };
}

/// Whether the MCE's primary input is already SRAM-resident, and at which
/// offset, per the `(inputInSram, inputSramOffset)` pair in §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputResidency {
    /// Whether the input is already in SRAM.
    pub in_sram: bool,
    /// The input's SRAM offset, if `in_sram`.
    pub sram_offset: Option<u32>,
}

/// The strategy interface (§6): attempts to lay the pass out in SRAM.
///
/// Implementations MUST be pure on failure: the allocator passed in must be
/// byte-identical after a `false` return (invariant 1, §8). Every
/// implementation here achieves this by probing a private clone and only
/// writing back on success.
#[allow(clippy::too_many_arguments)]
pub trait TrySetup {
    /// Attempts to set up `config` for the given shapes/format/block config.
    /// Mutates `allocator` and `config` only on success.
    fn try_setup(
        &self,
        config: &mut TensorConfig,
        allocator: &mut SramAllocator,
        input_shape: Shape4D,
        output_shape: Shape4D,
        weight_format: WeightFormat,
        weight_shape: WeightShape,
        block_config: BlockConfig,
        caps: &Capabilities,
        shape_multiplier: ShapeMultiplier,
        input_residency: InputResidency,
        algorithm: Algorithm,
        depth_max: u32,
    ) -> bool;
}

/// Enum wrapper providing static dispatch across the strategy family,
/// mirroring the enum-dispatch branch-predictor-wrapper pattern.
#[derive(Debug, Clone, Copy)]
pub enum StrategyImpl {
    /// General (non-FC) strategies `S0,S1,S3..S7`.
    General(General),
    /// The dedicated fully-connected strategy.
    Fc(StrategyFc),
}

impl StrategyImpl {
    /// Builds the implementation for a given strategy tag.
    #[must_use]
    pub const fn for_tag(tag: Strategy) -> Self {
        match tag {
            Strategy::Sfc => Self::Fc(StrategyFc),
            other => Self::General(General::for_tag(other)),
        }
    }
}

impl TrySetup for StrategyImpl {
    fn try_setup(
        &self,
        config: &mut TensorConfig,
        allocator: &mut SramAllocator,
        input_shape: Shape4D,
        output_shape: Shape4D,
        weight_format: WeightFormat,
        weight_shape: WeightShape,
        block_config: BlockConfig,
        caps: &Capabilities,
        shape_multiplier: ShapeMultiplier,
        input_residency: InputResidency,
        algorithm: Algorithm,
        depth_max: u32,
    ) -> bool {
        match self {
            Self::General(g) => g.try_setup(
                config,
                allocator,
                input_shape,
                output_shape,
                weight_format,
                weight_shape,
                block_config,
                caps,
                shape_multiplier,
                input_residency,
                algorithm,
                depth_max,
            ),
            Self::Fc(fc) => fc.try_setup(
                config,
                allocator,
                input_shape,
                output_shape,
                weight_format,
                weight_shape,
                block_config,
                caps,
                shape_multiplier,
                input_residency,
                algorithm,
                depth_max,
            ),
        }
    }
}

/// `depthMax` per §4.4: capped only when the fused PLE is `MaxPool3x3S2`.
#[must_use]
pub fn compute_depth_max(caps: &Capabilities, is_depthwise: bool, fused_ple: Option<PleKind>) -> u32 {
    if fused_ple == Some(PleKind::MaxPool3x3S2) {
        if is_depthwise {
            caps.number_of_srams
        } else {
            caps.number_of_ofm
        }
    } else {
        u32::MAX
    }
}

/// Tries `(strategy, block config)` pairs in the order supplied (§4.4, §5
/// ordering guarantee (c)); the first success wins.
///
/// Fully connected MCEs use the dedicated `SFC` family in place of
/// `allowed_strategies` (§4.4 "Fully-connected MCE uses a dedicated
/// strategy family").
#[allow(clippy::too_many_arguments)]
pub fn select(
    caps: &Capabilities,
    allocator: &SramAllocator,
    allowed_strategies: &[Strategy],
    block_configs: &[BlockConfig],
    input_shape: Shape4D,
    output_shape: Shape4D,
    weight_format: WeightFormat,
    weight_shape: WeightShape,
    shape_multiplier: ShapeMultiplier,
    input_residency: InputResidency,
    algorithm: Algorithm,
    op_type: MceOpType,
    fused_ple: Option<PleKind>,
) -> Option<(TensorConfig, SramAllocator)> {
    let is_fc = op_type == MceOpType::FullyConnected;
    let is_depthwise = op_type == MceOpType::Depthwise;
    let depth_max = compute_depth_max(caps, is_depthwise, fused_ple);

    let strategies: Vec<Strategy> = if is_fc {
        vec![Strategy::Sfc]
    } else {
        allowed_strategies.to_vec()
    };

    for strategy in &strategies {
        let implementation = StrategyImpl::for_tag(*strategy);
        for block_config in block_configs {
            let mut probe_allocator = allocator.clone();
            let mut config = TensorConfig::EMPTY;
            let ok = implementation.try_setup(
                &mut config,
                &mut probe_allocator,
                input_shape,
                output_shape,
                weight_format,
                weight_shape,
                *block_config,
                caps,
                shape_multiplier,
                input_residency,
                algorithm,
                depth_max,
            );
            if ok {
                config.strategy = *strategy;
                config.block_width = block_config.width;
                config.block_height = block_config.height;
                return Some((config, probe_allocator));
            }
        }
    }
    None
}
