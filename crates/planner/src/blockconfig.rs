//! Block config filtering and ranking (§4.2).

use crate::algorithm::Algorithm;
use crate::caps::Capabilities;
use crate::common::Shape4D;
use crate::graph::{FuseOnlyPle, MceOpType, MceOperation, PleKind};

/// The spatial tile shape an MCE engine processes per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockConfig {
    /// Block width.
    pub width: u32,
    /// Block height.
    pub height: u32,
}

impl BlockConfig {
    /// Creates a block config.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    const fn area(self) -> u32 {
        self.width * self.height
    }
}

/// Filters and orders `allowed` per §4.2. Returns a possibly-empty ordered
/// sequence; emptiness is a planning failure with reason "no block config"
/// (reported by the caller, not encoded here — see invariant 5, §8).
#[must_use]
pub fn filter_and_rank(
    mce: &MceOperation,
    ple: Option<&FuseOnlyPle>,
    algorithm: Algorithm,
    allowed: &[BlockConfig],
    caps: &Capabilities,
    output_shape: Shape4D,
) -> Vec<BlockConfig> {
    let mut candidates: Vec<BlockConfig> = allowed.to_vec();

    if algorithm == Algorithm::Winograd {
        let is_winograd_2d = mce.weight_shape.h > 1 && mce.weight_shape.w > 1;
        let divisor = if is_winograd_2d { 4 } else { 2 };
        let cap = caps.total_accumulators_per_engine / divisor;
        candidates.retain(|c| c.area() <= cap);
        candidates = rank_winograd(&candidates, mce, output_shape);
    }

    apply_ple_constraints(&mut candidates, mce, ple);
    candidates
}

/// Winograd ranking (§4.2 rule 2): configs the output fits inside go first,
/// tightest (smallest area) fit first; the rest are ordered by maximum edge
/// partial-block remainder, tie-broken toward the longer kernel axis.
fn rank_winograd(candidates: &[BlockConfig], mce: &MceOperation, output_shape: Shape4D) -> Vec<BlockConfig> {
    let (fits, remainder): (Vec<BlockConfig>, Vec<BlockConfig>) = candidates
        .iter()
        .copied()
        .partition(|c| output_shape.h <= c.height && output_shape.w <= c.width);

    let mut fits = fits;
    fits.sort_by_key(|c| c.area());

    let taller_kernel_axis_is_h = mce.weight_shape.h >= mce.weight_shape.w;
    let mut remainder = remainder;
    remainder.sort_by(|a, b| {
        let score_a = output_shape.h % a.height + output_shape.w % a.width;
        let score_b = output_shape.h % b.height + output_shape.w % b.width;
        // Maximize remainder score first.
        score_b.cmp(&score_a).then_with(|| {
            // Tie-break toward the longer kernel axis.
            let axis_a = if taller_kernel_axis_is_h { a.height } else { a.width };
            let axis_b = if taller_kernel_axis_is_h { b.height } else { b.width };
            axis_b.cmp(&axis_a)
        })
    });

    fits.into_iter().chain(remainder).collect()
}

/// PLE-specific allow-lists and forced configs (§4.2 rule 3), intersected
/// with whatever ordering precedes this call.
fn apply_ple_constraints(candidates: &mut Vec<BlockConfig>, mce: &MceOperation, ple: Option<&FuseOnlyPle>) {
    if mce.op_type == MceOpType::FullyConnected {
        force(candidates, BlockConfig::new(8, 8));
    }

    if let Some(ple) = ple {
        match ple.kind {
            PleKind::Interleave2x2S2 => force(candidates, BlockConfig::new(16, 16)),
            PleKind::MaxPool2x2S2 => keep_only(
                candidates,
                &[BlockConfig::new(16, 16), BlockConfig::new(32, 8), BlockConfig::new(8, 8)],
            ),
            PleKind::MeanXY8x8 => force(candidates, BlockConfig::new(8, 8)),
            PleKind::MaxPool3x3S2 => {
                keep_only(candidates, &[BlockConfig::new(32, 8), BlockConfig::new(8, 8)]);
            }
            PleKind::Sigmoid => {}
        }
    }
}

fn force(candidates: &mut Vec<BlockConfig>, only: BlockConfig) {
    candidates.retain(|c| *c == only);
}

fn keep_only(candidates: &mut Vec<BlockConfig>, allow: &[BlockConfig]) {
    candidates.retain(|c| allow.contains(c));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AlgorithmHint, QuantInfo, ShapeMultiplier, WeightFormat};
    use crate::common::WeightShape;

    fn mce(op_type: MceOpType, weight_shape: WeightShape) -> MceOperation {
        MceOperation {
            op_type,
            weight_shape,
            weight_format: WeightFormat::Hwio,
            quant_info: QuantInfo { scale: 1.0, zero_point: 0 },
            stride: (1, 1),
            upscale: 1,
            algorithm_hint: AlgorithmHint::AllowWinograd,
        }
    }

    fn ple(kind: PleKind) -> FuseOnlyPle {
        FuseOnlyPle {
            kind,
            agnostic_to_requantization: true,
            shape_multiplier: ShapeMultiplier::IDENTITY,
        }
    }

    /// S3: Fully connected forces {8,8}.
    #[test]
    fn scenario_s3_fc_forces_8x8() {
        let caps = Capabilities::default();
        let mce = mce(MceOpType::FullyConnected, WeightShape::new(1, 1, 4, 4));
        let allowed = [BlockConfig::new(8, 8), BlockConfig::new(16, 16), BlockConfig::new(32, 8)];
        let result = filter_and_rank(&mce, None, Algorithm::Direct, &allowed, &caps, Shape4D::new(1, 1, 1, 4));
        assert_eq!(result, vec![BlockConfig::new(8, 8)]);
    }

    #[test]
    fn maxpool_3x3_s2_keeps_only_two_configs() {
        let caps = Capabilities::default();
        let mce = mce(MceOpType::Convolution, WeightShape::new(3, 3, 4, 4));
        let allowed = [
            BlockConfig::new(8, 8),
            BlockConfig::new(16, 16),
            BlockConfig::new(32, 8),
        ];
        let ple = ple(PleKind::MaxPool3x3S2);
        let result = filter_and_rank(&mce, Some(&ple), Algorithm::Direct, &allowed, &caps, Shape4D::new(1, 16, 16, 4));
        assert_eq!(result.len(), 2);
        assert!(result.contains(&BlockConfig::new(32, 8)));
        assert!(result.contains(&BlockConfig::new(8, 8)));
        assert!(!result.contains(&BlockConfig::new(16, 16)));
    }

    #[test]
    fn winograd_cap_drops_oversized_blocks() {
        let mut caps = Capabilities::default();
        caps.total_accumulators_per_engine = 32;
        let mce = mce(MceOpType::Convolution, WeightShape::new(3, 3, 4, 4));
        let allowed = [BlockConfig::new(8, 8), BlockConfig::new(32, 32)];
        // 2D winograd cap = 32/4 = 8; 32x32 (area 1024) and 8x8 (area 64) both exceed
        // the cap of 8, so neither survives -- only configs with area <= 8 would.
        let small_allowed = [BlockConfig::new(2, 2), BlockConfig::new(32, 32)];
        let result = filter_and_rank(&mce, None, Algorithm::Winograd, &small_allowed, &caps, Shape4D::new(1, 16, 16, 4));
        assert_eq!(result, vec![BlockConfig::new(2, 2)]);
        let _ = allowed;
    }

    #[test]
    fn winograd_ranking_prefers_tight_fit_first() {
        let caps = Capabilities::default();
        let mce = mce(MceOpType::Convolution, WeightShape::new(3, 3, 4, 4));
        let allowed = [BlockConfig::new(32, 32), BlockConfig::new(16, 16)];
        // Output 8x8 fits inside both; smaller area (16x16=256) wins over 32x32=1024.
        let result = filter_and_rank(&mce, None, Algorithm::Winograd, &allowed, &caps, Shape4D::new(1, 8, 8, 4));
        assert_eq!(result[0], BlockConfig::new(16, 16));
    }
}
