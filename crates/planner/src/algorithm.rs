//! Direct vs. Winograd algorithm selection (§4.3).

use crate::caps::Capabilities;
use crate::common::{div_round_up, round_up_to_multiple, WeightShape};
use crate::graph::{AlgorithmHint, MceOpType, MceOperation};

/// The chosen convolution algorithm for one MCE stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Direct convolution.
    Direct,
    /// Minimal-filtering (Winograd) convolution.
    Winograd,
}

/// Picks Direct or Winograd for `mce`, per §4.3 and invariant 4 (§8):
/// Winograd is selected only if the node allows it, Winograd is globally
/// enabled, the op is plain convolution, stride is `(1,1)`, upscale is `1`,
/// and the Winograd multiplication count is strictly less than direct's.
#[must_use]
pub fn choose_algorithm(mce: &MceOperation, caps: &Capabilities, winograd_globally_enabled: bool) -> Algorithm {
    let gated = mce.algorithm_hint == AlgorithmHint::AllowWinograd
        && winograd_globally_enabled
        && mce.op_type == MceOpType::Convolution
        && mce.stride == (1, 1)
        && mce.upscale == 1;

    if !gated {
        return Algorithm::Direct;
    }

    let (direct, winograd) = multiplication_counts(mce.weight_shape.w, mce.weight_shape.h, caps);
    if winograd < direct {
        Algorithm::Winograd
    } else {
        Algorithm::Direct
    }
}

/// Per-output-patch multiplication counts `(direct, winograd)` for a kernel
/// of size `w x h`, per §4.3.
#[must_use]
pub fn multiplication_counts(w: u32, h: u32, caps: &Capabilities) -> (u64, u64) {
    let is_1d = w == 1 || h == 1;
    let wh = u64::from(w) * u64::from(h);

    if is_1d {
        let direct = wh * u64::from(caps.winograd_output_size_2d) * u64::from(caps.winograd_output_size_1d);
        let winograd = u64::from(caps.winograd_macs_1d) * u64::from(div_round_up(
            u32::try_from(wh).unwrap_or(u32::MAX),
            caps.wide_kernel_size,
        ));
        (direct, winograd)
    } else {
        let s2 = u64::from(caps.winograd_output_size_2d);
        let direct = wh * s2 * s2;
        let winograd = u64::from(caps.winograd_macs_2d)
            * u64::from(div_round_up(w, caps.wide_kernel_size))
            * u64::from(div_round_up(h, caps.wide_kernel_size));
        (direct, winograd)
    }
}

/// The effective weight shape used for strategy selection once Winograd is
/// chosen: rounded up to a multiple of 3 on any axis whose original extent
/// is not 1 (§4.3). A no-op for [`Algorithm::Direct`].
#[must_use]
pub fn effective_weight_shape(original: WeightShape, algorithm: Algorithm) -> WeightShape {
    if algorithm == Algorithm::Direct {
        return original;
    }
    let round = |extent: u32| if extent == 1 { 1 } else { round_up_to_multiple(extent, 3) };
    WeightShape::new(round(original.h), round(original.w), original.i, original.o_or_m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::QuantInfo;
    use crate::graph::WeightFormat;

    fn mce(w: u32, h: u32, stride: (u32, u32), op_type: MceOpType) -> MceOperation {
        MceOperation {
            op_type,
            weight_shape: WeightShape::new(h, w, 1, 1),
            weight_format: WeightFormat::Hwio,
            quant_info: QuantInfo { scale: 1.0, zero_point: 0 },
            stride,
            upscale: 1,
            algorithm_hint: AlgorithmHint::AllowWinograd,
        }
    }

    /// S1: H=W=16, Hw=Ww=3, S2=2, M2=16, K=3: direct=36, winograd=16 -> Winograd.
    #[test]
    fn scenario_s1_winograd_preferred_2d() {
        let caps = Capabilities::default();
        let (direct, winograd) = multiplication_counts(3, 3, &caps);
        assert_eq!(direct, 36);
        assert_eq!(winograd, 16);
        let node = mce(3, 3, (1, 1), MceOpType::Convolution);
        assert_eq!(choose_algorithm(&node, &caps, true), Algorithm::Winograd);
        let effective = effective_weight_shape(node.weight_shape, Algorithm::Winograd);
        assert_eq!(effective, WeightShape::new(3, 3, 1, 1));
    }

    /// S2: 1-D kernel, several capability variants, always Winograd.
    #[test]
    fn scenario_s2_one_d_winograd() {
        let mut caps = Capabilities::default();
        caps.winograd_output_size_1d = 2;
        caps.winograd_output_size_2d = 2;
        caps.winograd_macs_1d = 4;
        caps.wide_kernel_size = 3;

        let (direct, winograd) = multiplication_counts(3, 1, &caps);
        assert_eq!(direct, 12);
        assert_eq!(winograd, 4);

        caps.winograd_macs_1d = 8;
        let (direct, winograd) = multiplication_counts(3, 1, &caps);
        assert_eq!(direct, 12);
        assert_eq!(winograd, 8);

        caps.winograd_macs_1d = 4;
        let (direct, winograd) = multiplication_counts(2, 1, &caps);
        assert_eq!(direct, 8);
        assert_eq!(winograd, 4);
    }

    #[test]
    fn stride_other_than_unit_forces_direct() {
        let caps = Capabilities::default();
        let node = mce(3, 3, (2, 1), MceOpType::Convolution);
        assert_eq!(choose_algorithm(&node, &caps, true), Algorithm::Direct);
    }

    #[test]
    fn depthwise_never_uses_winograd() {
        let caps = Capabilities::default();
        let node = mce(3, 3, (1, 1), MceOpType::Depthwise);
        assert_eq!(choose_algorithm(&node, &caps, true), Algorithm::Direct);
    }

    #[test]
    fn force_direct_hint_overrides_profitability() {
        let caps = Capabilities::default();
        let mut node = mce(3, 3, (1, 1), MceOpType::Convolution);
        node.algorithm_hint = AlgorithmHint::ForceDirect;
        assert_eq!(choose_algorithm(&node, &caps, true), Algorithm::Direct);
    }

    #[test]
    fn effective_weight_shape_keeps_unit_axes() {
        let shape = WeightShape::new(1, 5, 4, 8);
        let rounded = effective_weight_shape(shape, Algorithm::Winograd);
        assert_eq!(rounded, WeightShape::new(1, 6, 4, 8));
    }
}
