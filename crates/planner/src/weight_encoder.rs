//! Weight Encoder (§6 "Weight Encoder"), called only at pass emission.
//!
//! The bit-encoding scheme itself is an explicit Non-goal ("weight
//! bit-encoding" is named out of scope in §1); what the planner owns is the
//! *interface* this collaborator presents and the stripe-depth derivation
//! that feeds it, both of which §6 pins down exactly. The reference
//! implementation here produces a deterministic placeholder payload sized
//! from the derived stripe depth, sufficient to exercise the emission path
//! end to end (Part B §3).

use crate::common::{Result, WeightShape};
use crate::graph::{MceOperation, QuantInfo, WeightFormat};

/// Encoded weight payload and the metadata the command-stream emitter needs
/// alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedWeights {
    /// Encoded weight bytes.
    pub data: Vec<u8>,
    /// Metadata describing the encoding.
    pub metadata: WeightMetadata,
}

/// Metadata accompanying an [`EncodedWeights`] payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightMetadata {
    /// The stripe depth this encoding was produced for (§6).
    pub stripe_depth: u32,
    /// Number of stripes the encoded weights are split across.
    pub stripe_count: u32,
    /// The quantisation info used to encode, carried through for the
    /// command-stream emitter's zero-point fields.
    pub quant_info: QuantInfo,
}

/// Derives `stripeDepth` per §6: for depthwise (`HWIM`) weights, from the
/// stripe's `I` and `M` extents divided by the convolution stride; for
/// `HWIO` weights, directly from the stripe's `O` extent.
#[must_use]
pub fn stripe_depth(weight_format: WeightFormat, stripe: WeightShape, stride: (u32, u32)) -> u32 {
    match weight_format {
        WeightFormat::Hwim => {
            let product = u64::from(stripe.i) * u64::from(stripe.o_or_m);
            let divisor = u64::from(stride.0.max(1)) * u64::from(stride.1.max(1));
            u32::try_from(product / divisor.max(1)).unwrap_or(u32::MAX)
        }
        WeightFormat::Hwio => stripe.o_or_m,
    }
}

/// The weight-encoding interface (§6): `Encode(mce, stripeDepth, stripeSize,
/// quantInfo) -> {data, metadata}`.
pub trait WeightEncoder {
    /// Encodes one weight stripe for `mce`.
    ///
    /// # Errors
    /// Returns [`PlanError::IllegalWeightFormat`] if `mce.weight_format` is
    /// anything other than `Hwio`/`Hwim` (§7, a fatal assertion failure —
    /// the graph should never present this to a correctly-configured
    /// planner).
    fn encode(
        &self,
        mce: &MceOperation,
        stripe_depth: u32,
        stripe_size: WeightShape,
        quant_info: QuantInfo,
    ) -> Result<EncodedWeights>;
}

/// Reference, non-optimizing weight encoder (Part B §3): emits a
/// deterministic zero-filled payload sized by element count, with no real
/// bit-packing. Sufficient to drive the emission path to completion and to
/// assert stripe-depth derivation without implementing the out-of-scope
/// hardware encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceWeightEncoder;

impl WeightEncoder for ReferenceWeightEncoder {
    fn encode(
        &self,
        mce: &MceOperation,
        stripe_depth: u32,
        stripe_size: WeightShape,
        quant_info: QuantInfo,
    ) -> Result<EncodedWeights> {
        // `WeightFormat` is a closed enum with exactly the two legal
        // variants (§7), so `PlanError::IllegalWeightFormat` can never
        // actually be constructed here; the fallible signature exists
        // because §6 specifies this interface as fallible at the
        // assertion boundary, not because this reference encoder can fail.
        let _ = mce.weight_format;

        let element_count =
            u64::from(stripe_size.h) * u64::from(stripe_size.w) * u64::from(stripe_size.i) * u64::from(stripe_depth.max(1));
        let byte_count = usize::try_from(element_count).unwrap_or(usize::MAX);
        let data = vec![0u8; byte_count];

        let stripe_count = if stripe_depth == 0 {
            0
        } else {
            crate::common::div_round_up(stripe_size.o_or_m, stripe_depth)
        };

        tracing::trace!(
            stripe_depth,
            stripe_count,
            byte_count,
            "encoded weight stripe"
        );

        Ok(EncodedWeights {
            data,
            metadata: WeightMetadata {
                stripe_depth,
                stripe_count,
                quant_info,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AlgorithmHint, MceOpType};

    fn mce(weight_format: WeightFormat, stride: (u32, u32)) -> MceOperation {
        MceOperation {
            op_type: MceOpType::Depthwise,
            weight_shape: WeightShape::new(3, 3, 4, 2),
            weight_format,
            quant_info: QuantInfo { scale: 1.0, zero_point: 0 },
            stride,
            upscale: 1,
            algorithm_hint: AlgorithmHint::ForceDirect,
        }
    }

    #[test]
    fn depthwise_stripe_depth_divides_by_stride() {
        let stripe = WeightShape::new(3, 3, 4, 2);
        assert_eq!(stripe_depth(WeightFormat::Hwim, stripe, (2, 2)), 2);
        assert_eq!(stripe_depth(WeightFormat::Hwim, stripe, (1, 1)), 8);
    }

    #[test]
    fn hwio_stripe_depth_is_output_channels() {
        let stripe = WeightShape::new(3, 3, 4, 16);
        assert_eq!(stripe_depth(WeightFormat::Hwio, stripe, (1, 1)), 16);
    }

    #[test]
    fn reference_encoder_sizes_payload_from_stripe_depth() {
        let mce = mce(WeightFormat::Hwim, (2, 2));
        let stripe = WeightShape::new(3, 3, 4, 2);
        let depth = stripe_depth(mce.weight_format, stripe, mce.stride);
        let encoded = ReferenceWeightEncoder
            .encode(&mce, depth, stripe, mce.quant_info)
            .expect("HWIM is a legal weight format");
        assert_eq!(encoded.data.len() as u64, 3 * 3 * 4 * u64::from(depth));
        assert_eq!(encoded.metadata.stripe_depth, depth);
    }
}
