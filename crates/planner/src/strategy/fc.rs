//! The dedicated fully-connected strategy family (`SFC`, §4.4).
//!
//! A fully connected MCE is always 1x1 spatially, so there is nothing to
//! stream along height or width; `SFC` streams the weight matrix's input
//! dimension instead, double-buffered, while input and output stay
//! resident.

use crate::algorithm::Algorithm;
use crate::alloc::SramAllocator;
use crate::caps::Capabilities;
use crate::common::{Shape4D, WeightShape};
use crate::graph::{ShapeMultiplier, WeightFormat};

use super::{Allocation, BlockConfig, InputResidency, TensorConfig, TrySetup};

const BYTES_PER_ELEMENT: u32 = 1;

fn tensor_bytes(shape: Shape4D) -> u32 {
    u32::try_from(shape.element_count() * u64::from(BYTES_PER_ELEMENT)).unwrap_or(u32::MAX)
}

/// `TrySetup` implementation for the `SFC` strategy.
#[derive(Debug, Clone, Copy)]
pub struct StrategyFc;

impl TrySetup for StrategyFc {
    fn try_setup(
        &self,
        config: &mut TensorConfig,
        allocator: &mut SramAllocator,
        input_shape: Shape4D,
        output_shape: Shape4D,
        weight_format: WeightFormat,
        weight_shape: WeightShape,
        block_config: BlockConfig,
        _caps: &Capabilities,
        _shape_multiplier: ShapeMultiplier,
        input_residency: InputResidency,
        _algorithm: Algorithm,
        _depth_max: u32,
    ) -> bool {
        let stripe_i = weight_shape.i.min(block_config.width.max(1));
        let weight_stripe = WeightShape::new(weight_shape.h, weight_shape.w, stripe_i, weight_shape.o_or_m);
        let weight_stripe_elements =
            u64::from(weight_stripe.h) * u64::from(weight_stripe.w) * u64::from(weight_stripe.i) * u64::from(weight_stripe.o_or_m);
        let weight_stripe_size = u32::try_from(weight_stripe_elements * u64::from(BYTES_PER_ELEMENT)).unwrap_or(u32::MAX);
        let weight_streamed = stripe_i < weight_shape.i;
        let weight_tile_size = if weight_streamed {
            weight_stripe_size.saturating_mul(2)
        } else {
            weight_stripe_size
        };

        let weights_offset = match allocator.reserve(weight_tile_size) {
            Some(offset) => offset,
            None => return false,
        };

        let (input_offset, input_tile_size) = if input_residency.in_sram {
            (input_residency.sram_offset.unwrap_or(0), tensor_bytes(input_shape))
        } else {
            let size = tensor_bytes(input_shape);
            match allocator.reserve(size) {
                Some(offset) => (offset, size),
                None => return false,
            }
        };

        let output_size = tensor_bytes(output_shape);
        let output_offset = match allocator.reserve(output_size) {
            Some(offset) => offset,
            None => return false,
        };

        config.input = Allocation {
            offset: input_offset,
            stripe_shape: input_shape,
            tile_size: input_tile_size,
        };
        config.output = Allocation {
            offset: output_offset,
            stripe_shape: output_shape,
            tile_size: output_size,
        };
        config.weights = Allocation {
            offset: weights_offset,
            stripe_shape: Shape4D::new(1, weight_stripe.h, weight_stripe.w, weight_stripe.i * weight_stripe.o_or_m),
            tile_size: weight_tile_size,
        };
        config.ple_code = Allocation {
            offset: 0,
            stripe_shape: Shape4D::new(1, 1, 1, 1),
            tile_size: 0,
        };
        let _ = weight_format;
        true
    }
}
