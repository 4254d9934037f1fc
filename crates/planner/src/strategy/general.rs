//! Reference implementations of the non-fully-connected strategies
//! `S0, S1, S3..S7` (§3, §6).
//!
//! Only the strategy *interface* and the properties a `TrySetup` must hold
//! (purity on failure, determinism) are pinned down; the exact tiling
//! arithmetic each strategy performs is accelerator-specific and left open.
//! This module supplies a reference scheme consistent with each strategy's
//! name and with the block-config/depth-max parameters the rest of the
//! planner already derives, modeled on stripe/tile bookkeeping in a cache
//! line-fill style.

use crate::algorithm::Algorithm;
use crate::alloc::SramAllocator;
use crate::caps::Capabilities;
use crate::common::{Shape4D, WeightShape};
use crate::graph::{ShapeMultiplier, WeightFormat};

use super::{Allocation, InputResidency, Strategy, TensorConfig, TrySetup};

/// One quantised activation element occupies a single byte.
const BYTES_PER_ELEMENT: u32 = 1;

/// Reference size reserved for PLE kernel code when a fused kernel changes
/// the output shape (a non-identity [`ShapeMultiplier`] implies one is
/// fused); `0` otherwise.
const PLE_CODE_BYTES: u32 = 4096;

/// Which axis (if any) a general strategy streams along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneralKind {
    /// Whole tensor resident, single-buffered.
    Resident,
    /// Stream along the batch axis, double-buffered.
    Batch,
    /// Output resident across the pass boundary; input streamed by height.
    OutputResident,
    /// Stream along the channel axis, capped by `depth_max`.
    Channel,
    /// Stream along the width axis, one block-width stripe at a time.
    Width,
    /// Stream along the height axis, one block-height stripe at a time.
    Height,
    /// Stream along height and width jointly.
    HeightWidth,
}

/// `TrySetup` implementation shared by every non-`SFC` strategy, parameterised
/// by [`GeneralKind`].
#[derive(Debug, Clone, Copy)]
pub struct General(GeneralKind);

impl General {
    /// Builds the implementation for a non-`SFC` strategy tag.
    ///
    /// # Panics
    /// Never: every [`Strategy`] variant other than `Sfc` maps to a
    /// [`GeneralKind`]; callers route `Sfc` to [`super::StrategyFc`] instead.
    #[must_use]
    pub const fn for_tag(tag: Strategy) -> Self {
        let kind = match tag {
            Strategy::S0 => GeneralKind::Resident,
            Strategy::S1 => GeneralKind::Batch,
            Strategy::S3 => GeneralKind::OutputResident,
            Strategy::S4 => GeneralKind::Channel,
            Strategy::S5 => GeneralKind::Width,
            Strategy::S6 => GeneralKind::Height,
            Strategy::S7 => GeneralKind::HeightWidth,
            Strategy::Sfc => GeneralKind::Resident,
        };
        Self(kind)
    }
}

fn tensor_bytes(shape: Shape4D) -> u32 {
    u32::try_from(shape.element_count() * u64::from(BYTES_PER_ELEMENT)).unwrap_or(u32::MAX)
}

fn weight_bytes(shape: WeightShape, _format: WeightFormat) -> u32 {
    let elements =
        u64::from(shape.h) * u64::from(shape.w) * u64::from(shape.i) * u64::from(shape.o_or_m);
    u32::try_from(elements * u64::from(BYTES_PER_ELEMENT)).unwrap_or(u32::MAX)
}

fn stripe_shape(
    kind: GeneralKind,
    full: Shape4D,
    block_width: u32,
    block_height: u32,
    depth_max: u32,
) -> Shape4D {
    match kind {
        GeneralKind::Resident => full,
        GeneralKind::Batch => Shape4D::new(full.n.min(1), full.h, full.w, full.c),
        GeneralKind::OutputResident => Shape4D::new(full.n, block_height.min(full.h).max(1), full.w, full.c),
        GeneralKind::Channel => Shape4D::new(full.n, full.h, full.w, full.c.min(depth_max).max(1)),
        GeneralKind::Width => Shape4D::new(full.n, full.h, block_width.min(full.w).max(1), full.c),
        GeneralKind::Height => Shape4D::new(full.n, block_height.min(full.h).max(1), full.w, full.c),
        GeneralKind::HeightWidth => Shape4D::new(
            full.n,
            block_height.min(full.h).max(1),
            block_width.min(full.w).max(1),
            full.c,
        ),
    }
}

fn is_streamed(kind: GeneralKind, full: Shape4D, stripe: Shape4D) -> bool {
    match kind {
        GeneralKind::Resident => false,
        GeneralKind::OutputResident => stripe.h < full.h,
        _ => stripe != full,
    }
}

impl TrySetup for General {
    fn try_setup(
        &self,
        config: &mut TensorConfig,
        allocator: &mut SramAllocator,
        input_shape: Shape4D,
        output_shape: Shape4D,
        weight_format: WeightFormat,
        weight_shape: WeightShape,
        block_config: super::BlockConfig,
        caps: &Capabilities,
        shape_multiplier: ShapeMultiplier,
        input_residency: InputResidency,
        _algorithm: Algorithm,
        depth_max: u32,
    ) -> bool {
        let kind = self.0;

        let input_stripe = stripe_shape(kind, input_shape, block_config.width, block_config.height, depth_max);
        let output_stripe = stripe_shape(kind, output_shape, block_config.width, block_config.height, depth_max);

        let input_doubled = is_streamed(kind, input_shape, input_stripe);
        let output_doubled = if matches!(kind, GeneralKind::OutputResident) {
            false
        } else {
            input_doubled
        };

        let weights_size = weight_bytes(weight_shape, weight_format);
        let ple_size = if (shape_multiplier.h - 1.0).abs() > f32::EPSILON
            || (shape_multiplier.w - 1.0).abs() > f32::EPSILON
            || (shape_multiplier.c - 1.0).abs() > f32::EPSILON
        {
            PLE_CODE_BYTES
        } else {
            0
        };

        let weights_offset = match allocator.reserve(weights_size) {
            Some(offset) => offset,
            None => return false,
        };
        let ple_offset = match allocator.reserve(ple_size) {
            Some(offset) => offset,
            None => return false,
        };

        let input_tile_size = if input_doubled {
            tensor_bytes(input_stripe).saturating_mul(2)
        } else {
            tensor_bytes(input_stripe)
        };

        let (input_offset, input_tile_size) = if input_residency.in_sram {
            (input_residency.sram_offset.unwrap_or(0), tensor_bytes(input_stripe))
        } else {
            match allocator.reserve(input_tile_size) {
                Some(offset) => (offset, input_tile_size),
                None => return false,
            }
        };

        let output_tile_size = if output_doubled {
            tensor_bytes(output_stripe).saturating_mul(2)
        } else {
            tensor_bytes(output_stripe)
        };
        let output_offset = match allocator.reserve(output_tile_size) {
            Some(offset) => offset,
            None => return false,
        };

        config.input = Allocation {
            offset: input_offset,
            stripe_shape: input_stripe,
            tile_size: input_tile_size,
        };
        config.output = Allocation {
            offset: output_offset,
            stripe_shape: output_stripe,
            tile_size: output_tile_size,
        };
        config.weights = Allocation {
            offset: weights_offset,
            stripe_shape: WeightShapeAsShape4D::from(weight_shape).0,
            tile_size: weights_size,
        };
        config.ple_code = Allocation {
            offset: ple_offset,
            stripe_shape: Shape4D::new(1, 1, 1, 1),
            tile_size: ple_size,
        };
        let _ = caps;
        true
    }
}

/// Adapts a [`WeightShape`] to the `Shape4D` the [`Allocation`] record uses
/// so weight tiles share the same bookkeeping type as activation tiles.
struct WeightShapeAsShape4D(Shape4D);

impl From<WeightShape> for WeightShapeAsShape4D {
    fn from(w: WeightShape) -> Self {
        Self(Shape4D::new(1, w.h, w.w, w.i * w.o_or_m))
    }
}
