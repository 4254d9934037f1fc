//! Command stream emission (§6 "Command stream"), called once per committed
//! pass.
//!
//! Command-stream encoding itself is out of scope (§1): the planner's
//! responsibility ends at handing this collaborator a fully-resolved
//! [`MclePass`] record. What *is* in scope, because the exact arithmetic is
//! pinned down (§6), is the Sigmoid PLE's activation-bounds/rescale
//! derivation, reproduced bit-for-bit here including its zero-division
//! fallback.

use crate::common::Location;
use crate::graph::PleKind;
use crate::pass_builder::PassRecord;
use crate::strategy::{Allocation, Strategy};

/// `INT16_MAX`, the fallback multiplier per §6.
const INT16_MAX: i32 = i16::MAX as i32;

/// A fixed-point rescale factor: `value ≈ multiplier / 2^shift`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rescale {
    /// Fixed-point multiplier.
    pub multiplier: i32,
    /// Right-shift applied after multiplying.
    pub shift: i32,
}

/// Inclusive activation clamp bounds in the quantised domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationBounds {
    /// Lower bound (inclusive).
    pub lower: i32,
    /// Upper bound (inclusive).
    pub upper: i32,
}

/// One hardware-issued `McePle` command, built from a committed
/// [`PassRecord`] (§6).
#[derive(Debug, Clone, PartialEq)]
pub struct MclePass {
    /// SRAM strategy tag, with `SFC` already mapped to `S1` (§6).
    pub strategy_tag: Strategy,
    /// Input allocation (stripe shape + tile size + offset).
    pub input: Allocation,
    /// Output allocation.
    pub output: Allocation,
    /// Weights allocation.
    pub weights: Allocation,
    /// Block `{w,h}`.
    pub block: (u32, u32),
    /// Output zero point.
    pub output_zero_point: i32,
    /// Where the output lives.
    pub output_location: Location,
    /// Fused PLE operation code, if any.
    pub ple_kind: Option<PleKind>,
    /// Activation bounds and rescale factor, populated only for `Sigmoid`.
    pub sigmoid: Option<(Rescale, ActivationBounds)>,
}

/// The command-stream emission interface (§6).
pub trait CommandStreamEmitter {
    /// Emits one `McePle` command for a committed pass.
    fn emit(&mut self, pass: &MclePass);
}

/// Builds the [`MclePass`] record for a committed pass.
///
/// `ple_kind` and `output_zero_point` are supplied by the caller because
/// they come from node payloads the pass builder does not retain once
/// committed (the fused PLE node and the tail node's quantisation).
#[must_use]
pub fn build_mcle_pass(
    pass: &PassRecord,
    ple_kind: Option<PleKind>,
    output_zero_point: i32,
    sigmoid_input_scale: Option<f64>,
    orig_min: i32,
    orig_max: i32,
) -> MclePass {
    let sigmoid = if ple_kind == Some(PleKind::Sigmoid) {
        sigmoid_input_scale
            .map(|scale| sigmoid_activation_bounds(scale, output_zero_point, orig_min, orig_max))
    } else {
        None
    };

    MclePass {
        strategy_tag: pass.tensor_config.strategy.emission_tag(),
        input: pass.tensor_config.input,
        output: pass.tensor_config.output,
        weights: pass.tensor_config.weights,
        block: (pass.tensor_config.block_width, pass.tensor_config.block_height),
        output_zero_point,
        output_location: pass.output_location,
        ple_kind,
        sigmoid,
    }
}

/// Derives the Sigmoid PLE's rescale factor from the input scale (§6):
/// `rescale = inScale · log2e · 256`, normalised to a 16-bit fixed-point
/// `{multiplier, shift}` pair.
#[must_use]
pub fn sigmoid_rescale(in_scale: f64) -> Rescale {
    let log2e = std::f64::consts::LOG2_E;
    let rescale = in_scale * log2e * 256.0;
    normalize_rescale(rescale)
}

/// Normalises a positive real rescale factor into a 16-bit fixed-point
/// `{multiplier, shift}` pair: `multiplier` is kept in `(INT16_MAX/2,
/// INT16_MAX]` where possible by adjusting `shift`. Non-finite or
/// non-positive input falls back to `{multiplier: INT16_MAX, shift: 0}`.
fn normalize_rescale(rescale: f64) -> Rescale {
    if !rescale.is_finite() || rescale <= 0.0 {
        return Rescale {
            multiplier: INT16_MAX,
            shift: 0,
        };
    }

    let mut shift: i32 = 0;
    let mut multiplier = (rescale * 2f64.powi(shift)).round();

    while multiplier < f64::from(INT16_MAX / 2) && shift < 30 {
        shift += 1;
        multiplier = (rescale * 2f64.powi(shift)).round();
    }
    while multiplier > f64::from(INT16_MAX) && shift > 0 {
        shift -= 1;
        multiplier = (rescale * 2f64.powi(shift)).round();
    }

    Rescale {
        multiplier: multiplier.clamp(1.0, f64::from(INT16_MAX)) as i32,
        shift,
    }
}

/// `absMax = ⌈2^(15+shift) / multiplier⌉ − 1`, floored at `1` with the
/// `{multiplier: INT16_MAX, shift: 0}` fallback when the raw result is `0`
/// (§6, §9 "must reproduce... bit-for-bit").
fn compute_abs_max(rescale: Rescale) -> (Rescale, i32) {
    let exponent = (15 + rescale.shift).clamp(0, 62);
    let numerator: i64 = 1i64 << exponent;
    let denominator = i64::from(rescale.multiplier).max(1);
    let abs_max = div_round_up_i64(numerator, denominator) - 1;

    if abs_max <= 0 {
        let fallback = Rescale {
            multiplier: INT16_MAX,
            shift: 0,
        };
        (fallback, 1)
    } else {
        (rescale, i32::try_from(abs_max).unwrap_or(i32::MAX))
    }
}

fn div_round_up_i64(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}

/// Derives the Sigmoid PLE's `{rescale, bounds}` pair from the input scale
/// (§6): bounds are clamped to `[zp - absMax, zp + absMax] ∩ [origMin,
/// origMax]`.
#[must_use]
pub fn sigmoid_activation_bounds(
    in_scale: f64,
    zero_point: i32,
    orig_min: i32,
    orig_max: i32,
) -> (Rescale, ActivationBounds) {
    let rescale = sigmoid_rescale(in_scale);
    let (rescale, abs_max) = compute_abs_max(rescale);

    let lower = (zero_point.saturating_sub(abs_max)).max(orig_min);
    let upper = (zero_point.saturating_add(abs_max)).min(orig_max);

    (rescale, ActivationBounds { lower, upper })
}

/// A reference emitter that records every pass it is asked to emit, useful
/// for integration tests (Part B §3) and for embedders that want to inspect
/// the command stream before wiring a real hardware backend.
#[derive(Debug, Clone, Default)]
pub struct RecordingEmitter {
    /// Every pass emitted so far, in emission order.
    pub emitted: Vec<MclePass>,
}

impl CommandStreamEmitter for RecordingEmitter {
    fn emit(&mut self, pass: &MclePass) {
        tracing::debug!(strategy = ?pass.strategy_tag, block = ?pass.block, "emitted McePle command");
        self.emitted.push(pass.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sfc_strategy_maps_to_s1_at_emission() {
        assert_eq!(Strategy::Sfc.emission_tag(), Strategy::S1);
        assert_eq!(Strategy::S4.emission_tag(), Strategy::S4);
    }

    #[test]
    fn zero_or_negative_scale_falls_back_to_int16_max_shift_zero() {
        let rescale = sigmoid_rescale(0.0);
        assert_eq!(rescale.shift, 0);
        assert_eq!(rescale.multiplier, INT16_MAX);

        let rescale = sigmoid_rescale(-1.0);
        assert_eq!(rescale.multiplier, INT16_MAX);
        assert_eq!(rescale.shift, 0);
    }

    #[test]
    fn abs_max_zero_triggers_documented_fallback() {
        // A multiplier of INT16_MAX with shift so negative the numerator
        // underflows to 0 forces `absMax == 0`, which must bounce back to
        // the documented fallback rather than produce an empty bound.
        let degenerate = Rescale {
            multiplier: INT16_MAX,
            shift: -15,
        };
        let (rescale, abs_max) = compute_abs_max(degenerate);
        assert_eq!(abs_max, 1);
        assert_eq!(rescale.multiplier, INT16_MAX);
        assert_eq!(rescale.shift, 0);
    }

    #[test]
    fn activation_bounds_clamp_to_original_range() {
        let (_, bounds) = sigmoid_activation_bounds(0.01, 0, -128, 127);
        assert!(bounds.lower >= -128);
        assert!(bounds.upper <= 127);
        assert!(bounds.lower <= bounds.upper);
    }

    #[test]
    fn recording_emitter_keeps_every_pass_in_order() {
        let mut emitter = RecordingEmitter::default();
        let pass = MclePass {
            strategy_tag: Strategy::S0,
            input: Allocation {
                offset: 0,
                stripe_shape: crate::common::Shape4D::new(1, 1, 1, 1),
                tile_size: 1,
            },
            output: Allocation {
                offset: 0,
                stripe_shape: crate::common::Shape4D::new(1, 1, 1, 1),
                tile_size: 1,
            },
            weights: Allocation {
                offset: 0,
                stripe_shape: crate::common::Shape4D::new(1, 1, 1, 1),
                tile_size: 1,
            },
            block: (8, 8),
            output_zero_point: 0,
            output_location: Location::Dram,
            ple_kind: None,
            sigmoid: None,
        };
        emitter.emit(&pass);
        emitter.emit(&pass);
        assert_eq!(emitter.emitted.len(), 2);
    }
}
