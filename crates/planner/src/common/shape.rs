//! Tensor shapes and the saturating integer arithmetic the planner relies on.
//!
//! All shape arithmetic in the planner is unsigned 32-bit. Stripe math can
//! legitimately hit the axis boundary (a stripe exactly covering the tensor,
//! a kernel dimension of 1) so every helper here saturates instead of
//! panicking or wrapping.

use serde::{Deserialize, Serialize};

/// A tensor shape in `[N, H, W, C]` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape4D {
    /// Batch size.
    pub n: u32,
    /// Height.
    pub h: u32,
    /// Width.
    pub w: u32,
    /// Channels.
    pub c: u32,
}

impl Shape4D {
    /// Creates a new shape.
    #[must_use]
    pub const fn new(n: u32, h: u32, w: u32, c: u32) -> Self {
        Self { n, h, w, c }
    }

    /// Total element count, saturating on overflow.
    #[must_use]
    pub fn element_count(&self) -> u64 {
        u64::from(self.n) * u64::from(self.h) * u64::from(self.w) * u64::from(self.c)
    }
}

/// Weight tensor shape in `[H, W, I, O|M]` order (`O` for `HWIO`, `M` for `HWIM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightShape {
    /// Kernel height.
    pub h: u32,
    /// Kernel width.
    pub w: u32,
    /// Input channels (or channel multiplier divisor for depthwise).
    pub i: u32,
    /// Output channels (`HWIO`) or channel multiplier (`HWIM`).
    pub o_or_m: u32,
}

impl WeightShape {
    /// Creates a new weight shape.
    #[must_use]
    pub const fn new(h: u32, w: u32, i: u32, o_or_m: u32) -> Self {
        Self { h, w, i, o_or_m }
    }
}

/// Ceiling division, saturating instead of overflowing at the integer
/// boundary (`a` close to `u32::MAX`, `b == 0`).
///
/// `DivRoundUp` per the numeric-edges note (§9): `b == 0` saturates to
/// `u32::MAX` rather than dividing by zero, since the planner never divides
/// by a statically-unknown value of zero (block/kernel/stripe dimensions are
/// always >= 1 by construction) but a defensive caller should not panic.
#[must_use]
pub fn div_round_up(a: u32, b: u32) -> u32 {
    if b == 0 {
        return u32::MAX;
    }
    let a = u64::from(a);
    let b = u64::from(b);
    let result = (a + b - 1) / b;
    u32::try_from(result).unwrap_or(u32::MAX)
}

/// Rounds `value` up to the nearest multiple of `multiple`, saturating at
/// `u32::MAX` rather than wrapping.
#[must_use]
pub fn round_up_to_multiple(value: u32, multiple: u32) -> u32 {
    if multiple == 0 {
        return value;
    }
    let value = u64::from(value);
    let multiple = u64::from(multiple);
    let result = div_round_up_u64(value, multiple) * multiple;
    u32::try_from(result).unwrap_or(u32::MAX)
}

fn div_round_up_u64(a: u64, b: u64) -> u64 {
    (a + b - 1) / b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn div_round_up_exact() {
        assert_eq!(div_round_up(9, 3), 3);
        assert_eq!(div_round_up(10, 3), 4);
    }

    #[test]
    fn div_round_up_saturates_on_zero_divisor() {
        assert_eq!(div_round_up(10, 0), u32::MAX);
    }

    #[test]
    fn round_up_to_multiple_basic() {
        assert_eq!(round_up_to_multiple(1, 3), 3);
        assert_eq!(round_up_to_multiple(3, 3), 3);
        assert_eq!(round_up_to_multiple(4, 3), 6);
    }

    #[test]
    fn round_up_to_multiple_saturates_at_boundary() {
        assert_eq!(round_up_to_multiple(u32::MAX - 1, 3), u32::MAX);
    }
}
