//! Common types shared across the planner: shapes, data formats, and errors.

/// Fatal-assertion error type and `Result` alias (§7).
pub mod error;
/// Data format, location, and compression/hint vocabulary (§3).
pub mod format;
/// Tensor shapes and saturating shape arithmetic (§9 "Numeric edges").
pub mod shape;

pub use error::{PlanError, Result};
pub use format::{CompressionHint, DataFormat, FixGraphHint, Location, LocationHint};
pub use shape::{div_round_up, round_up_to_multiple, Shape4D, WeightShape};
