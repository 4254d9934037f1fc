//! Data format, location and compression vocabulary shared by every node.

use serde::{Deserialize, Serialize};

/// On-chip/off-chip tensor data format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataFormat {
    /// Plain row-major `[N,H,W,C]`.
    Nhwc,
    /// Brick-group-packed format required when OFM stripes are non-contiguous.
    Nhwcb,
}

/// Where a tensor currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    /// Off-chip DRAM.
    Dram,
    /// On-chip SRAM.
    Sram,
    /// Not yet assigned (initial state of every node).
    Unassigned,
}

/// A node's preference for whether its output is stored compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionHint {
    /// Compress the output if the pass builder's conditions allow it.
    PreferCompressed,
    /// Never compress this node's output.
    RequiredUncompressed,
}

/// A node's preference for where its output must end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationHint {
    /// Output must land in DRAM; blocks the `S3`-keep-in-SRAM shortcut (§4.5).
    RequireDram,
}

/// A mutable request the pass builder installs on a node to reshape the
/// graph before the next planning attempt (§4.6). Exactly one hint is
/// installed per failed attempt, and a hint once set is only replaced by a
/// strictly stronger constraint within the same compile (§5, invariant 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixGraphHint {
    /// Re-emit this node's output in the given format.
    ConvertOutputTo(DataFormat),
    /// Force this node's output to live in DRAM.
    ForceLocationDram,
    /// Force this node's output to be stored uncompressed.
    ForceUncompressed,
    /// Force the MCE node this hint is attached to use the direct algorithm.
    AlgorithmDirect,
}
