//! Node types (§3 "Node").
//!
//! The source classifies nodes with runtime type tests; we reimplement that
//! as a tagged variant with a shared header (`NodeCommon`) and an explicit
//! kind tag, per §9 "Polymorphic nodes". The admission table in §4.5 becomes
//! a `match` over [`NodeKind`].

use serde::{Deserialize, Serialize};

use crate::common::{CompressionHint, DataFormat, FixGraphHint, Location, LocationHint, Shape4D, WeightShape};

/// Identifies a node within a [`crate::graph::Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Identifies a committed pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassId(pub u32);

/// A single input edge: the producing node and which of its outputs feeds us.
///
/// Every node currently has exactly one output (§3 invariant), so
/// `source_output_index` is always `0` today; it is kept because the data
/// model is defined in terms of possibly-multi-output supertensors that
/// `ExtractSubtensor` carves regions out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// The node this edge's data comes from.
    pub source: NodeId,
    /// Which of the source's outputs this edge reads.
    pub source_output_index: u32,
}

/// Convolution / depthwise / fully-connected operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MceOpType {
    /// Plain convolution — the only op type eligible for Winograd.
    Convolution,
    /// Depthwise convolution.
    Depthwise,
    /// Fully connected (matrix-vector product); always uses the `SFC` strategy family.
    FullyConnected,
}

/// Weight tensor data format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightFormat {
    /// `[H,W,I,O]` — regular convolution / fully-connected weights.
    Hwio,
    /// `[H,W,I,M]` — depthwise weights with a channel multiplier.
    Hwim,
}

/// Scale/zero-point quantisation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantInfo {
    /// Dequantisation scale.
    pub scale: f64,
    /// Zero point in the quantised domain.
    pub zero_point: i32,
}

/// Programmable Layer Engine kernel identity (§3 `FuseOnlyPleOperation`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PleKind {
    /// 2x2 stride-2 max pool.
    MaxPool2x2S2,
    /// 2x2 stride-2 interleave.
    Interleave2x2S2,
    /// 8x8 mean over X/Y.
    MeanXY8x8,
    /// 3x3 stride-2 max pool.
    MaxPool3x3S2,
    /// Sigmoid activation.
    Sigmoid,
}

/// The `H,W,C` multiplier the fused PLE kernel applies to the MCE's raw
/// output shape (e.g. a 2x2 stride-2 pool halves `H` and `W`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeMultiplier {
    /// Height multiplier.
    pub h: f32,
    /// Width multiplier.
    pub w: f32,
    /// Channel multiplier.
    pub c: f32,
}

impl ShapeMultiplier {
    /// No-op multiplier (`1x1x1`).
    pub const IDENTITY: Self = Self { h: 1.0, w: 1.0, c: 1.0 };
}

/// Convolution algorithm hint an `MceOperation` node carries; narrowed to
/// [`crate::algorithm::Algorithm::Direct`]-only by the `AlgorithmDirect`
/// fix-graph hint (§4.6 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlgorithmHint {
    /// Winograd is allowed if otherwise profitable.
    AllowWinograd,
    /// Winograd is disallowed; always use the direct algorithm.
    ForceDirect,
}

/// An MCE (convolution / depthwise / fully-connected) node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MceOperation {
    /// Convolution, depthwise, or fully connected.
    pub op_type: MceOpType,
    /// Weight tensor shape `[H,W,I,O|M]`.
    pub weight_shape: WeightShape,
    /// Weight tensor data format.
    pub weight_format: WeightFormat,
    /// Weight quantisation info.
    pub quant_info: QuantInfo,
    /// Convolution stride `(x, y)`.
    pub stride: (u32, u32),
    /// Input upscale factor (1 = no upscaling).
    pub upscale: u32,
    /// Whether Winograd is allowed for this node.
    pub algorithm_hint: AlgorithmHint,
}

/// A PLE kernel fused directly onto an MCE stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuseOnlyPle {
    /// Which PLE kernel.
    pub kind: PleKind,
    /// Whether this kernel's output is correct regardless of a later
    /// requantisation (governs admission of a trailing `Requantize`, §4.5).
    pub agnostic_to_requantization: bool,
    /// Shape multiplier this kernel applies to the MCE's raw output.
    pub shape_multiplier: ShapeMultiplier,
}

/// Bias / activation / requantisation folded into the MCE stage itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct McePostProcess {
    /// Whether a bias is applied.
    pub has_bias: bool,
    /// Output requantisation applied by this post-process stage.
    pub requant: QuantInfo,
}

/// The capability-specific payload of a node, tagged by [`NodeKind`]'s
/// discriminant (§9 "Polymorphic nodes" — a sum type replacing runtime type
/// tests).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Changes data format only.
    FormatConversion {
        /// The format this node converts its input to.
        target_format: DataFormat,
    },
    /// Carves a sub-region of a supertensor.
    ExtractSubtensor {
        /// Offset of the extracted region within the supertensor.
        offset: Shape4D,
    },
    /// Convolution / depthwise / fully connected.
    MceOperation(MceOperation),
    /// Bias, activation, requantisation folded into the MCE stage.
    McePostProcess(McePostProcess),
    /// A PLE kernel that must be fused with an MCE.
    FuseOnlyPle(FuseOnlyPle),
    /// Scale/zero-point change.
    Requantize(QuantInfo),
}

impl NodeKind {
    /// A short, stable name for diagnostics and error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::FormatConversion { .. } => "FormatConversion",
            Self::ExtractSubtensor { .. } => "ExtractSubtensor",
            Self::MceOperation(_) => "MceOperation",
            Self::McePostProcess(_) => "McePostProcess",
            Self::FuseOnlyPle(_) => "FuseOnlyPle",
            Self::Requantize(_) => "Requantize",
        }
    }
}

/// A vertex in the tensor-producing graph (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// This node's identity.
    pub id: NodeId,
    /// Output tensor shape.
    pub output_shape: Shape4D,
    /// Input edges.
    pub inputs: Vec<Edge>,
    /// Current data format.
    pub format: DataFormat,
    /// Current location.
    pub location: Location,
    /// Whether the output is currently stored compressed.
    pub compressed: bool,
    /// Compression preference, if any.
    pub compression_hint: Option<CompressionHint>,
    /// Location preference, if any.
    pub location_hint: Option<LocationHint>,
    /// Mutable fix-graph request installed by the pass builder (§4.6).
    pub fix_graph_hint: Option<FixGraphHint>,
    /// The pass that claimed this node, once committed.
    pub owning_pass: Option<PassId>,
    /// SRAM offset of this node's output, stamped by the pass builder when
    /// `location == Sram` (§4.6 "stamp the tail node with output SRAM
    /// offset"). `None` until a committing pass assigns it.
    pub output_sram_offset: Option<u32>,
    /// Capability-specific payload.
    pub kind: NodeKind,
}

impl Node {
    /// Creates a node with no inputs and every optional field unset.
    #[must_use]
    pub fn new(id: NodeId, output_shape: Shape4D, format: DataFormat, kind: NodeKind) -> Self {
        Self {
            id,
            output_shape,
            inputs: Vec::new(),
            format,
            location: Location::Unassigned,
            compressed: false,
            compression_hint: None,
            location_hint: None,
            fix_graph_hint: None,
            owning_pass: None,
            output_sram_offset: None,
            kind,
        }
    }

    /// Adds an input edge fluently.
    #[must_use]
    pub fn with_input(mut self, source: NodeId) -> Self {
        self.inputs.push(Edge {
            source,
            source_output_index: 0,
        });
        self
    }

    /// Sets the location fluently.
    #[must_use]
    pub const fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Sets the compression flag fluently.
    #[must_use]
    pub const fn with_compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    /// Sets the compression hint fluently.
    #[must_use]
    pub const fn with_compression_hint(mut self, hint: CompressionHint) -> Self {
        self.compression_hint = Some(hint);
        self
    }

    /// Returns the contained [`MceOperation`], if this node is one.
    #[must_use]
    pub const fn as_mce(&self) -> Option<&MceOperation> {
        match &self.kind {
            NodeKind::MceOperation(mce) => Some(mce),
            _ => None,
        }
    }

    /// Returns the contained [`MceOperation`] mutably, if this node is one.
    pub fn as_mce_mut(&mut self) -> Option<&mut MceOperation> {
        match &mut self.kind {
            NodeKind::MceOperation(mce) => Some(mce),
            _ => None,
        }
    }

    /// Returns the contained [`FuseOnlyPle`], if this node is one.
    #[must_use]
    pub const fn as_fuse_only_ple(&self) -> Option<&FuseOnlyPle> {
        match &self.kind {
            NodeKind::FuseOnlyPle(ple) => Some(ple),
            _ => None,
        }
    }
}
