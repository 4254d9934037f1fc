//! Accelerator capability constants (§6 "External Interfaces — Capabilities").
//!
//! `Capabilities` is a read-only value describing one hardware SKU:
//! deserializable so a caller can load a profile per target accelerator,
//! with a [`Default`] profile for tests.

use serde::{Deserialize, Serialize};

/// Capability constants for one accelerator configuration.
///
/// Field names track the external-interface names used by §4.2-§4.4 so the
/// component design sections can be cross-referenced without translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Number of MCE engines.
    pub number_of_engines: u32,
    /// Number of output-feature-map lanes.
    pub number_of_ofm: u32,
    /// Number of SRAM banks.
    pub number_of_srams: u32,
    /// Input-feature-map lanes per engine.
    pub ifm_per_engine: u32,
    /// Output-feature-map lanes per engine.
    pub ofm_per_engine: u32,
    /// MAC units per engine.
    pub mac_units_per_engine: u32,
    /// Total accumulators per engine (drives the Winograd block-size cap).
    pub total_accumulators_per_engine: u32,
    /// `{width, height}` of one addressable patch.
    pub patch_shape: (u32, u32),
    /// `{height, width, channels}` of one brick group (`NHWCB` tiling unit).
    pub brick_group_shape: (u32, u32, u32),
    /// `S1`: outputs per 1-D Winograd patch.
    pub winograd_output_size_1d: u32,
    /// `S2`: outputs per 2-D Winograd patch (also used in the 1-D direct count).
    pub winograd_output_size_2d: u32,
    /// `M1`: MACs per 1-D Winograd patch.
    pub winograd_macs_1d: u32,
    /// `M2`: MACs per 2-D Winograd patch.
    pub winograd_macs_2d: u32,
    /// `K`: wide-kernel decomposition size.
    pub wide_kernel_size: u32,
    /// Total addressable SRAM size in bytes.
    pub sram_size: u32,
}

impl Default for Capabilities {
    /// A reference capability profile, sized for unit tests and examples.
    /// Not tied to any real accelerator SKU.
    fn default() -> Self {
        Self {
            number_of_engines: 8,
            number_of_ofm: 16,
            number_of_srams: 4,
            ifm_per_engine: 8,
            ofm_per_engine: 8,
            mac_units_per_engine: 64,
            total_accumulators_per_engine: 128,
            patch_shape: (4, 4),
            brick_group_shape: (8, 8, 16),
            winograd_output_size_1d: 2,
            winograd_output_size_2d: 2,
            winograd_macs_1d: 4,
            winograd_macs_2d: 16,
            wide_kernel_size: 3,
            sram_size: 1024 * 1024,
        }
    }
}
