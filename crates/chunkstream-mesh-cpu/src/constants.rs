//! Shared constants for chunkstream-mesh-cpu.

pub(crate) const OPAQUE_ALPHA: u8 = 255;
pub(crate) const WATER_ALPHA: u8 = 160;

/// Visual-only lighting floor to avoid pitch-black faces in darkness.
/// Does not affect the light array.
pub(crate) const VISUAL_LIGHT_MIN: u8 = 18; // ~7% brightness floor
