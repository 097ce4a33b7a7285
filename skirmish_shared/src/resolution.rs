//! Shared display-resolution table.
//!
//! Both endpoints know this table ahead of time. Positions on the wire are
//! expressed in the sender's resolution-normalized units and carry only the
//! table index, so a receiver rescales by `sender_scale / local_scale`
//! instead of exchanging pixel sizes.

use serde::{Deserialize, Serialize};

/// One supported display resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetResolution {
    pub width: u32,
    pub height: u32,
}

impl AssetResolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel-scale factor relative to the 1080p base entry.
    pub fn scale(&self) -> f32 {
        self.height as f32 / 1080.0
    }
}

/// Fixed, ordered table shared by every endpoint. Indexed by the
/// `resolution_index` field of wire messages.
pub const RESOLUTION_LIST: [AssetResolution; 4] = [
    AssetResolution::new(1280, 720),
    AssetResolution::new(1366, 768),
    AssetResolution::new(1920, 1080),
    AssetResolution::new(2560, 1440),
];

/// Scale factor for a table index, clamped into range.
pub fn scale_for_index(index: i32) -> f32 {
    let clamped = index.clamp(0, RESOLUTION_LIST.len() as i32 - 1) as usize;
    RESOLUTION_LIST[clamped].scale()
}

/// Factor that converts positions sent at `sender` into `local` units.
pub fn scale_between(sender: i32, local: i32) -> f32 {
    scale_for_index(sender) / scale_for_index(local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_entry_has_unit_scale() {
        assert_eq!(scale_for_index(2), 1.0);
    }

    #[test]
    fn same_index_is_identity() {
        for i in 0..RESOLUTION_LIST.len() as i32 {
            assert_eq!(scale_between(i, i), 1.0);
        }
    }

    #[test]
    fn out_of_range_index_is_clamped() {
        assert_eq!(scale_for_index(-3), RESOLUTION_LIST[0].scale());
        assert_eq!(scale_for_index(99), RESOLUTION_LIST[3].scale());
    }

    #[test]
    fn downscale_then_upscale_roundtrips() {
        let down = scale_between(2, 0);
        let up = scale_between(0, 2);
        assert!((down * up - 1.0).abs() < 1e-6);
    }
}
