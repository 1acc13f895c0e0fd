//! Binary lookup-table format (little-endian).
//!
//! 2D table: `u16 width, u16 height`, then `4·w·h` IEEE-754 f32 values in
//! row-major RGBA order.
//!
//! 4D table: `u16 dim0, u16 dim1, u16 dim2, u16 num_altitude_layers`, then
//! `4·d0·d1·d2·layers` f32 values with altitude the slowest-varying axis, so
//! any layer can be reached with a single seek. On the GPU a 4D table
//! becomes a 3D texture with the second logical axis folded into height.

/// RGBA subpixels per texel.
pub const SUBPIXELS_PER_TEXEL: u64 = 4;

/// Bytes per f32 subpixel.
pub const BYTES_PER_SUBPIXEL: u64 = 4;

/// 2D header: two u16 fields.
pub const HEADER_2D_BYTES: usize = 4;

/// 4D header: four u16 fields.
pub const HEADER_4D_BYTES: usize = 8;

/// Number of altitude layers kept resident after slice reduction.
pub const LOADED_ALTITUDE_LAYERS: u16 = 2;

/// Parsed 2D table header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header2d {
    pub width: u16,
    pub height: u16,
}

impl Header2d {
    pub fn from_bytes(bytes: [u8; HEADER_2D_BYTES]) -> Self {
        Self {
            width: u16::from_le_bytes([bytes[0], bytes[1]]),
            height: u16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }

    pub fn to_bytes(self) -> [u8; HEADER_2D_BYTES] {
        let mut out = [0u8; HEADER_2D_BYTES];
        out[0..2].copy_from_slice(&self.width.to_le_bytes());
        out[2..4].copy_from_slice(&self.height.to_le_bytes());
        out
    }

    /// Total f32 count of the payload.
    pub fn subpixel_count(&self) -> u64 {
        SUBPIXELS_PER_TEXEL * self.width as u64 * self.height as u64
    }
}

/// Parsed 4D table header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header4d {
    pub dim0: u16,
    pub dim1: u16,
    pub dim2: u16,
    pub num_altitude_layers: u16,
}

impl Header4d {
    pub fn from_bytes(bytes: [u8; HEADER_4D_BYTES]) -> Self {
        Self {
            dim0: u16::from_le_bytes([bytes[0], bytes[1]]),
            dim1: u16::from_le_bytes([bytes[2], bytes[3]]),
            dim2: u16::from_le_bytes([bytes[4], bytes[5]]),
            num_altitude_layers: u16::from_le_bytes([bytes[6], bytes[7]]),
        }
    }

    pub fn to_bytes(self) -> [u8; HEADER_4D_BYTES] {
        let mut out = [0u8; HEADER_4D_BYTES];
        out[0..2].copy_from_slice(&self.dim0.to_le_bytes());
        out[2..4].copy_from_slice(&self.dim1.to_le_bytes());
        out[4..6].copy_from_slice(&self.dim2.to_le_bytes());
        out[6..8].copy_from_slice(&self.num_altitude_layers.to_le_bytes());
        out
    }

    /// f32 count of one altitude layer.
    pub fn layer_subpixel_count(&self) -> u64 {
        SUBPIXELS_PER_TEXEL * self.dim0 as u64 * self.dim1 as u64 * self.dim2 as u64
    }

    /// Absolute file offset of altitude layer `k` (the seek-offset law).
    pub fn layer_byte_offset(&self, k: u64) -> u64 {
        HEADER_4D_BYTES as u64 + k * self.layer_subpixel_count() * BYTES_PER_SUBPIXEL
    }

    /// Width of the flattened 3D texture.
    pub fn tex_width(&self) -> u32 {
        self.dim0 as u32
    }

    /// Height of the flattened 3D texture: the second logical axis folded.
    pub fn tex_height(&self) -> u32 {
        self.dim1 as u32 * self.dim2 as u32
    }

    /// Depth of the uploaded texture after slice reduction.
    pub fn tex_depth(&self) -> u32 {
        LOADED_ALTITUDE_LAYERS as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_2d_roundtrip() {
        let h = Header2d {
            width: 256,
            height: 64,
        };
        assert_eq!(Header2d::from_bytes(h.to_bytes()), h);
        assert_eq!(h.subpixel_count(), 4 * 256 * 64);
    }

    #[test]
    fn test_header_2d_little_endian() {
        let h = Header2d::from_bytes([0x00, 0x01, 0x02, 0x00]);
        assert_eq!(h.width, 256);
        assert_eq!(h.height, 2);
    }

    #[test]
    fn test_layer_byte_offset_law() {
        let h = Header4d {
            dim0: 16,
            dim1: 8,
            dim2: 4,
            num_altitude_layers: 10,
        };
        let layer_bytes = 16u64 * 8 * 4 * 4 * 4;
        for k in 0..10u64 {
            assert_eq!(h.layer_byte_offset(k), 8 + k * layer_bytes);
        }
    }

    #[test]
    fn test_flattened_extents() {
        let h = Header4d {
            dim0: 32,
            dim1: 16,
            dim2: 8,
            num_altitude_layers: 5,
        };
        assert_eq!(h.tex_width(), 32);
        assert_eq!(h.tex_height(), 128);
        assert_eq!(h.tex_depth(), 2);
    }
}
