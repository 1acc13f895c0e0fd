//! Encoders for the lookup-table byte format. The offline precomputation
//! tool is the main producer; tests use these to exercise the loader
//! against known byte images.

use crate::format::{Header2d, Header4d};

/// Encode a 2D table. `subpixels` length must equal `4·width·height`.
pub fn encode_table_2d(width: u16, height: u16, subpixels: &[f32]) -> Vec<u8> {
    let header = Header2d { width, height };
    assert_eq!(
        subpixels.len() as u64,
        header.subpixel_count(),
        "2D payload length mismatch"
    );
    let mut out = Vec::with_capacity(4 + subpixels.len() * 4);
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(bytemuck::cast_slice(subpixels));
    out
}

/// Encode a 4D table with altitude as the slowest-varying axis. `subpixels`
/// length must equal `4·dim0·dim1·dim2·num_altitude_layers`.
pub fn encode_table_4d(
    dims: [u16; 3],
    num_altitude_layers: u16,
    subpixels: &[f32],
) -> Vec<u8> {
    let header = Header4d {
        dim0: dims[0],
        dim1: dims[1],
        dim2: dims[2],
        num_altitude_layers,
    };
    assert_eq!(
        subpixels.len() as u64,
        header.layer_subpixel_count() * num_altitude_layers as u64,
        "4D payload length mismatch"
    );
    let mut out = Vec::with_capacity(8 + subpixels.len() * 4);
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(bytemuck::cast_slice(subpixels));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{HEADER_2D_BYTES, HEADER_4D_BYTES};

    #[test]
    fn test_encode_2d_layout() {
        let data = [1.0f32, 2.0, 3.0, 4.0];
        let bytes = encode_table_2d(1, 1, &data);
        assert_eq!(bytes.len(), HEADER_2D_BYTES + 16);
        assert_eq!(&bytes[0..4], &[1, 0, 1, 0]);
        assert_eq!(f32::from_le_bytes(bytes[4..8].try_into().unwrap()), 1.0);
        assert_eq!(f32::from_le_bytes(bytes[16..20].try_into().unwrap()), 4.0);
    }

    #[test]
    fn test_encode_4d_layer_offsets() {
        let layer: u64 = 4 * 2 * 1 * 1;
        let data: Vec<f32> = (0..layer * 3).map(|i| i as f32).collect();
        let bytes = encode_table_4d([2, 1, 1], 3, &data);
        let h = Header4d {
            dim0: 2,
            dim1: 1,
            dim2: 1,
            num_altitude_layers: 3,
        };
        assert_eq!(bytes.len() as u64, HEADER_4D_BYTES as u64 + layer * 3 * 4);
        // First subpixel of layer k sits exactly at layer_byte_offset(k).
        for k in 0..3u64 {
            let off = h.layer_byte_offset(k) as usize;
            let v = f32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
            assert_eq!(v, (k * layer) as f32);
        }
    }

    #[test]
    #[should_panic(expected = "2D payload length mismatch")]
    fn test_encode_2d_rejects_short_payload() {
        encode_table_2d(2, 2, &[0.0; 4]);
    }
}
