//! Single source of truth for constants shared between Rust and WGSL.
//! The render crate injects the matrix and dither pattern into shader
//! preambles and the Bayer texture upload.

/// Number of wavelengths packed into one RGBA texture channel set.
pub const WAVELENGTHS_PER_SET: usize = 4;

/// Mouse-drag sensitivity for sun positioning, in pixels per radian.
pub const SUN_DRAG_SCALE: f64 = 500.0;

/// 8×8 Bayer ordered-dithering pattern, each threshold divided by 64.
pub const BAYER_PATTERN_8X8: [f32; 64] = [
    0.0 / 64.0, 32.0 / 64.0,  8.0 / 64.0, 40.0 / 64.0,  2.0 / 64.0, 34.0 / 64.0, 10.0 / 64.0, 42.0 / 64.0,
    48.0 / 64.0, 16.0 / 64.0, 56.0 / 64.0, 24.0 / 64.0, 50.0 / 64.0, 18.0 / 64.0, 58.0 / 64.0, 26.0 / 64.0,
    12.0 / 64.0, 44.0 / 64.0,  4.0 / 64.0, 36.0 / 64.0, 14.0 / 64.0, 46.0 / 64.0,  6.0 / 64.0, 38.0 / 64.0,
    60.0 / 64.0, 28.0 / 64.0, 52.0 / 64.0, 20.0 / 64.0, 62.0 / 64.0, 30.0 / 64.0, 54.0 / 64.0, 22.0 / 64.0,
    3.0 / 64.0, 35.0 / 64.0, 11.0 / 64.0, 43.0 / 64.0,  1.0 / 64.0, 33.0 / 64.0,  9.0 / 64.0, 41.0 / 64.0,
    51.0 / 64.0, 19.0 / 64.0, 59.0 / 64.0, 27.0 / 64.0, 49.0 / 64.0, 17.0 / 64.0, 57.0 / 64.0, 25.0 / 64.0,
    15.0 / 64.0, 47.0 / 64.0,  7.0 / 64.0, 39.0 / 64.0, 13.0 / 64.0, 45.0 / 64.0,  5.0 / 64.0, 37.0 / 64.0,
    63.0 / 64.0, 31.0 / 64.0, 55.0 / 64.0, 23.0 / 64.0, 61.0 / 64.0, 29.0 / 64.0, 53.0 / 64.0, 21.0 / 64.0,
];

/// CIE XYZ → linear sRGB conversion matrix, column-major (matches the
/// `mat3x3<f32>` constructor in the tonemap shader).
pub const XYZ_TO_SRGB_LINEAR: [[f32; 3]; 3] = [
    [3.2406, -0.9689, 0.0557],
    [-1.5372, 1.8758, -0.204],
    [-0.4986, 0.0415, 1.057],
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bayer_pattern_is_a_threshold_permutation() {
        // Every value k/64 for k in 0..64 appears exactly once.
        let mut seen = [false; 64];
        for v in BAYER_PATTERN_8X8 {
            let k = (v * 64.0).round() as usize;
            assert!(k < 64);
            assert!(!seen[k], "threshold {k}/64 appears twice");
            seen[k] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_xyz_to_srgb_maps_white_to_white() {
        // D65 white point (X,Y,Z) ≈ (0.9505, 1.0, 1.089) must land near RGB (1,1,1).
        let xyz = [0.9505f32, 1.0, 1.089];
        let m = XYZ_TO_SRGB_LINEAR;
        for row in 0..3 {
            let c = m[0][row] * xyz[0] + m[1][row] * xyz[1] + m[2][row] * xyz[2];
            assert!((c - 1.0).abs() < 0.01, "channel {row} = {c}");
        }
    }
}
