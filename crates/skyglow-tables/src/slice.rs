//! Altitude slice selection for streamed 4D tables.
//!
//! Only the two layers bounding the camera's altitude coordinate are ever
//! resident; the shader interpolates between them using a half-texel-correct
//! coordinate into the depth-2 texture.

use skyglow_core::math::unit_range_to_tex_coord;

/// Which pair of altitude layers is loaded and how to sample between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AltitudeSlice {
    /// Index of the lower loaded layer.
    pub floor_index: u32,
    /// Unit-range altitude interval covered by the loaded pair. The
    /// in-shader coordinate is only valid while the current altitude
    /// coordinate stays inside this interval.
    pub loaded_range: [f32; 2],
    /// Depth texture coordinate encoding the interpolation fraction.
    pub static_tex_coord: f32,
}

impl AltitudeSlice {
    /// Select the layer pair bounding unit-range coordinate `u` in a table
    /// with `num_altitude_layers` layers (at least 2). `u == 1` maps to the
    /// top interval so the pair always brackets the coordinate.
    pub fn select(u: f64, num_altitude_layers: u16) -> Self {
        debug_assert!(num_altitude_layers >= 2);
        debug_assert!((0.0..=1.0).contains(&u));
        let intervals = (num_altitude_layers - 1) as f64;
        let alt_index = if u == 1.0 { intervals - 1.0 } else { u * intervals };
        let floor_index = alt_index.floor();
        let fract = alt_index - floor_index;
        Self {
            floor_index: floor_index as u32,
            loaded_range: [
                (floor_index / intervals) as f32,
                ((floor_index + 1.0) / intervals) as f32,
            ],
            static_tex_coord: unit_range_to_tex_coord(fract as f32, 2),
        }
    }

    /// Whether coordinate `u` still lies inside the loaded interval.
    pub fn contains(&self, u: f64) -> bool {
        u >= self.loaded_range[0] as f64 && u <= self.loaded_range[1] as f64
    }
}
