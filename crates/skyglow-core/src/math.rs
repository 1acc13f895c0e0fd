//! Geometry shared by the texture loader and the render passes.
//!
//! All angles are radians; azimuths are measured in the horizontal plane,
//! zenith angles from the local vertical. Positions are in a planet-centered
//! frame where the camera sits on the +Z axis at `(0, 0, altitude)`.

use glam::DVec3;

/// Horizon-preserving reparameterization of physical altitude into the
/// unit-range altitude coordinate of the 4D lookup tables.
///
/// `h` is camera altitude above ground, `r` the planet radius, `big_h` the
/// atmosphere thickness. Exactly 0.0 at `h == 0` and exactly 1.0 at
/// `h == big_h`.
pub fn altitude_unit_range_coord(h: f64, r: f64, big_h: f64) -> f64 {
    (h * (h + 2.0 * r) / (big_h * (big_h + 2.0 * r))).sqrt()
}

/// Remap a unit-range coordinate into the half-texel-correct sampling range
/// of a texture with `tex_size` texels along the axis.
pub fn unit_range_to_tex_coord(u: f32, tex_size: u32) -> f32 {
    (0.5 + (tex_size - 1) as f32 * u) / tex_size as f32
}

/// Camera position in the planet-centered frame.
pub fn camera_position(altitude: f64) -> DVec3 {
    DVec3::new(0.0, 0.0, altitude)
}

/// Unit direction toward the sun from its azimuth and zenith angle.
pub fn sun_direction(azimuth: f64, zenith_angle: f64) -> DVec3 {
    DVec3::new(
        azimuth.cos() * zenith_angle.sin(),
        azimuth.sin() * zenith_angle.sin(),
        zenith_angle.cos(),
    )
}

/// Distance from the camera to the moon's center, accounting for the
/// camera's offset from the planet center.
pub fn camera_moon_distance(
    altitude: f64,
    earth_radius: f64,
    earth_moon_distance: f64,
    moon_zenith_angle: f64,
) -> f64 {
    let hpr = altitude + earth_radius;
    let elevation = std::f64::consts::FRAC_PI_2 - moon_zenith_angle;
    -hpr * elevation.sin()
        + (earth_moon_distance * earth_moon_distance
            - 0.5 * hpr * hpr * (1.0 + (2.0 * elevation).cos()))
        .sqrt()
}

/// Apparent angular radius of the moon as seen from the camera.
pub fn moon_angular_radius(moon_radius: f64, camera_moon_distance: f64) -> f64 {
    moon_radius / camera_moon_distance
}

/// Moon center position in the planet-centered frame.
pub fn moon_position(
    altitude: f64,
    moon_azimuth: f64,
    moon_zenith_angle: f64,
    camera_moon_distance: f64,
) -> DVec3 {
    let dir = sun_direction(moon_azimuth, moon_zenith_angle);
    camera_position(altitude) + dir * camera_moon_distance
}

/// Moon position with azimuth measured relative to the sun's azimuth.
/// The eclipse precomputation works in this sun-relative frame so its 2D
/// table depends only on relative azimuth and viewing zenith angle.
pub fn moon_position_relative_to_sun_azimuth(
    altitude: f64,
    moon_azimuth: f64,
    sun_azimuth: f64,
    moon_zenith_angle: f64,
    camera_moon_distance: f64,
) -> DVec3 {
    let dir = sun_direction(moon_azimuth - sun_azimuth, moon_zenith_angle);
    camera_position(altitude) + dir * camera_moon_distance
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    const EARTH_RADIUS: f64 = 6_371_000.0;
    const ATMO_HEIGHT: f64 = 100_000.0;
    const EARTH_MOON_DISTANCE: f64 = 384_400_000.0;

    #[test]
    fn test_altitude_coord_exact_at_endpoints() {
        assert_eq!(altitude_unit_range_coord(0.0, EARTH_RADIUS, ATMO_HEIGHT), 0.0);
        assert_eq!(
            altitude_unit_range_coord(ATMO_HEIGHT, EARTH_RADIUS, ATMO_HEIGHT),
            1.0
        );
    }

    #[test]
    fn test_altitude_coord_monotonic() {
        let mut prev = -1.0;
        for i in 0..=100 {
            let h = ATMO_HEIGHT * i as f64 / 100.0;
            let u = altitude_unit_range_coord(h, EARTH_RADIUS, ATMO_HEIGHT);
            assert!(u > prev, "not monotonic at h={h}");
            prev = u;
        }
    }

    #[test]
    fn test_unit_range_to_tex_coord_half_texel_endpoints() {
        // u=0 lands at the center of the first texel, u=1 at the last.
        assert_eq!(unit_range_to_tex_coord(0.0, 2), 0.25);
        assert_eq!(unit_range_to_tex_coord(1.0, 2), 0.75);
        assert_eq!(unit_range_to_tex_coord(0.0, 256), 0.5 / 256.0);
        assert_eq!(unit_range_to_tex_coord(1.0, 256), 255.5 / 256.0);
    }

    #[test]
    fn test_sun_direction_is_unit_length() {
        for (az, zen) in [(0.0, 0.0), (1.2, 0.7), (-2.5, FRAC_PI_2), (PI, PI)] {
            let d = sun_direction(az, zen);
            assert!((d.length() - 1.0).abs() < 1e-12, "az={az} zen={zen}");
        }
    }

    #[test]
    fn test_sun_direction_cardinal_points() {
        let zenith = sun_direction(0.0, 0.0);
        assert!((zenith - DVec3::Z).length() < 1e-12);
        let horizon = sun_direction(0.0, FRAC_PI_2);
        assert!((horizon - DVec3::X).length() < 1e-12);
    }

    #[test]
    fn test_camera_moon_distance_overhead_and_horizon() {
        // Moon at zenith: distance is simply D - (h+R).
        let overhead = camera_moon_distance(0.0, EARTH_RADIUS, EARTH_MOON_DISTANCE, 0.0);
        assert!((overhead - (EARTH_MOON_DISTANCE - EARTH_RADIUS)).abs() < 1.0);

        // Moon on the horizon: sqrt(D² − (h+R)²).
        let horizon = camera_moon_distance(0.0, EARTH_RADIUS, EARTH_MOON_DISTANCE, FRAC_PI_2);
        let expected = (EARTH_MOON_DISTANCE * EARTH_MOON_DISTANCE
            - EARTH_RADIUS * EARTH_RADIUS)
            .sqrt();
        assert!((horizon - expected).abs() < 1.0);
    }

    #[test]
    fn test_moon_position_relative_frame_cancels_sun_azimuth() {
        let d = camera_moon_distance(0.0, EARTH_RADIUS, EARTH_MOON_DISTANCE, 0.3);
        let a = moon_position_relative_to_sun_azimuth(0.0, 1.0, 1.0, 0.3, d);
        let b = moon_position(0.0, 0.0, 0.3, d);
        assert!((a - b).length() < 1e-6);
    }
}
