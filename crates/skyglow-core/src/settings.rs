//! Live settings collaborator interface.
//!
//! The renderer samples these values once per frame and never caches them;
//! the host (settings panel, scripting layer, test harness) owns the state.
//! Write-backs flow the other way: the renderer reports whether spectral
//! radiance capture is possible, and the sun-drag gesture updates the sun
//! angles.

/// Display quantization presets for ordered dithering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DitheringMode {
    #[default]
    Disabled,
    Color565,
    Color666,
    Color888,
    Color101010,
}

impl DitheringMode {
    /// Per-channel maximum quantized value; all zeros disables dithering in
    /// the tonemap shader.
    pub fn rgb_max(self) -> [f32; 3] {
        match self {
            DitheringMode::Disabled => [0.0, 0.0, 0.0],
            DitheringMode::Color565 => [31.0, 63.0, 31.0],
            DitheringMode::Color666 => [63.0, 63.0, 63.0],
            DitheringMode::Color888 => [255.0, 255.0, 255.0],
            DitheringMode::Color101010 => [1023.0, 1023.0, 1023.0],
        }
    }
}

/// Whether single scattering is integrated in-shader or sampled from the
/// precomputed tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SingleScatteringRenderMode {
    OnTheFly,
    #[default]
    Precomputed,
}

impl SingleScatteringRenderMode {
    pub const ALL: [SingleScatteringRenderMode; 2] = [
        SingleScatteringRenderMode::OnTheFly,
        SingleScatteringRenderMode::Precomputed,
    ];

    /// Directory name component under `shaders/single-scattering*/`.
    pub fn dir_name(self) -> &'static str {
        match self {
            SingleScatteringRenderMode::OnTheFly => "on-the-fly",
            SingleScatteringRenderMode::Precomputed => "precomputed",
        }
    }
}

/// The settings provider consumed each frame. Angles in radians, altitude
/// in meters.
pub trait SkySettings {
    fn altitude(&self) -> f64;
    fn sun_azimuth(&self) -> f64;
    fn sun_zenith_angle(&self) -> f64;
    fn moon_azimuth(&self) -> f64;
    fn moon_zenith_angle(&self) -> f64;
    fn zoom_factor(&self) -> f32;
    fn exposure(&self) -> f32;
    fn dithering_mode(&self) -> DitheringMode;
    fn texture_filtering_enabled(&self) -> bool;
    fn eclipse_shading_enabled(&self) -> bool;
    fn single_scattering_render_mode(&self) -> SingleScatteringRenderMode;
    fn zero_order_scattering_enabled(&self) -> bool;
    fn single_scattering_enabled(&self) -> bool;
    fn multiple_scattering_enabled(&self) -> bool;

    /// Capability write-back so the host can enable/disable its spectral
    /// probe affordances.
    fn set_can_grab_radiance(&mut self, can: bool);
    /// Sun-drag write-backs.
    fn set_sun_azimuth(&mut self, azimuth: f64);
    fn set_sun_zenith_angle(&mut self, zenith_angle: f64);
}

/// Plain-struct settings implementation for hosts and tests.
#[derive(Debug, Clone)]
pub struct SettingsState {
    pub altitude: f64,
    pub sun_azimuth: f64,
    pub sun_zenith_angle: f64,
    pub moon_azimuth: f64,
    pub moon_zenith_angle: f64,
    pub zoom_factor: f32,
    pub exposure: f32,
    pub dithering_mode: DitheringMode,
    pub texture_filtering: bool,
    pub eclipse_shading: bool,
    pub single_scattering_render_mode: SingleScatteringRenderMode,
    pub zero_order_scattering: bool,
    pub single_scattering: bool,
    pub multiple_scattering: bool,
    pub can_grab_radiance: bool,
}

impl Default for SettingsState {
    fn default() -> Self {
        Self {
            altitude: 50.0,
            sun_azimuth: 0.0,
            sun_zenith_angle: 1.2,
            moon_azimuth: 0.0,
            moon_zenith_angle: 1.2,
            zoom_factor: 1.0,
            exposure: 1e-4,
            dithering_mode: DitheringMode::Disabled,
            texture_filtering: true,
            eclipse_shading: false,
            single_scattering_render_mode: SingleScatteringRenderMode::Precomputed,
            zero_order_scattering: true,
            single_scattering: true,
            multiple_scattering: true,
            can_grab_radiance: false,
        }
    }
}

impl SkySettings for SettingsState {
    fn altitude(&self) -> f64 {
        self.altitude
    }
    fn sun_azimuth(&self) -> f64 {
        self.sun_azimuth
    }
    fn sun_zenith_angle(&self) -> f64 {
        self.sun_zenith_angle
    }
    fn moon_azimuth(&self) -> f64 {
        self.moon_azimuth
    }
    fn moon_zenith_angle(&self) -> f64 {
        self.moon_zenith_angle
    }
    fn zoom_factor(&self) -> f32 {
        self.zoom_factor
    }
    fn exposure(&self) -> f32 {
        self.exposure
    }
    fn dithering_mode(&self) -> DitheringMode {
        self.dithering_mode
    }
    fn texture_filtering_enabled(&self) -> bool {
        self.texture_filtering
    }
    fn eclipse_shading_enabled(&self) -> bool {
        self.eclipse_shading
    }
    fn single_scattering_render_mode(&self) -> SingleScatteringRenderMode {
        self.single_scattering_render_mode
    }
    fn zero_order_scattering_enabled(&self) -> bool {
        self.zero_order_scattering
    }
    fn single_scattering_enabled(&self) -> bool {
        self.single_scattering
    }
    fn multiple_scattering_enabled(&self) -> bool {
        self.multiple_scattering
    }

    fn set_can_grab_radiance(&mut self, can: bool) {
        self.can_grab_radiance = can;
    }
    fn set_sun_azimuth(&mut self, azimuth: f64) {
        self.sun_azimuth = azimuth;
    }
    fn set_sun_zenith_angle(&mut self, zenith_angle: f64) {
        self.sun_zenith_angle = zenith_angle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_max_presets() {
        assert_eq!(DitheringMode::Disabled.rgb_max(), [0.0, 0.0, 0.0]);
        assert_eq!(DitheringMode::Color565.rgb_max(), [31.0, 63.0, 31.0]);
        assert_eq!(DitheringMode::Color666.rgb_max(), [63.0, 63.0, 63.0]);
        assert_eq!(DitheringMode::Color888.rgb_max(), [255.0, 255.0, 255.0]);
        assert_eq!(
            DitheringMode::Color101010.rgb_max(),
            [1023.0, 1023.0, 1023.0]
        );
    }

    #[test]
    fn test_render_mode_dir_names() {
        assert_eq!(SingleScatteringRenderMode::OnTheFly.dir_name(), "on-the-fly");
        assert_eq!(
            SingleScatteringRenderMode::Precomputed.dir_name(),
            "precomputed"
        );
    }

    #[test]
    fn test_settings_write_backs() {
        let mut s = SettingsState::default();
        s.set_can_grab_radiance(true);
        s.set_sun_azimuth(0.5);
        s.set_sun_zenith_angle(1.0);
        assert!(s.can_grab_radiance);
        assert_eq!(s.sun_azimuth(), 0.5);
        assert_eq!(s.sun_zenith_angle(), 1.0);
    }
}
