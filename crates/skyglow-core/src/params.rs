//! Atmosphere model description, parsed from `params.ron` in the data
//! directory produced by the offline precomputation tool. Immutable for the
//! renderer's lifetime.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::WAVELENGTHS_PER_SET;

/// How a scatterer's angular scattering distribution is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseFunctionKind {
    /// Full lookup table per wavelength set.
    General,
    /// Single wavelength-independent shape (one shared table).
    Achromatic,
    /// No table; computed analytically in-shader.
    Smooth,
}

/// One scattering species of the atmosphere model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScattererSpec {
    pub name: String,
    pub phase_function: PhaseFunctionKind,
}

/// Errors raised while reading or validating `params.ron`.
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("failed to read \"{path}\": {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse \"{path}\": {message}")]
    Parse { path: String, message: String },

    #[error("wavelength count {0} is not a positive multiple of {WAVELENGTHS_PER_SET}")]
    BadWavelengthCount(usize),

    #[error("duplicate scatterer name \"{0}\"")]
    DuplicateScatterer(String),

    #[error("parameter {0} must be positive")]
    NonPositive(&'static str),
}

/// Physical and packaging parameters of one precomputed atmosphere.
///
/// Scatterer order matters: render passes iterate scatterers in this order,
/// which is the order the offline tool wrote their tables in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtmosphereParameters {
    pub earth_radius: f64,
    pub atmosphere_height: f64,
    pub earth_moon_distance: f64,
    pub moon_radius: f64,
    /// All wavelengths, in nanometers, packed four per RGBA texture set.
    pub wavelengths: Vec<f32>,
    pub scatterers: Vec<ScattererSpec>,
    /// Eclipse attenuation table resolution along relative azimuth.
    pub eclipse_angular_resolution: u32,
    /// Eclipse attenuation table resolution along cosine of the viewing
    /// zenith angle.
    pub eclipse_zenith_resolution: u32,
}

impl AtmosphereParameters {
    /// Parse from RON text and validate.
    pub fn from_ron(text: &str, origin: &str) -> Result<Self, ParamsError> {
        let params: AtmosphereParameters =
            ron::from_str(text).map_err(|e| ParamsError::Parse {
                path: origin.to_string(),
                message: e.to_string(),
            })?;
        params.validate()?;
        Ok(params)
    }

    /// Load `params.ron` from a data directory.
    pub fn load(data_dir: &Path) -> Result<Self, ParamsError> {
        let path = data_dir.join("params.ron");
        let text = std::fs::read_to_string(&path).map_err(|source| ParamsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_ron(&text, &path.display().to_string())
    }

    /// Number of RGBA wavelength sets.
    pub fn wavelength_set_count(&self) -> usize {
        self.wavelengths.len() / WAVELENGTHS_PER_SET
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.wavelengths.is_empty() || self.wavelengths.len() % WAVELENGTHS_PER_SET != 0 {
            return Err(ParamsError::BadWavelengthCount(self.wavelengths.len()));
        }
        for (i, s) in self.scatterers.iter().enumerate() {
            if self.scatterers[..i].iter().any(|p| p.name == s.name) {
                return Err(ParamsError::DuplicateScatterer(s.name.clone()));
            }
        }
        for (value, name) in [
            (self.earth_radius, "earth_radius"),
            (self.atmosphere_height, "atmosphere_height"),
            (self.earth_moon_distance, "earth_moon_distance"),
            (self.moon_radius, "moon_radius"),
            (self.eclipse_angular_resolution as f64, "eclipse_angular_resolution"),
            (self.eclipse_zenith_resolution as f64, "eclipse_zenith_resolution"),
        ] {
            if value <= 0.0 {
                return Err(ParamsError::NonPositive(name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ron() -> &'static str {
        r#"(
            earth_radius: 6371000.0,
            atmosphere_height: 100000.0,
            earth_moon_distance: 384400000.0,
            moon_radius: 1737100.0,
            wavelengths: [440.0, 510.0, 580.0, 650.0, 460.0, 530.0, 600.0, 670.0],
            scatterers: [
                (name: "rayleigh", phase_function: General),
                (name: "aerosols", phase_function: Achromatic),
                (name: "ozone", phase_function: Smooth),
            ],
            eclipse_angular_resolution: 512,
            eclipse_zenith_resolution: 512,
        )"#
    }

    #[test]
    fn test_parse_sample() {
        let p = AtmosphereParameters::from_ron(sample_ron(), "test").unwrap();
        assert_eq!(p.wavelength_set_count(), 2);
        assert_eq!(p.scatterers.len(), 3);
        assert_eq!(p.scatterers[0].name, "rayleigh");
        assert_eq!(p.scatterers[1].phase_function, PhaseFunctionKind::Achromatic);
    }

    #[test]
    fn test_rejects_ragged_wavelength_list() {
        let text = sample_ron().replace("670.0],", "],");
        let err = AtmosphereParameters::from_ron(&text, "test").unwrap_err();
        assert!(matches!(err, ParamsError::BadWavelengthCount(7)));
    }

    #[test]
    fn test_rejects_duplicate_scatterer() {
        let text = sample_ron().replace("\"aerosols\"", "\"rayleigh\"");
        let err = AtmosphereParameters::from_ron(&text, "test").unwrap_err();
        assert!(matches!(err, ParamsError::DuplicateScatterer(_)));
    }

    #[test]
    fn test_rejects_non_positive_radius() {
        let text = sample_ron().replace("earth_radius: 6371000.0", "earth_radius: 0.0");
        let err = AtmosphereParameters::from_ron(&text, "test").unwrap_err();
        assert!(matches!(err, ParamsError::NonPositive("earth_radius")));
    }

    #[test]
    fn test_parse_error_carries_origin() {
        let err = AtmosphereParameters::from_ron("(junk", "data/params.ron").unwrap_err();
        assert!(err.to_string().contains("data/params.ron"));
    }
}
