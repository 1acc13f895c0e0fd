pub mod constants;
pub mod math;
pub mod params;
pub mod settings;

pub use params::{AtmosphereParameters, ParamsError, PhaseFunctionKind, ScattererSpec};
pub use settings::{DitheringMode, SettingsState, SingleScatteringRenderMode, SkySettings};
