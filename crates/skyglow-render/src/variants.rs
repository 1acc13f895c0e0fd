//! Shader variant enumeration and WGSL source composition.
//!
//! The data directory encodes the variant space in its tree structure:
//!
//! ```text
//! shaders/zero-order-scattering/<wlset>/
//! shaders/multiple-scattering/[<wlset>/]            (flat = one shared program)
//! shaders/single-scattering/<mode>/<wlset>/<scatterer>/
//! shaders/single-scattering/<mode>/<scatterer>/     (achromatic, no wlset axis)
//! shaders/single-scattering-eclipsed/<mode>/...     (same shape)
//! shaders/single-scattering-eclipsed/precomputation/<wlset>/<scatterer>/
//! ```
//!
//! Every regular file directly inside a variant directory is fragment
//! source; files are concatenated in file-name order, then the shared
//! view-direction function, an embedded entry point and the fullscreen
//! vertex stage are appended. Scattering fragments must define
//! `scattering_luminance` and `scattering_radiance`; precomputation
//! fragments must define `attenuation` (see the entry-point shaders).

use std::path::{Path, PathBuf};

use skyglow_core::constants::XYZ_TO_SRGB_LINEAR;
use skyglow_core::{PhaseFunctionKind, SingleScatteringRenderMode};

use crate::error::RenderError;

pub const PREAMBLE_SRC: &str = include_str!("../shaders/preamble.wgsl");
pub const FULLSCREEN_VERTEX_SRC: &str = include_str!("../shaders/fullscreen.wgsl");
pub const VIEW_DIR_SRC: &str = include_str!("../shaders/view_dir.wgsl");
pub const SCATTERING_ENTRY_SRC: &str = include_str!("../shaders/entry_scattering.wgsl");
pub const PRECOMPUTE_ENTRY_SRC: &str = include_str!("../shaders/entry_precompute.wgsl");
pub const VIEW_DIR_PROBE_SRC: &str = include_str!("../shaders/view_dir_probe.wgsl");
pub const TONEMAP_SRC: &str = include_str!("../shaders/tonemap.wgsl");

/// Which wavelength-set axis a single-scattering variant carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantAxes {
    /// One program per wavelength set.
    PerWavelengthSet,
    /// Exactly one shared program, no wavelength-set axis.
    Shared,
    /// No program at all (computed analytically in-shader).
    None,
}

/// The single dispatch table deciding the variant-generation rule for a
/// scatterer, evaluated once when building the catalog.
pub fn single_scattering_axes(
    kind: PhaseFunctionKind,
    mode: SingleScatteringRenderMode,
    eclipsed: bool,
) -> VariantAxes {
    use PhaseFunctionKind::*;
    use SingleScatteringRenderMode::*;
    if eclipsed {
        // Eclipse shadowing cannot be represented analytically, so even
        // Smooth scatterers get full per-set programs on the fly; only the
        // precomputed path collapses the wavelength axis.
        match (kind, mode) {
            (General, _) | (_, OnTheFly) => VariantAxes::PerWavelengthSet,
            (Achromatic, Precomputed) | (Smooth, Precomputed) => VariantAxes::Shared,
        }
    } else {
        match (kind, mode) {
            (General, _) | (Achromatic, OnTheFly) => VariantAxes::PerWavelengthSet,
            (Achromatic, Precomputed) => VariantAxes::Shared,
            (Smooth, _) => VariantAxes::None,
        }
    }
}

pub fn zero_order_dir(root: &Path, wl_set: usize) -> PathBuf {
    root.join("shaders")
        .join("zero-order-scattering")
        .join(wl_set.to_string())
}

/// Per-set multiple-scattering programs exist iff a `0` subdirectory does.
pub fn multiple_scattering_is_per_set(root: &Path) -> bool {
    root.join("shaders").join("multiple-scattering").join("0").is_dir()
}

pub fn multiple_scattering_dir(root: &Path, wl_set: Option<usize>) -> PathBuf {
    let dir = root.join("shaders").join("multiple-scattering");
    match wl_set {
        Some(i) => dir.join(i.to_string()),
        None => dir,
    }
}

pub fn single_scattering_dir(
    root: &Path,
    eclipsed: bool,
    mode: SingleScatteringRenderMode,
    wl_set: Option<usize>,
    scatterer: &str,
) -> PathBuf {
    let pass = if eclipsed {
        "single-scattering-eclipsed"
    } else {
        "single-scattering"
    };
    let mut dir = root.join("shaders").join(pass).join(mode.dir_name());
    if let Some(i) = wl_set {
        dir = dir.join(i.to_string());
    }
    dir.join(scatterer)
}

pub fn eclipse_precomputation_dir(root: &Path, wl_set: usize, scatterer: &str) -> PathBuf {
    root.join("shaders")
        .join("single-scattering-eclipsed")
        .join("precomputation")
        .join(wl_set.to_string())
        .join(scatterer)
}

/// Concatenate every regular file directly inside `dir`, sorted by file
/// name so composition is deterministic across platforms.
pub fn collect_fragment_sources(dir: &Path) -> Result<String, RenderError> {
    let entries = std::fs::read_dir(dir).map_err(|source| RenderError::ShaderDir {
        path: dir.display().to_string(),
        source,
    })?;
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| RenderError::ShaderDir {
            path: dir.display().to_string(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    let mut combined = String::new();
    for path in &files {
        let source = std::fs::read_to_string(path).map_err(|source| RenderError::ShaderDir {
            path: path.display().to_string(),
            source,
        })?;
        combined.push_str(&source);
        combined.push('\n');
    }
    Ok(combined)
}

/// Full WGSL for an accumulation-pass program.
pub fn compose_scattering_program(fragments: &str) -> String {
    format!("{PREAMBLE_SRC}\n{fragments}\n{VIEW_DIR_SRC}\n{SCATTERING_ENTRY_SRC}\n{FULLSCREEN_VERTEX_SRC}")
}

/// Full WGSL for an eclipse-precomputation program (no view direction).
pub fn compose_precompute_program(fragments: &str) -> String {
    format!("{PREAMBLE_SRC}\n{fragments}\n{PRECOMPUTE_ENTRY_SRC}\n{FULLSCREEN_VERTEX_SRC}")
}

/// Full WGSL for the view-direction probe (embedded source only).
pub fn compose_view_dir_probe_program() -> String {
    format!("{PREAMBLE_SRC}\n{VIEW_DIR_SRC}\n{VIEW_DIR_PROBE_SRC}\n{FULLSCREEN_VERTEX_SRC}")
}

/// Full WGSL for the tonemap pass; the XYZ conversion matrix is generated
/// from the shared Rust-side constant, column by column.
pub fn compose_tonemap_program() -> String {
    let columns: Vec<String> = XYZ_TO_SRGB_LINEAR
        .iter()
        .map(|col| format!("vec3<f32>({:?}, {:?}, {:?})", col[0], col[1], col[2]))
        .collect();
    format!(
        "const XYZ_TO_SRGB = mat3x3<f32>({});\n\n{TONEMAP_SRC}",
        columns.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use PhaseFunctionKind::*;
    use SingleScatteringRenderMode::*;

    #[test]
    fn test_axes_dispatch_table_plain() {
        assert_eq!(single_scattering_axes(General, OnTheFly, false), VariantAxes::PerWavelengthSet);
        assert_eq!(single_scattering_axes(General, Precomputed, false), VariantAxes::PerWavelengthSet);
        assert_eq!(single_scattering_axes(Achromatic, OnTheFly, false), VariantAxes::PerWavelengthSet);
        assert_eq!(single_scattering_axes(Achromatic, Precomputed, false), VariantAxes::Shared);
        assert_eq!(single_scattering_axes(Smooth, OnTheFly, false), VariantAxes::None);
        assert_eq!(single_scattering_axes(Smooth, Precomputed, false), VariantAxes::None);
    }

    #[test]
    fn test_axes_dispatch_table_eclipsed() {
        // Eclipsed Smooth still needs per-set programs on the fly.
        assert_eq!(single_scattering_axes(Smooth, OnTheFly, true), VariantAxes::PerWavelengthSet);
        assert_eq!(single_scattering_axes(Achromatic, OnTheFly, true), VariantAxes::PerWavelengthSet);
        assert_eq!(single_scattering_axes(General, Precomputed, true), VariantAxes::PerWavelengthSet);
        assert_eq!(single_scattering_axes(Achromatic, Precomputed, true), VariantAxes::Shared);
        assert_eq!(single_scattering_axes(Smooth, Precomputed, true), VariantAxes::Shared);
    }

    #[test]
    fn test_directory_layout() {
        let root = Path::new("/data");
        assert_eq!(
            zero_order_dir(root, 2),
            Path::new("/data/shaders/zero-order-scattering/2")
        );
        assert_eq!(
            single_scattering_dir(root, false, Precomputed, Some(1), "rayleigh"),
            Path::new("/data/shaders/single-scattering/precomputed/1/rayleigh")
        );
        assert_eq!(
            single_scattering_dir(root, false, Precomputed, None, "aerosols"),
            Path::new("/data/shaders/single-scattering/precomputed/aerosols")
        );
        assert_eq!(
            single_scattering_dir(root, true, OnTheFly, Some(0), "ozone"),
            Path::new("/data/shaders/single-scattering-eclipsed/on-the-fly/0/ozone")
        );
        assert_eq!(
            eclipse_precomputation_dir(root, 3, "rayleigh"),
            Path::new("/data/shaders/single-scattering-eclipsed/precomputation/3/rayleigh")
        );
        assert_eq!(
            multiple_scattering_dir(root, None),
            Path::new("/data/shaders/multiple-scattering")
        );
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "skyglow-variants-{}-{name}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_collect_fragments_sorted_by_name() {
        let dir = temp_dir("sorted");
        std::fs::write(dir.join("b-phase.wgsl"), "// b\n").unwrap();
        std::fs::write(dir.join("a-common.wgsl"), "// a\n").unwrap();
        std::fs::write(dir.join("c-main.wgsl"), "// c\n").unwrap();

        let combined = collect_fragment_sources(&dir).unwrap();
        let a = combined.find("// a").unwrap();
        let b = combined.find("// b").unwrap();
        let c = combined.find("// c").unwrap();
        assert!(a < b && b < c);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_collect_fragments_missing_dir() {
        let err = collect_fragment_sources(Path::new("/nonexistent/shaders/x")).unwrap_err();
        assert!(matches!(err, RenderError::ShaderDir { .. }));
        assert!(err.to_string().contains("/nonexistent/shaders/x"));
    }

    #[test]
    fn test_scattering_composition_order() {
        let src = compose_scattering_program("fn marker() {}\n");
        let preamble = src.find("struct SkyUniforms").unwrap();
        let fragment = src.find("fn marker").unwrap();
        let view_dir = src.find("fn calc_view_dir").unwrap();
        let entry = src.find("struct ScatteringOutput").unwrap();
        let vertex = src.find("fn vs_main").unwrap();
        assert!(preamble < fragment && fragment < view_dir && view_dir < entry && entry < vertex);
    }

    #[test]
    fn test_precompute_composition_has_no_view_dir() {
        let src = compose_precompute_program("fn attenuation() {}\n");
        assert!(!src.contains("fn calc_view_dir"));
        assert!(src.contains("fn attenuation"));
        assert!(src.contains("fn vs_main"));
    }

    #[test]
    fn test_tonemap_composition_injects_xyz_matrix() {
        let src = compose_tonemap_program();
        assert!(src.starts_with("const XYZ_TO_SRGB = mat3x3<f32>(vec3<f32>("));
        for col in XYZ_TO_SRGB_LINEAR {
            for v in col {
                assert!(src.contains(&format!("{v:?}")), "missing {v:?}");
            }
        }
        // The constant is defined exactly once; the shader body only uses it.
        assert_eq!(src.matches("const XYZ_TO_SRGB").count(), 1);
        assert!(src.contains("XYZ_TO_SRGB * xyz"));
        assert!(src.contains("fn fs_main"));
    }

    #[test]
    fn test_probe_composition_is_self_contained() {
        let src = compose_view_dir_probe_program();
        assert!(src.contains("fn calc_view_dir"));
        assert!(src.contains("fn vs_main"));
        assert!(src.contains("fn fs_main"));
    }
}
