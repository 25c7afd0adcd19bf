//! TOML configuration deserialisation for LDOS jobs.
//!
//! ```toml
//! [simulation]
//! frequencies = { range = [1.0, 10.0], points = 10 }
//! k_bloch = [[0.0, 0.0], [0.5, 0.0]]
//! ldos_only = true
//!
//! [geometry]
//! lattice = [[0.5, 0.0, 0.0], [0.0, 0.5, 0.0]]
//!
//! [[geometry.surface]]
//! label = "disk"
//! material = "Au_Drude"
//! spacing = 0.02
//! type = "cylinder"
//! radius = 0.1
//! length = 0.04
//!
//! [[points]]
//! label = "above"
//! file = "points.dat"
//!
//! [output]
//! file_base = "disk"
//! ```

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub substrate: Option<SubstrateConfig>,
    #[serde(default)]
    pub geometry: GeometryConfig,
    pub points: Vec<PointSetConfig>,
    #[serde(default)]
    pub material: Vec<MaterialConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Sweep parameters from TOML.
#[derive(Debug, Deserialize)]
pub struct SimulationConfig {
    /// Angular frequencies in units of c / 1 μm.
    pub frequencies: FrequencySpec,
    /// Bloch vectors, one per row: `[k]` along the lattice vector in 1D,
    /// `[kx, ky]` in 2D.
    #[serde(default)]
    pub k_bloch: Vec<Vec<f64>>,
    #[serde(default)]
    pub ldos_only: bool,
    #[serde(default)]
    pub scattering_only: bool,
    #[serde(default = "default_true")]
    pub reuse_diagonal_blocks: bool,
    #[serde(default)]
    pub on_singular: OnSingular,
}

/// Frequency specification: a range, a list of real values, or a list of
/// complex `[re, im]` pairs.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FrequencySpec {
    Range { range: [f64; 2], points: usize },
    List { values: Vec<f64> },
    Complex { complex: Vec<[f64; 2]> },
}

/// What to do when the system matrix is singular at one sweep point.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnSingular {
    /// Log a warning and continue with the next point.
    Skip,
    #[default]
    Abort,
}

/// Analytic substrate replacing the scattering surfaces.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubstrateConfig {
    GroundPlane {
        #[serde(default = "default_image_cutoff")]
        image_cutoff: usize,
    },
    HalfSpace {
        material: String,
        #[serde(default = "default_rel_tol")]
        rel_tol: f64,
        #[serde(default = "default_abs_tol")]
        abs_tol: f64,
        #[serde(default = "default_max_evals")]
        max_evals: usize,
    },
}

fn default_true() -> bool {
    true
}
fn default_image_cutoff() -> usize {
    4
}
fn default_rel_tol() -> f64 {
    1e-2
}
fn default_abs_tol() -> f64 {
    1e-10
}
fn default_max_evals() -> usize {
    10_000
}

/// Geometry configuration from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct GeometryConfig {
    /// One or two lattice vectors in the xy-plane (μm).
    #[serde(default)]
    pub lattice: Option<Vec<[f64; 3]>>,
    #[serde(default)]
    pub surface: Vec<SurfaceConfig>,
    /// Transform file applied to the surfaces, relative to the job file.
    #[serde(default)]
    pub transforms_file: Option<String>,
    /// Lattice images per direction for periodic sums.
    #[serde(default = "default_image_cutoff")]
    pub image_cutoff: usize,
}

/// A single discretised surface.
#[derive(Debug, Deserialize)]
pub struct SurfaceConfig {
    pub label: String,
    /// Material identifier (e.g. "Au_Drude", "SiO2", or a `[[material]]` id).
    pub material: String,
    /// Node spacing in μm.
    pub spacing: f64,
    #[serde(flatten)]
    pub shape: ShapeConfig,
}

/// Shape specification: a primitive or a node file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ShapeConfig {
    Primitive {
        #[serde(rename = "type")]
        shape_type: String,
        #[serde(flatten)]
        params: toml::Value,
    },
    File {
        nodes_file: String,
    },
}

/// A labelled set of evaluation points.
#[derive(Debug, Deserialize)]
pub struct PointSetConfig {
    pub label: String,
    #[serde(flatten)]
    pub source: PointSource,
}

/// Evaluation points from a file or inline rows of 3 or 6 values.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PointSource {
    File { file: String },
    Inline { rows: Vec<Vec<f64>> },
}

/// A user-defined material model.
#[derive(Debug, Deserialize)]
pub struct MaterialConfig {
    pub id: String,
    #[serde(flatten)]
    pub model: MaterialModel,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum MaterialModel {
    Constant {
        /// `[Re ε, Im ε]`.
        epsilon: [f64; 2],
    },
    Drude {
        eps_inf: f64,
        omega_p: f64,
        gamma: f64,
        /// Lorentz terms `[strength, omega0, gamma]`.
        #[serde(default)]
        oscillators: Vec<[f64; 3]>,
    },
    /// Rows `λ/nm ε₁ ε₂` (or `λ/nm n k` with `columns = "nk"`).
    Tabulated {
        file: String,
        #[serde(default = "default_columns")]
        columns: String,
    },
}

fn default_columns() -> String {
    "eps".into()
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Result files are named `<file_base>[.<set label>].<suffix>`.
    #[serde(default = "default_file_base")]
    pub file_base: String,
    /// Whether to also save a JSON summary of the run (default: false).
    #[serde(default)]
    pub save_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            file_base: default_file_base(),
            save_json: false,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_file_base() -> String {
    "ldos".into()
}

impl FrequencySpec {
    /// Expand into the list of complex frequencies to sweep.
    pub fn omegas(&self) -> Vec<num_complex::Complex64> {
        use num_complex::Complex64;
        match self {
            Self::Range { range, points } => (0..*points)
                .map(|i| {
                    let t = i as f64 / (*points - 1).max(1) as f64;
                    Complex64::new(range[0] + (range[1] - range[0]) * t, 0.0)
                })
                .collect(),
            Self::List { values } => values.iter().map(|&w| Complex64::new(w, 0.0)).collect(),
            Self::Complex { complex } => complex.iter().map(|&[re, im]| Complex64::new(re, im)).collect(),
        }
    }
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read job file {}", path.display()))?;
    let config: JobConfig = toml::from_str(&content)
        .with_context(|| format!("Invalid job file {}", path.display()))?;
    Ok(config)
}
