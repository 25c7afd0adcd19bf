//! Result files.
//!
//! One append-only text stream per `(file kind, point set)`. The header of a
//! stream is written the first time the stream is touched in a run and never
//! again; [`OutputStreamState`] carries those flags for the run's lifetime.
//!
//! Each row is
//!
//! ```text
//! x y z [x' y' z'] Re(Omega) Im(Omega) [tag] [kx [ky]] result... [error...]
//! ```
//!
//! The tag column appears only when more than one transform is configured.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use num_complex::Complex64;
use serde::Serialize;

use crate::solver::SolverError;
use crate::types::{EvaluationPoints, LdosResults};

/// Output stream kinds, distinguished by file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Single points, no Bloch vector.
    Ldos,
    /// Single points resolved by Bloch vector.
    ByOmegaKBloch,
    /// Point pairs, no Bloch vector.
    TwoPointDgf,
}

impl FileKind {
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Ldos => "LDOS",
            Self::ByOmegaKBloch => "byOmegakBloch",
            Self::TwoPointDgf => "2PDGF",
        }
    }

    /// Bloch-resolved output takes precedence over the point-pair kind.
    pub fn for_set(points: &EvaluationPoints, bloch_active: bool) -> Self {
        if bloch_active {
            Self::ByOmegaKBloch
        } else if points.is_two_point() {
            Self::TwoPointDgf
        } else {
            Self::Ldos
        }
    }
}

/// Which streams have had their header written during this run.
#[derive(Debug, Default, Clone)]
pub struct OutputStreamState {
    written: HashSet<(FileKind, usize)>,
}

impl OutputStreamState {
    pub fn header_written(&self, kind: FileKind, set: usize) -> bool {
        self.written.contains(&(kind, set))
    }

    fn mark_written(&mut self, kind: FileKind, set: usize) {
        self.written.insert((kind, set));
    }
}

/// Appends evaluation results to the per-set output streams.
#[derive(Debug)]
pub struct ResultWriter {
    directory: PathBuf,
    file_base: String,
    set_labels: Vec<String>,
    tags: Vec<String>,
    ldim: usize,
    state: OutputStreamState,
}

impl ResultWriter {
    /// `tags` are the configured transform tags, in evaluation order.
    pub fn new(
        directory: impl Into<PathBuf>,
        file_base: impl Into<String>,
        point_sets: &[EvaluationPoints],
        tags: Vec<String>,
        ldim: usize,
    ) -> Self {
        Self {
            directory: directory.into(),
            file_base: file_base.into(),
            set_labels: point_sets.iter().map(|s| s.label.clone()).collect(),
            tags,
            ldim,
            state: OutputStreamState::default(),
        }
    }

    pub fn state(&self) -> &OutputStreamState {
        &self.state
    }

    /// `<base>.<suffix>`, or `<base>.<label>.<suffix>` with several point sets.
    pub fn path(&self, kind: FileKind, set: usize) -> PathBuf {
        let name = if self.set_labels.len() > 1 {
            format!("{}.{}.{}", self.file_base, self.set_labels[set], kind.suffix())
        } else {
            format!("{}.{}", self.file_base, kind.suffix())
        };
        self.directory.join(name)
    }

    /// Append the rows of one evaluation call. Returns the paths written.
    pub fn write(
        &mut self,
        point_sets: &[EvaluationPoints],
        omega: Complex64,
        k_bloch: &[f64],
        results: &LdosResults,
    ) -> Result<Vec<PathBuf>, SolverError> {
        if point_sets.len() != self.set_labels.len() {
            return Err(SolverError::Configuration(format!(
                "writer was set up for {} point sets, got {}",
                self.set_labels.len(),
                point_sets.len()
            )));
        }
        let bloch_active = !k_bloch.is_empty();
        let mut paths = Vec::with_capacity(point_sets.len());

        for (set, points) in point_sets.iter().enumerate() {
            let kind = FileKind::for_set(points, bloch_active);
            let path = self.path(kind, set);
            let mut text = String::new();
            let needs_header = !self.state.header_written(kind, set);
            if needs_header {
                text.push_str(&self.header(points, results));
            }
            for t in 0..results.num_transforms() {
                let values = results.slice(t, set);
                let errors = results.error_slice(t, set);
                for p in 0..points.len() {
                    let run = p * results.stride..(p + 1) * results.stride;
                    let mut fields: Vec<String> =
                        points.row(p).iter().map(|x| format!("{:.6e}", x)).collect();
                    fields.push(format!("{:.6e}", omega.re));
                    fields.push(format!("{:.6e}", omega.im));
                    if self.tags.len() > 1 {
                        fields.push(self.tags[t].clone());
                    }
                    fields.extend(k_bloch.iter().map(|k| format!("{:.6e}", k)));
                    fields.extend(values[run.clone()].iter().map(|v| format!("{:.6e}", v)));
                    if let Some(errors) = errors {
                        fields.extend(errors[run].iter().map(|e| format!("{:.6e}", e)));
                    }
                    text.push_str(&fields.join(" "));
                    text.push('\n');
                }
            }

            append(&path, &text)?;
            if needs_header {
                self.state.mark_written(kind, set);
            }
            paths.push(path);
        }
        Ok(paths)
    }

    fn header(&self, points: &EvaluationPoints, results: &LdosResults) -> String {
        let mut columns: Vec<String> = vec!["x".into(), "y".into(), "z".into()];
        if points.is_two_point() {
            columns.extend(["x'".into(), "y'".into(), "z'".into()]);
        }
        columns.extend(["Re(Omega)".into(), "Im(Omega)".into()]);
        if self.tags.len() > 1 {
            columns.push("transform tag".into());
        }
        columns.extend(["kx", "ky"].iter().take(self.ldim).map(|s| s.to_string()));
        let result_columns = result_column_names(results.stride);
        columns.extend(result_columns.iter().cloned());
        if results.errors.is_some() {
            columns.extend(result_columns.iter().map(|c| format!("error in {}", c)));
        }

        let mut header = String::from("# data file columns:\n");
        for (i, c) in columns.iter().enumerate() {
            header.push_str(&format!("# {}: {}\n", i + 1, c));
        }
        header
    }
}

fn result_column_names(stride: usize) -> Vec<String> {
    let mut names = vec!["electric LDOS".to_string(), "magnetic LDOS".to_string()];
    if stride > 2 {
        let axes = ["x", "y", "z"];
        for field in ["GE", "GM"] {
            for mu in axes {
                for nu in axes {
                    names.push(format!("Re {}_{}{}", field, mu, nu));
                    names.push(format!("Im {}_{}{}", field, mu, nu));
                }
            }
        }
    }
    names
}

/// Append `text` with a single write on a file opened in append mode.
fn append(path: &Path, text: &str) -> Result<(), SolverError> {
    let output_error = |source| SolverError::Output {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(output_error)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(output_error)?;
    file.write_all(text.as_bytes()).map_err(output_error)
}

/// One evaluation call, as recorded in the JSON summary.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRecord {
    pub omega: [f64; 2],
    pub k_bloch: Vec<f64>,
    pub results: LdosResults,
}

/// Everything a run produced, for machine-readable post-processing.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub point_sets: Vec<String>,
    pub transforms: Vec<String>,
    pub stride: usize,
    pub evaluations: Vec<EvaluationRecord>,
}

/// Write a pretty-printed JSON summary.
pub fn write_json_summary(path: &Path, summary: &RunSummary) -> Result<(), SolverError> {
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| SolverError::Configuration(format!("JSON serialisation error: {}", e)))?;
    let output_error = |source| SolverError::Output {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(output_error)?;
    }
    std::fs::write(path, json).map_err(output_error)
}
