//! Core types shared across the LDOS pipeline.
//!
//! Evaluation-point sets, run options and the flat result buffer produced by
//! one `(Omega, kBloch)` evaluation.

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::solver::SolverError;

/// Values per point in LDOS-only mode: `[ELDOS, MLDOS]`.
pub const LDOS_ONLY_STRIDE: usize = 2;

/// Values per point in full mode: two LDOS scalars, then (Re, Im) of the nine
/// electric tensor entries, then of the nine magnetic entries.
pub const FULL_STRIDE: usize = 2 + 2 * 9 + 2 * 9;

/// Integration tolerances for the analytic substrate path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerances {
    /// Relative error target.
    pub rel_tol: f64,
    /// Absolute error target.
    pub abs_tol: f64,
    /// Cap on integrand evaluations per integral.
    pub max_evals: usize,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            rel_tol: 1e-2,
            abs_tol: 1e-10,
            max_evals: 10_000,
        }
    }
}

/// Options fixed for a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdosOptions {
    /// Emit only `[ELDOS, MLDOS]` per point instead of the full tensors.
    pub ldos_only: bool,
    /// Drop the free-space contribution from the Green's functions.
    pub scattering_only: bool,
    /// Substrate quadrature tolerances.
    pub tolerances: Tolerances,
    /// Reuse self blocks across symmetry transforms.
    pub reuse_diagonal_blocks: bool,
}

impl Default for LdosOptions {
    fn default() -> Self {
        Self {
            ldos_only: false,
            scattering_only: false,
            tolerances: Tolerances::default(),
            reuse_diagonal_blocks: true,
        }
    }
}

impl LdosOptions {
    /// Number of result values per evaluation point.
    pub fn stride(&self) -> usize {
        if self.ldos_only {
            LDOS_ONLY_STRIDE
        } else {
            FULL_STRIDE
        }
    }
}

/// One set of evaluation records: `n x 3` single points or `n x 6` point pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationPoints {
    /// Label used to name this set's output stream.
    pub label: String,
    rows: Array2<f64>,
}

impl EvaluationPoints {
    pub fn new(label: impl Into<String>, rows: Array2<f64>) -> Result<Self, SolverError> {
        let label = label.into();
        if rows.ncols() != 3 && rows.ncols() != 6 {
            return Err(SolverError::Configuration(format!(
                "point set '{}' has {} columns; expected 3 or 6",
                label,
                rows.ncols()
            )));
        }
        Ok(Self { label, rows })
    }

    /// Build from parsed rows of equal width.
    pub fn from_rows(label: impl Into<String>, rows: &[Vec<f64>]) -> Result<Self, SolverError> {
        let label = label.into();
        let width = rows.first().map_or(3, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != width) {
            return Err(SolverError::Configuration(format!(
                "point set '{}': row {} has {} columns, expected {}",
                label,
                bad + 1,
                rows[bad].len(),
                width
            )));
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let array = Array2::from_shape_vec((rows.len(), width), flat)
            .map_err(|e| SolverError::Configuration(e.to_string()))?;
        Self::new(label, array)
    }

    pub fn len(&self) -> usize {
        self.rows.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.nrows() == 0
    }

    /// 3 or 6.
    pub fn width(&self) -> usize {
        self.rows.ncols()
    }

    /// True for point-pair (two-point Green's function) records.
    pub fn is_two_point(&self) -> bool {
        self.rows.ncols() == 6
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.rows.row(i)
    }

    pub fn rows(&self) -> &Array2<f64> {
        &self.rows
    }

    /// Observation point `x` of record `i`.
    pub fn observation(&self, i: usize) -> [f64; 3] {
        [self.rows[[i, 0]], self.rows[[i, 1]], self.rows[[i, 2]]]
    }

    /// Source point `x'` of record `i`; equals the observation point for
    /// single-point records.
    pub fn source(&self, i: usize) -> [f64; 3] {
        let o = if self.is_two_point() { 3 } else { 0 };
        [self.rows[[i, o]], self.rows[[i, o + 1]], self.rows[[i, o + 2]]]
    }
}

/// Flat result buffer of one evaluation call.
///
/// Runs of `stride` values are ordered by transform, then point set, then
/// point. `errors`, when present, has the same layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LdosResults {
    pub stride: usize,
    pub values: Vec<f64>,
    pub errors: Option<Vec<f64>>,
    /// Points per set, in set order.
    set_sizes: Vec<usize>,
}

impl LdosResults {
    /// Zero-filled buffer for `num_transforms` transforms over sets of the
    /// given sizes.
    pub fn zeros(stride: usize, num_transforms: usize, set_sizes: Vec<usize>) -> Self {
        let per_transform: usize = set_sizes.iter().sum::<usize>() * stride;
        Self {
            stride,
            values: vec![0.0; num_transforms * per_transform],
            errors: None,
            set_sizes,
        }
    }

    pub fn num_transforms(&self) -> usize {
        let per_transform = self.per_transform();
        if per_transform == 0 {
            0
        } else {
            self.values.len() / per_transform
        }
    }

    pub fn set_sizes(&self) -> &[usize] {
        &self.set_sizes
    }

    fn per_transform(&self) -> usize {
        self.set_sizes.iter().sum::<usize>() * self.stride
    }

    fn range(&self, transform: usize, set: usize) -> std::ops::Range<usize> {
        let start = transform * self.per_transform()
            + self.set_sizes[..set].iter().sum::<usize>() * self.stride;
        start..start + self.set_sizes[set] * self.stride
    }

    /// Results of one `(transform, point set)` pair, `points * stride` values.
    pub fn slice(&self, transform: usize, set: usize) -> &[f64] {
        &self.values[self.range(transform, set)]
    }

    pub fn slice_mut(&mut self, transform: usize, set: usize) -> &mut [f64] {
        let range = self.range(transform, set);
        &mut self.values[range]
    }

    /// Error estimates of one `(transform, point set)` pair.
    pub fn error_slice(&self, transform: usize, set: usize) -> Option<&[f64]> {
        let range = self.range(transform, set);
        self.errors.as_ref().map(|e| &e[range])
    }

    /// Error slice for writing, allocating the zeroed error buffer on first use.
    pub fn error_slice_mut(&mut self, transform: usize, set: usize) -> &mut [f64] {
        let range = self.range(transform, set);
        let len = self.values.len();
        &mut self.errors.get_or_insert_with(|| vec![0.0; len])[range]
    }
}
