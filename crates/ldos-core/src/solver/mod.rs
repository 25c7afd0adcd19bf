//! System-matrix solver abstraction and the reference scattering model.
//!
//! The core never computes a kernel itself. It drives two contracts:
//!
//! - [`BlockProvider`] fills the per-surface-pair blocks of the system
//!   matrix at a given `(Omega, kBloch)`.
//! - [`GreensFunctionEvaluator`] turns a factored system matrix into dyadic
//!   Green's functions at evaluation points.
//!
//! [`dipole::DipoleClusterModel`] implements both for clusters of polarisable
//! points. Other kernels plug in by implementing the same traits.

pub mod assembly;
pub mod dipole;
pub mod direct;

use ldos_geometry::{Geometry, GeometryError, RigidMotion};
use ldos_materials::MaterialError;
use ndarray::Array2;
use num_complex::Complex64;
use thiserror::Error;

use crate::types::EvaluationPoints;
use assembly::{assemble_pairwise, BlockCaches, SystemMatrix};
use direct::FactoredMatrix;

/// Errors that can occur while evaluating the LDOS at one `(Omega, kBloch)`.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("System matrix is singular at Omega={omega}, kBloch={k_bloch:?}, transform '{transform}'")]
    SingularMatrix {
        omega: Complex64,
        k_bloch: Vec<f64>,
        transform: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cannot write {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Material(#[from] MaterialError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("Linear algebra error: {0}")]
    LinAlgError(String),

    #[error("Quadrature did not converge in {max_evals} evaluations (error {error:.2e}, tolerance {tolerance:.2e})")]
    Quadrature {
        max_evals: usize,
        error: f64,
        tolerance: f64,
    },

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Fills blocks of the system matrix.
///
/// Block `(a, b)` has `3 * nodes(a)` rows and `3 * nodes(b)` columns. Every
/// call receives the cache token of the unordered pair `{a, b}`; the core
/// hands tokens through untouched and the provider decides what to keep in
/// them between calls.
pub trait BlockProvider {
    /// Per-pair cache token.
    type Cache: Default + Send;

    /// Assemble block `(a, b)` of the system matrix.
    fn assemble_block(
        &self,
        geometry: &Geometry,
        a: usize,
        b: usize,
        omega: Complex64,
        k_bloch: &[f64],
        cache: &mut Self::Cache,
    ) -> Result<Array2<Complex64>, SolverError>;

    /// Produce block `(b, a)` from the already assembled block `(a, b)`
    /// without recomputing kernels. The default is the conjugate transpose.
    fn reciprocal_block(
        &self,
        _geometry: &Geometry,
        _a: usize,
        _b: usize,
        _omega: Complex64,
        _k_bloch: &[f64],
        forward: &Array2<Complex64>,
        _cache: &mut Self::Cache,
    ) -> Result<Array2<Complex64>, SolverError> {
        Ok(forward.t().mapv(|z| z.conj()))
    }

    /// Fill the whole matrix of an aperiodic geometry in one call.
    fn assemble_whole_matrix(
        &self,
        geometry: &Geometry,
        omega: Complex64,
        matrix: &mut SystemMatrix,
        caches: &mut BlockCaches<Self::Cache>,
    ) -> Result<(), SolverError> {
        assemble_pairwise(self, geometry, None, omega, &[], matrix, caches)
    }

    /// Whether the self block of a surface is unchanged when the surface is
    /// moved by `motion`.
    fn diagonal_block_invariant(&self, _motion: &RigidMotion) -> bool {
        true
    }
}

/// Computes dyadic Green's functions from a factored system matrix.
pub trait GreensFunctionEvaluator {
    /// Return an `(npoints, 18)` matrix: columns 0-8 hold the electric tensor
    /// $G^E_{\mu\nu}$ in row-major order, columns 9-17 the magnetic tensor.
    ///
    /// Three-column point sets give $G(\mathbf{x}, \mathbf{x})$; six-column
    /// sets give $G(\mathbf{x}, \mathbf{x}')$ with the source at the last
    /// three columns.
    fn dyadic_gfs(
        &self,
        geometry: &Geometry,
        omega: Complex64,
        k_bloch: &[f64],
        points: &EvaluationPoints,
        factored: &FactoredMatrix,
        scattering_only: bool,
    ) -> Result<Array2<Complex64>, SolverError>;
}
