//! Analytic substrate Green's functions.
//!
//! When the scattering environment is a planar substrate with a closed-form
//! Green's function, no system matrix is assembled; the dyadic Green's
//! functions at each evaluation-point set come straight from a
//! [`SubstrateSolver`]. The substrate surface is the plane `z = 0` and the
//! evaluation points lie above it.

pub mod ground_plane;
pub mod half_space;
pub mod quadrature;

use ldos_geometry::Lattice;
use ndarray::Array2;
use num_complex::Complex64;

use crate::solver::SolverError;
use crate::types::{EvaluationPoints, Tolerances};

pub use ground_plane::GroundPlane;
pub use half_space::HalfSpace;

/// Everything a substrate solver needs for one point set.
#[derive(Debug, Clone, Copy)]
pub struct SubstrateRequest<'a> {
    pub points: &'a EvaluationPoints,
    pub omega: Complex64,
    /// Empty for compact (non-periodic) evaluations.
    pub k_bloch: &'a [f64],
    pub lattice: Option<&'a Lattice>,
    pub tolerances: Tolerances,
    pub scattering_only: bool,
}

impl SubstrateRequest<'_> {
    /// Unit-cell length or area of the lattice, if periodic.
    pub fn unit_cell_volume(&self) -> Option<f64> {
        self.lattice.map(Lattice::unit_cell_volume)
    }

    /// Reject evaluation points on or below the substrate surface.
    pub fn check_points_above_surface(&self) -> Result<(), SolverError> {
        for p in 0..self.points.len() {
            let (x, src) = (self.points.observation(p), self.points.source(p));
            if x[2] <= 0.0 || src[2] <= 0.0 {
                return Err(SolverError::Configuration(format!(
                    "point {} of set '{}' is not above the substrate (z <= 0)",
                    p + 1,
                    self.points.label
                )));
            }
        }
        Ok(())
    }
}

/// Substrate Green's functions: `values` is `(npoints, 18)` in the layout of
/// [`GreensFunctionEvaluator`](crate::solver::GreensFunctionEvaluator);
/// `errors`, when the solver estimates them, has the same shape.
#[derive(Debug, Clone)]
pub struct SubstrateDgfs {
    pub values: Array2<Complex64>,
    pub errors: Option<Array2<f64>>,
}

/// A closed-form substrate Green's-function solver.
pub trait SubstrateSolver: Send + Sync {
    fn name(&self) -> &str;

    fn substrate_dgfs(&self, request: &SubstrateRequest<'_>) -> Result<SubstrateDgfs, SolverError>;
}
