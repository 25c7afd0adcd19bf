//! Perfectly conducting ground plane at `z = 0`.
//!
//! By the image method the reflected field of an electric dipole $\mathbf{p}$
//! at $\mathbf{x}'$ is that of a dipole $\mathbf{R}_E\mathbf{p}$ at the
//! mirrored point, $\mathbf{R}_E = \operatorname{diag}(-1, -1, +1)$. A
//! magnetic dipole images with $\mathbf{R}_M = \operatorname{diag}(+1, +1, -1)$.

use ndarray::Array2;
use num_complex::Complex64;

use super::{SubstrateDgfs, SubstrateRequest, SubstrateSolver};
use crate::solver::dipole::greens::{
    cartesian_bloch, dyadic_greens_tensor, lattice_sum, self_term, ZERO_TENSOR,
};
use crate::solver::SolverError;

const ELECTRIC_IMAGE: [f64; 3] = [-1.0, -1.0, 1.0];
const MAGNETIC_IMAGE: [f64; 3] = [1.0, 1.0, -1.0];

/// Lattice images per direction on each side for periodic requests.
pub const DEFAULT_IMAGE_CUTOFF: usize = 4;

/// PEC ground plane.
#[derive(Debug, Clone)]
pub struct GroundPlane {
    pub image_cutoff: usize,
}

impl Default for GroundPlane {
    fn default() -> Self {
        Self {
            image_cutoff: DEFAULT_IMAGE_CUTOFF,
        }
    }
}

impl SubstrateSolver for GroundPlane {
    fn name(&self) -> &str {
        "ground plane"
    }

    fn substrate_dgfs(&self, request: &SubstrateRequest<'_>) -> Result<SubstrateDgfs, SolverError> {
        request.check_points_above_surface()?;
        let k = request.omega;
        let images = request
            .lattice
            .map_or_else(|| vec![[0.0; 3]], |l| l.images(self.image_cutoff));
        let k_cart = cartesian_bloch(request.lattice, request.k_bloch);
        let points = request.points;

        let mut values = Array2::zeros((points.len(), 18));
        for p in 0..points.len() {
            let x = points.observation(p);
            let src = points.source(p);
            let mirrored = [src[0], src[1], -src[2]];

            let mut free = ZERO_TENSOR;
            if !request.scattering_only {
                let (sum, coincident) =
                    lattice_sum(dyadic_greens_tensor, &x, &src, k, &images, &k_cart);
                free = sum;
                if coincident {
                    for d in 0..3 {
                        free[d][d] += self_term(k);
                    }
                }
            }
            let (reflected, _) =
                lattice_sum(dyadic_greens_tensor, &x, &mirrored, k, &images, &k_cart);

            for mu in 0..3 {
                for nu in 0..3 {
                    values[[p, 3 * mu + nu]] = free[mu][nu] + reflected[mu][nu] * ELECTRIC_IMAGE[nu];
                    values[[p, 9 + 3 * mu + nu]] =
                        free[mu][nu] + reflected[mu][nu] * MAGNETIC_IMAGE[nu];
                }
            }
        }
        Ok(SubstrateDgfs {
            values,
            errors: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EvaluationPoints, Tolerances};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn request(points: &EvaluationPoints, scattering_only: bool) -> SubstrateRequest<'_> {
        SubstrateRequest {
            points,
            omega: Complex64::new(2.0 * std::f64::consts::PI, 0.0),
            k_bloch: &[],
            lattice: None,
            tolerances: Tolerances::default(),
            scattering_only,
        }
    }

    #[test]
    fn test_near_plane_limits() {
        // Very close to a PEC the tangential electric LDOS vanishes and the
        // normal one doubles.
        let points = EvaluationPoints::new("z", array![[0.0, 0.0, 1e-3]]).unwrap();
        let dgfs = GroundPlane::default().substrate_dgfs(&request(&points, false)).unwrap();
        let free = self_term(Complex64::new(2.0 * std::f64::consts::PI, 0.0)).im;
        assert_abs_diff_eq!(dgfs.values[[0, 0]].im, 0.0, epsilon = 1e-3 * free);
        assert_abs_diff_eq!(dgfs.values[[0, 8]].im, 2.0 * free, epsilon = 1e-3 * free);
        // Magnetic: the reverse.
        assert_abs_diff_eq!(dgfs.values[[0, 9]].im, 2.0 * free, epsilon = 1e-3 * free);
        assert_abs_diff_eq!(dgfs.values[[0, 17]].im, 0.0, epsilon = 1e-3 * free);
        assert!(dgfs.errors.is_none());
    }

    #[test]
    fn test_scattering_only_drops_free_term() {
        let points = EvaluationPoints::new("z", array![[0.2, 0.1, 0.5]]).unwrap();
        let solver = GroundPlane::default();
        let full = solver.substrate_dgfs(&request(&points, false)).unwrap();
        let scattered = solver.substrate_dgfs(&request(&points, true)).unwrap();
        let free = self_term(Complex64::new(2.0 * std::f64::consts::PI, 0.0));
        let diagonal = full.values[[0, 4]] - scattered.values[[0, 4]];
        let off_diagonal = full.values[[0, 1]] - scattered.values[[0, 1]];
        assert_abs_diff_eq!((diagonal - free).norm(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(off_diagonal.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_points_below_plane_are_rejected() {
        let points = EvaluationPoints::new("z", array![[0.0, 0.0, -0.1]]).unwrap();
        assert!(matches!(
            GroundPlane::default().substrate_dgfs(&request(&points, false)),
            Err(SolverError::Configuration(_))
        ));
    }
}
