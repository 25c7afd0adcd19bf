//! Dielectric half-space filling `z < 0`.
//!
//! The reflected Green's function at a point a height $z$ above the
//! interface is diagonal, with Sommerfeld integrals over the in-plane
//! wavenumber $q$ ($k_z = \sqrt{k^2 - q^2}$):
//!
//! $$
//! G^E_{xx} = G^E_{yy} = \frac{i}{8\pi}\int_0^\infty \frac{q\,dq}{k_z}
//!   \left[k^2 r_s - k_z^2 r_p\right] e^{2ik_z z},
//! \qquad
//! G^E_{zz} = \frac{i}{4\pi}\int_0^\infty \frac{q\,dq}{k_z}\, q^2 r_p\, e^{2ik_z z}
//! $$
//!
//! with Fresnel coefficients $r_s = (k_z - k_{z2})/(k_z + k_{z2})$ and
//! $r_p = (\epsilon k_z - k_{z2})/(\epsilon k_z + k_{z2})$,
//! $k_{z2} = \sqrt{\epsilon k^2 - q^2}$. The magnetic tensor follows by
//! exchanging $r_s$ and $r_p$.
//!
//! The integral is split at $q = k$. The propagating part uses
//! $q = k\sin t$; the evanescent part uses $k_z = i\kappa$ with
//! $\kappa = s\,u/(1-u)$, $s = 1/(2z)$.

use std::f64::consts::{FRAC_PI_2, PI};
use std::sync::Arc;

use ldos_materials::MaterialProvider;
use ndarray::Array2;
use num_complex::Complex64;

use super::quadrature::{integrate, Estimate};
use super::{SubstrateDgfs, SubstrateRequest, SubstrateSolver};
use crate::solver::dipole::greens::self_term;
use crate::solver::SolverError;

/// Dielectric half-space.
#[derive(Clone)]
pub struct HalfSpace {
    material: Arc<dyn MaterialProvider>,
}

impl std::fmt::Debug for HalfSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HalfSpace")
            .field("material", &self.material.name())
            .finish()
    }
}

/// Reflected integrals `[E_xx, E_zz, M_xx, M_zz]` at one height.
type Reflected = Estimate<4>;

fn upper_sqrt(z: Complex64) -> Complex64 {
    let s = z.sqrt();
    if s.im < 0.0 {
        -s
    } else {
        s
    }
}

/// Integrand bracket `[E_xx, E_zz, M_xx, M_zz]` without the `q dq / k_z`
/// measure and prefactors.
fn brackets(k: Complex64, eps: Complex64, q2: Complex64, kz: Complex64, z: f64) -> [Complex64; 4] {
    let kz2 = upper_sqrt(eps * k * k - q2);
    let rs = (kz - kz2) / (kz + kz2);
    let rp = (eps * kz - kz2) / (eps * kz + kz2);
    let phase = (2.0 * Complex64::i() * kz * z).exp();
    let k2 = k * k;
    let kz_sq = kz * kz;
    [
        (k2 * rs - kz_sq * rp) * phase,
        q2 * rp * phase,
        (k2 * rp - kz_sq * rs) * phase,
        q2 * rs * phase,
    ]
}

impl HalfSpace {
    pub fn new(material: Arc<dyn MaterialProvider>) -> Self {
        Self { material }
    }

    fn reflected(
        &self,
        k: Complex64,
        eps: Complex64,
        z: f64,
        request: &SubstrateRequest<'_>,
    ) -> Result<Reflected, SolverError> {
        let tolerances = &request.tolerances;

        // 0 <= q <= k: q = k sin t, q dq / kz = k sin t dt.
        let propagating = integrate(
            |t| {
                let (s, c) = t.sin_cos();
                let q = k * s;
                let b = brackets(k, eps, q * q, k * c, z);
                b.map(|v| v * k * s)
            },
            0.0,
            FRAC_PI_2,
            tolerances,
        )?;

        // q >= k: kz = i kappa, q dq / kz = -i dkappa, kappa = scale u / (1 - u).
        let scale = 1.0 / (2.0 * z);
        let evanescent = integrate(
            |u| {
                if u >= 1.0 {
                    return [Complex64::new(0.0, 0.0); 4];
                }
                let kappa = scale * u / (1.0 - u);
                let jacobian = scale / ((1.0 - u) * (1.0 - u));
                let kz = Complex64::new(0.0, kappa);
                let b = brackets(k, eps, k * k + kappa * kappa, kz, z);
                b.map(|v| -Complex64::i() * v * jacobian)
            },
            0.0,
            1.0,
            tolerances,
        )?;

        let mut total = propagating;
        for c in 0..4 {
            total.value[c] += evanescent.value[c];
            total.error[c] += evanescent.error[c];
        }
        total.evaluations += evanescent.evaluations;
        Ok(total)
    }
}

impl SubstrateSolver for HalfSpace {
    fn name(&self) -> &str {
        "half-space"
    }

    fn substrate_dgfs(&self, request: &SubstrateRequest<'_>) -> Result<SubstrateDgfs, SolverError> {
        if request.lattice.is_some() {
            return Err(SolverError::Unsupported(
                "periodic evaluation above a dielectric half-space".into(),
            ));
        }
        if request.points.is_two_point() {
            return Err(SolverError::Unsupported(format!(
                "two-point Green's functions above a dielectric half-space (set '{}')",
                request.points.label
            )));
        }
        request.check_points_above_surface()?;

        let k = request.omega;
        let eps = self.material.permittivity(k)?;
        let points = request.points;
        let mut values = Array2::zeros((points.len(), 18));
        let mut errors = Array2::zeros((points.len(), 18));

        for p in 0..points.len() {
            let z = points.observation(p)[2];
            let reflected = self.reflected(k, eps, z, request)?;
            log::debug!(
                "Half-space integrals at z={} converged in {} evaluations",
                z,
                reflected.evaluations
            );

            let i = Complex64::i();
            let e_xx = i / (8.0 * PI) * reflected.value[0];
            let e_zz = i / (4.0 * PI) * reflected.value[1];
            let m_xx = i / (8.0 * PI) * reflected.value[2];
            let m_zz = i / (4.0 * PI) * reflected.value[3];
            let err_xx = reflected.error[0] / (8.0 * PI);
            let err_zz = reflected.error[1] / (4.0 * PI);
            let err_mxx = reflected.error[2] / (8.0 * PI);
            let err_mzz = reflected.error[3] / (4.0 * PI);

            let free = if request.scattering_only {
                Complex64::new(0.0, 0.0)
            } else {
                self_term(k)
            };
            let diagonal = [
                (0, e_xx, err_xx, m_xx, err_mxx),
                (1, e_xx, err_xx, m_xx, err_mxx),
                (2, e_zz, err_zz, m_zz, err_mzz),
            ];
            for (d, e, e_err, m, m_err) in diagonal {
                values[[p, 4 * d]] = free + e;
                values[[p, 9 + 4 * d]] = free + m;
                errors[[p, 4 * d]] = e_err;
                errors[[p, 9 + 4 * d]] = m_err;
            }
        }

        Ok(SubstrateDgfs {
            values,
            errors: Some(errors),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::ground_plane::GroundPlane;
    use crate::types::{EvaluationPoints, Tolerances};
    use ldos_materials::analytic::ConstantMaterial;
    use ndarray::array;

    fn request(points: &EvaluationPoints, omega: f64) -> SubstrateRequest<'_> {
        SubstrateRequest {
            points,
            omega: Complex64::new(omega, 0.0),
            k_bloch: &[],
            lattice: None,
            tolerances: Tolerances {
                rel_tol: 1e-6,
                abs_tol: 1e-12,
                max_evals: 200_000,
            },
            scattering_only: true,
        }
    }

    #[test]
    fn test_vacuum_half_space_reflects_nothing() {
        let vacuum = HalfSpace::new(Arc::new(ConstantMaterial::vacuum()));
        let points = EvaluationPoints::new("z", array![[0.0, 0.0, 0.3]]).unwrap();
        let dgfs = vacuum.substrate_dgfs(&request(&points, 2.0)).unwrap();
        assert!(dgfs.values.iter().all(|v| v.norm() < 1e-12));
    }

    #[test]
    fn test_good_conductor_approaches_ground_plane() {
        let metal = HalfSpace::new(Arc::new(ConstantMaterial::new(
            "metal",
            Complex64::new(-1e6, 1e6),
        )));
        let points = EvaluationPoints::new("z", array![[0.0, 0.0, 0.2]]).unwrap();
        let omega = 3.0;
        let req = request(&points, omega);
        let half = metal.substrate_dgfs(&req).unwrap();
        let pec = GroundPlane::default().substrate_dgfs(&req).unwrap();
        for col in [0, 4, 8, 9, 13, 17] {
            let (a, b) = (half.values[[0, col]], pec.values[[0, col]]);
            assert!((a - b).norm() < 2e-2 * b.norm(), "column {}: {} vs {}", col, a, b);
        }
        let errors = half.errors.unwrap();
        assert!(errors[[0, 0]] <= 1e-4 * half.values[[0, 0]].norm());
    }

    #[test]
    fn test_lossy_substrate_increases_ldos() {
        let lossy = HalfSpace::new(Arc::new(ConstantMaterial::new(
            "lossy",
            Complex64::new(2.0, 1.5),
        )));
        let points = EvaluationPoints::new("z", array![[0.0, 0.0, 0.05]]).unwrap();
        let dgfs = lossy.substrate_dgfs(&request(&points, 2.0)).unwrap();
        // Near-field absorption dominates: reflected Im G is positive.
        for col in [0, 4, 8] {
            assert!(dgfs.values[[0, col]].im > 0.0);
        }
    }

    #[test]
    fn test_periodic_and_two_point_requests_are_unsupported() {
        let solver = HalfSpace::new(Arc::new(ConstantMaterial::vacuum()));
        let pair = EvaluationPoints::new("p", array![[0.0, 0.0, 0.3, 0.1, 0.0, 0.3]]).unwrap();
        assert!(matches!(
            solver.substrate_dgfs(&request(&pair, 2.0)),
            Err(SolverError::Unsupported(_))
        ));

        let single = EvaluationPoints::new("s", array![[0.0, 0.0, 0.3]]).unwrap();
        let lattice = ldos_geometry::Lattice::square(1.0).unwrap();
        let mut req = request(&single, 2.0);
        req.lattice = Some(&lattice);
        assert!(matches!(solver.substrate_dgfs(&req), Err(SolverError::Unsupported(_))));
    }
}
