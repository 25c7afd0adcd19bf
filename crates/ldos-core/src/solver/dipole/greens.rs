//! Free-space dyadic Green's functions at complex wavenumber.
//!
//! The electric dyadic Green's function in the normalisation used throughout
//! (vacuum permittivity absorbed into the polarisability) is
//!
//! $$
//! \mathbf{G}(\mathbf{r}, \mathbf{r}') = \frac{k^2 e^{ikR}}{4\pi R}
//! \left[ \left(1 + \frac{ikR - 1}{k^2 R^2}\right)\mathbf{I}
//! + \frac{3 - 3ikR - k^2 R^2}{k^2 R^2} \hat{\mathbf{R}}\hat{\mathbf{R}}^T \right]
//! $$
//!
//! with $\mathbf{R} = \mathbf{r} - \mathbf{r}'$. The magnetic field of an
//! electric dipole, and the electric field of a magnetic dipole up to sign,
//! follow from the curl dyadic
//!
//! $$
//! \mathbf{C}(\mathbf{r}, \mathbf{r}') = \frac{k^2 e^{ikR}}{4\pi R}
//! \left(1 - \frac{1}{ikR}\right) [\hat{\mathbf{R}}\times].
//! $$

use ldos_geometry::Lattice;
use num_complex::Complex64;

/// Stack-allocated 3×3 complex tensor.
pub type Tensor3x3 = [[Complex64; 3]; 3];

pub const ZERO_TENSOR: Tensor3x3 = [[Complex64::new(0.0, 0.0); 3]; 3];

/// Separations below this (μm) are treated as coincident.
pub const COINCIDENCE_TOLERANCE: f64 = 1e-12;

fn separation(r1: &[f64; 3], r2: &[f64; 3]) -> ([f64; 3], f64) {
    let d = [r1[0] - r2[0], r1[1] - r2[1], r1[2] - r2[2]];
    let r = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
    (d, r)
}

/// Electric dyadic Green's tensor between two distinct points.
///
/// Returns `None` when the points coincide.
pub fn dyadic_greens_tensor(r1: &[f64; 3], r2: &[f64; 3], k: Complex64) -> Option<Tensor3x3> {
    let (d, r) = separation(r1, r2);
    if r <= COINCIDENCE_TOLERANCE {
        return None;
    }

    let ikr = Complex64::i() * k * r;
    let kr_sq = (k * r) * (k * r);
    let prefactor = k * k * ikr.exp() / (4.0 * std::f64::consts::PI * r);

    let a = 1.0 + (ikr - 1.0) / kr_sq;
    let b = (3.0 - 3.0 * ikr - kr_sq) / kr_sq;
    let r_hat = [d[0] / r, d[1] / r, d[2] / r];

    let mut g = ZERO_TENSOR;
    for i in 0..3 {
        for j in 0..3 {
            let delta_ij = if i == j { 1.0 } else { 0.0 };
            g[i][j] = prefactor * (a * delta_ij + b * r_hat[i] * r_hat[j]);
        }
    }
    Some(g)
}

/// Curl dyadic between two distinct points; `None` when they coincide.
///
/// $\mathbf{C}^T(\mathbf{r}, \mathbf{r}') = \mathbf{C}(\mathbf{r}', \mathbf{r})$.
pub fn curl_greens_tensor(r1: &[f64; 3], r2: &[f64; 3], k: Complex64) -> Option<Tensor3x3> {
    let (d, r) = separation(r1, r2);
    if r <= COINCIDENCE_TOLERANCE {
        return None;
    }

    let ikr = Complex64::i() * k * r;
    let f = k * k * ikr.exp() / (4.0 * std::f64::consts::PI * r) * (1.0 - 1.0 / ikr);
    let (x, y, z) = (d[0] / r, d[1] / r, d[2] / r);
    let zero = Complex64::new(0.0, 0.0);
    Some([
        [zero, -f * z, f * y],
        [f * z, zero, -f * x],
        [-f * y, f * x, zero],
    ])
}

/// Regular part of $\mathbf{G}$ at coincident points, $\frac{ik^3}{6\pi}\mathbf{I}$.
pub fn self_term(k: Complex64) -> Complex64 {
    Complex64::i() * k * k * k / (6.0 * std::f64::consts::PI)
}

/// Cartesian Bloch vector on `lattice`, zero for compact geometries.
pub fn cartesian_bloch(lattice: Option<&Lattice>, k_bloch: &[f64]) -> [f64; 3] {
    lattice.map_or([0.0; 3], |l| l.cartesian_bloch(k_bloch))
}

/// Bloch phase factor $e^{i\mathbf{k}\cdot\mathbf{L}}$ for a Cartesian Bloch vector.
pub fn bloch_factor(k_cartesian: &[f64; 3], l: &[f64; 3]) -> Complex64 {
    Complex64::from_polar(1.0, Lattice::bloch_phase(k_cartesian, l))
}

/// Lattice sum $\sum_{\mathbf{L}} \mathbf{T}(\mathbf{r}, \mathbf{r}' + \mathbf{L})\,e^{i\mathbf{k}\cdot\mathbf{L}}$
/// of a tensor kernel over the given images, skipping coincident terms.
///
/// Returns the sum and whether a coincident term was skipped.
pub fn lattice_sum(
    kernel: impl Fn(&[f64; 3], &[f64; 3], Complex64) -> Option<Tensor3x3>,
    r: &[f64; 3],
    r_src: &[f64; 3],
    k: Complex64,
    images: &[[f64; 3]],
    k_cartesian: &[f64; 3],
) -> (Tensor3x3, bool) {
    let mut sum = ZERO_TENSOR;
    let mut coincident = false;
    for l in images {
        let shifted = [r_src[0] + l[0], r_src[1] + l[1], r_src[2] + l[2]];
        match kernel(r, &shifted, k) {
            Some(t) => {
                let phase = bloch_factor(k_cartesian, l);
                for i in 0..3 {
                    for j in 0..3 {
                        sum[i][j] += t[i][j] * phase;
                    }
                }
            }
            None => coincident = true,
        }
    }
    (sum, coincident)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn assert_tensor_eq(a: &Tensor3x3, b: &Tensor3x3, eps: f64) {
        for i in 0..3 {
            for j in 0..3 {
                assert_abs_diff_eq!(a[i][j].re, b[i][j].re, epsilon = eps);
                assert_abs_diff_eq!(a[i][j].im, b[i][j].im, epsilon = eps);
            }
        }
    }

    fn transpose(t: &Tensor3x3) -> Tensor3x3 {
        let mut out = ZERO_TENSOR;
        for i in 0..3 {
            for j in 0..3 {
                out[i][j] = t[j][i];
            }
        }
        out
    }

    #[test]
    fn test_greens_reciprocity() {
        let r1 = [0.0, 0.0, 0.0];
        let r2 = [0.3, 0.15, 0.1];
        let k = Complex64::new(2.0 * std::f64::consts::PI / 0.5, 0.05);

        let g_12 = dyadic_greens_tensor(&r1, &r2, k).unwrap();
        let g_21 = dyadic_greens_tensor(&r2, &r1, k).unwrap();
        assert_tensor_eq(&g_12, &transpose(&g_21), 1e-12);

        let c_12 = curl_greens_tensor(&r1, &r2, k).unwrap();
        let c_21 = curl_greens_tensor(&r2, &r1, k).unwrap();
        assert_tensor_eq(&c_12, &transpose(&c_21), 1e-12);
    }

    #[test]
    fn test_coincident_points_have_no_tensor() {
        let r = [1.0, 2.0, 3.0];
        let k = Complex64::new(1.0, 0.0);
        assert!(dyadic_greens_tensor(&r, &r, k).is_none());
        assert!(curl_greens_tensor(&r, &r, k).is_none());
    }

    #[test]
    fn test_imaginary_part_tends_to_self_term() {
        // Im G(r, r') -> k^3/(6 pi) I as r' -> r for real k.
        let k = Complex64::new(3.0, 0.0);
        let g = dyadic_greens_tensor(&[0.0; 3], &[1e-2, 0.0, 0.0], k).unwrap();
        let expected = self_term(k).im;
        for i in 0..3 {
            assert_abs_diff_eq!(g[i][i].im, expected, epsilon = 1e-2);
        }
    }

    #[test]
    fn test_far_field_is_transverse() {
        // At kR >> 1 the longitudinal component decays faster than the transverse ones.
        let k = Complex64::new(10.0, 0.0);
        let g = dyadic_greens_tensor(&[50.0, 0.0, 0.0], &[0.0; 3], k).unwrap();
        assert!(g[0][0].norm() < 0.01 * g[1][1].norm());
    }
}
