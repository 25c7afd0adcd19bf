//! Reduction of dyadic Green's functions to local densities of states.
//!
//! For each point, with $\Omega$ the complex angular frequency,
//!
//! $$\text{ELDOS} = \frac{|\Omega|}{\pi}\,\operatorname{Im}\operatorname{Tr}\mathbf{G}^E,
//! \qquad \text{MLDOS} = \frac{|\Omega|}{\pi}\,\operatorname{Im}\operatorname{Tr}\mathbf{G}^M.$$
//!
//! In full mode the 18 complex tensor entries follow as (Re, Im) pairs, GE
//! first, both row-major.

use ndarray::{Array2, ArrayView2};
use num_complex::Complex64;

use crate::solver::SolverError;
use crate::types::{FULL_STRIDE, LDOS_ONLY_STRIDE};

/// $|\Omega| / \pi$.
pub fn prefactor(omega: Complex64) -> f64 {
    omega.norm() / std::f64::consts::PI
}

/// Reduce an `(npoints, 18)` Green's-function matrix into `out`, which holds
/// `npoints * stride` values.
pub fn reduce_into(
    omega: Complex64,
    gfs: ArrayView2<'_, Complex64>,
    ldos_only: bool,
    out: &mut [f64],
) -> Result<(), SolverError> {
    let stride = if ldos_only { LDOS_ONLY_STRIDE } else { FULL_STRIDE };
    check_shape(gfs.dim(), stride, out.len())?;
    let pre = prefactor(omega);

    for (row, chunk) in gfs.outer_iter().zip(out.chunks_exact_mut(stride)) {
        chunk[0] = pre * (row[0] + row[4] + row[8]).im;
        chunk[1] = pre * (row[9] + row[13] + row[17]).im;
        if !ldos_only {
            for (q, z) in row.iter().enumerate() {
                chunk[2 + 2 * q] = z.re;
                chunk[3 + 2 * q] = z.im;
            }
        }
    }
    Ok(())
}

/// Reduce per-entry error estimates of the Green's functions to the result
/// layout. LDOS errors add the diagonal errors; each tensor entry reports its
/// error for both the real and the imaginary part.
pub fn reduce_errors_into(
    omega: Complex64,
    errors: &Array2<f64>,
    ldos_only: bool,
    out: &mut [f64],
) -> Result<(), SolverError> {
    let stride = if ldos_only { LDOS_ONLY_STRIDE } else { FULL_STRIDE };
    check_shape(errors.dim(), stride, out.len())?;
    let pre = prefactor(omega);

    for (row, chunk) in errors.outer_iter().zip(out.chunks_exact_mut(stride)) {
        chunk[0] = pre * (row[0] + row[4] + row[8]);
        chunk[1] = pre * (row[9] + row[13] + row[17]);
        if !ldos_only {
            for (q, e) in row.iter().enumerate() {
                chunk[2 + 2 * q] = *e;
                chunk[3 + 2 * q] = *e;
            }
        }
    }
    Ok(())
}

fn check_shape(dim: (usize, usize), stride: usize, out_len: usize) -> Result<(), SolverError> {
    if dim.1 != 18 || dim.0 * stride != out_len {
        return Err(SolverError::LinAlgError(format!(
            "cannot reduce a {}x{} Green's-function block into {} values of stride {}",
            dim.0, dim.1, out_len, stride
        )));
    }
    Ok(())
}
