//! Dense LU factorization of the system matrix.
//!
//! Uses partial-pivoting LU via `faer`. The factorization is rejected when
//! the matrix is singular to working precision: a non-finite entry, or a
//! pivot $|u_{ii}| \le n\,\varepsilon \max|u|$.

use faer::complex_native::c64;
use faer::linalg::solvers::{PartialPivLu, SpSolver};
use faer::Mat;
use ndarray::Array2;
use num_complex::Complex64;

use super::assembly::SystemMatrix;
use super::SolverError;

/// An LU-factored system matrix, ready for repeated solves.
pub struct FactoredMatrix {
    lu: PartialPivLu<c64>,
    dim: usize,
}

impl std::fmt::Debug for FactoredMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoredMatrix").field("dim", &self.dim).finish()
    }
}

fn to_faer(z: Complex64) -> c64 {
    c64::new(z.re, z.im)
}

fn from_faer(z: c64) -> Complex64 {
    Complex64::new(z.re, z.im)
}

impl SystemMatrix {
    /// Factorize the current contents of the matrix.
    ///
    /// Fails with [`SolverError::LinAlgError`] when the matrix is singular to
    /// working precision; the caller attaches the evaluation identity.
    pub fn factorize(&self) -> Result<FactoredMatrix, SolverError> {
        factorize_dense(self.as_array())
    }
}

/// Factorize a dense square matrix.
pub fn factorize_dense(matrix: &Array2<Complex64>) -> Result<FactoredMatrix, SolverError> {
    let dim = matrix.nrows();
    if dim != matrix.ncols() {
        return Err(SolverError::LinAlgError(format!(
            "matrix is {}x{}, expected square",
            dim,
            matrix.ncols()
        )));
    }
    if dim == 0 {
        return Err(SolverError::LinAlgError("cannot factorize an empty matrix".into()));
    }
    if matrix.iter().any(|z| !z.re.is_finite() || !z.im.is_finite()) {
        return Err(SolverError::LinAlgError("matrix has non-finite entries".into()));
    }

    let faer_mat = Mat::<c64>::from_fn(dim, dim, |i, j| to_faer(matrix[[i, j]]));
    let lu = faer_mat.partial_piv_lu();

    let u = lu.compute_u();
    let mut max_u = 0.0_f64;
    for j in 0..dim {
        for i in 0..=j {
            max_u = max_u.max(from_faer(u.read(i, j)).norm());
        }
    }
    let threshold = dim as f64 * f64::EPSILON * max_u;
    for i in 0..dim {
        let pivot = from_faer(u.read(i, i)).norm();
        if !pivot.is_finite() || pivot <= threshold {
            return Err(SolverError::LinAlgError(format!(
                "matrix is singular to working precision (pivot {} is {:.3e})",
                i, pivot
            )));
        }
    }

    Ok(FactoredMatrix { lu, dim })
}

impl FactoredMatrix {
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Solve $A X = B$ for every column of `rhs`.
    pub fn solve(&self, rhs: &Array2<Complex64>) -> Result<Array2<Complex64>, SolverError> {
        if rhs.nrows() != self.dim {
            return Err(SolverError::LinAlgError(format!(
                "right-hand side has {} rows, system has {}",
                rhs.nrows(),
                self.dim
            )));
        }
        let faer_rhs = Mat::<c64>::from_fn(rhs.nrows(), rhs.ncols(), |i, j| to_faer(rhs[[i, j]]));
        let solution = self.lu.solve(&faer_rhs);
        Ok(Array2::from_shape_fn(rhs.dim(), |(i, j)| from_faer(solution.read(i, j))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_solve_identity_system() {
        let dim = 6;
        let mut matrix = Array2::<Complex64>::zeros((dim, dim));
        for i in 0..dim {
            matrix[[i, i]] = Complex64::from(1.0);
        }
        let rhs = Array2::from_shape_fn((dim, 2), |(i, j)| Complex64::new(i as f64, j as f64));

        let sol = factorize_dense(&matrix).unwrap().solve(&rhs).unwrap();
        for (x, b) in sol.iter().zip(rhs.iter()) {
            assert!((x - b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_solve_complex_system() {
        let matrix = array![
            [Complex64::new(1.0, 1.0), Complex64::new(2.0, 0.0)],
            [Complex64::new(0.0, 1.0), Complex64::new(3.0, -1.0)],
        ];
        let rhs = array![[Complex64::new(5.0, 1.0)], [Complex64::new(4.0, 2.0)]];

        let sol = factorize_dense(&matrix).unwrap().solve(&rhs).unwrap();

        let check = matrix.dot(&sol);
        for i in 0..2 {
            assert!(
                (check[[i, 0]] - rhs[[i, 0]]).norm() < 1e-10,
                "Mismatch at {}: got {:?}, expected {:?}",
                i,
                check[[i, 0]],
                rhs[[i, 0]]
            );
        }
    }

    #[test]
    fn test_singular_matrix_is_rejected() {
        let one = Complex64::new(1.0, 0.0);
        let matrix = array![[one, 2.0 * one], [2.0 * one, 4.0 * one]];
        assert!(matches!(factorize_dense(&matrix), Err(SolverError::LinAlgError(_))));

        let nan = array![[Complex64::new(f64::NAN, 0.0)]];
        assert!(factorize_dense(&nan).is_err());
    }
}
