//! Cubic spline interpolation for smooth material property curves.
//!
//! Tabulated permittivities are given at discrete frequencies. A natural
//! cubic spline provides a smooth $\epsilon(\omega)$ between the samples.

use crate::provider::MaterialError;

/// A natural cubic spline interpolator for real-valued data.
///
/// Given $n$ data points $(x_i, y_i)$, constructs piecewise cubic polynomials
/// with continuous first and second derivatives.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    /// Sorted x values (knots).
    xs: Vec<f64>,
    /// Corresponding y values.
    ys: Vec<f64>,
    /// Second derivatives at each knot.
    y2s: Vec<f64>,
}

impl CubicSpline {
    /// Construct a natural cubic spline.
    ///
    /// `xs` must be strictly increasing, of the same length as `ys`, and hold
    /// at least two points.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, MaterialError> {
        if xs.len() != ys.len() {
            return Err(MaterialError::DataError(format!(
                "spline needs equal-length data, got {} x and {} y values",
                xs.len(),
                ys.len()
            )));
        }
        if xs.len() < 2 {
            return Err(MaterialError::DataError("spline needs at least 2 data points".into()));
        }
        if let Some(i) = (1..xs.len()).find(|&i| xs[i] <= xs[i - 1]) {
            return Err(MaterialError::DataError(format!(
                "spline abscissae must be strictly increasing (index {})",
                i
            )));
        }

        let n = xs.len();
        let mut y2s = vec![0.0; n];
        let mut u = vec![0.0; n - 1];

        // Forward sweep of the tridiagonal system
        for i in 1..n - 1 {
            let sig = (xs[i] - xs[i - 1]) / (xs[i + 1] - xs[i - 1]);
            let p = sig * y2s[i - 1] + 2.0;
            y2s[i] = (sig - 1.0) / p;
            u[i] = (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i])
                - (ys[i] - ys[i - 1]) / (xs[i] - xs[i - 1]);
            u[i] = (6.0 * u[i] / (xs[i + 1] - xs[i - 1]) - sig * u[i - 1]) / p;
        }

        // Back substitution
        for k in (0..n - 2).rev() {
            y2s[k + 1] = y2s[k + 1] * y2s[k + 2] + u[k + 1];
        }

        Ok(Self { xs, ys, y2s })
    }

    /// Data range `(min, max)` of the knots.
    pub fn range(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    /// Evaluate the spline at `x`.
    ///
    /// Extrapolation beyond the data range uses the boundary polynomial.
    pub fn evaluate(&self, x: f64) -> f64 {
        let n = self.xs.len();

        let mut lo = 0;
        let mut hi = n - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.xs[mid] > x {
                hi = mid;
            } else {
                lo = mid;
            }
        }

        let h = self.xs[hi] - self.xs[lo];
        let a = (self.xs[hi] - x) / h;
        let b = (x - self.xs[lo]) / h;

        a * self.ys[lo]
            + b * self.ys[hi]
            + ((a * a * a - a) * self.y2s[lo] + (b * b * b - b) * self.y2s[hi]) * h * h / 6.0
    }
}
