//! Tabulated dielectric functions interpolated in frequency.
//!
//! Handbook data is usually listed against vacuum wavelength in nm. The
//! constructors here convert each row to angular frequency in units of
//! $c/1\,\mu\text{m}$, $\omega = 2\pi \cdot 1000 / \lambda_{\text{nm}}$, and
//! interpolate the real and imaginary parts of $\epsilon$ separately with
//! natural cubic splines.
//!
//! Complex frequencies are evaluated at their real part; tabulated data
//! carries no analytic continuation.
//!
//! ## Built-in datasets
//!
//! | Identifier | Constructor | Range |
//! |-----------|-------------|-------|
//! | `Au_JC` | [`TabulatedMaterial::gold_johnson_christy()`] | 400–800 nm |
//! | `SiO2_Palik` | [`TabulatedMaterial::sio2_palik()`] | 300–1000 nm |

use num_complex::Complex64;

use crate::provider::{MaterialError, MaterialProvider};
use crate::spline::CubicSpline;

/// Convert a vacuum wavelength in nm to angular frequency in c/μm.
pub fn omega_from_wavelength_nm(wavelength_nm: f64) -> f64 {
    2.0 * std::f64::consts::PI * 1000.0 / wavelength_nm
}

/// Material with spline-interpolated $\epsilon(\omega)$.
#[derive(Debug, Clone)]
pub struct TabulatedMaterial {
    name: String,
    spline_real: CubicSpline,
    spline_imag: CubicSpline,
}

impl TabulatedMaterial {
    /// Construct from samples `(omega, eps)` with `omega` strictly increasing.
    pub fn new(
        name: impl Into<String>,
        omegas: Vec<f64>,
        eps_real: Vec<f64>,
        eps_imag: Vec<f64>,
    ) -> Result<Self, MaterialError> {
        let spline_real = CubicSpline::new(omegas.clone(), eps_real)?;
        let spline_imag = CubicSpline::new(omegas, eps_imag)?;
        Ok(Self {
            name: name.into(),
            spline_real,
            spline_imag,
        })
    }

    /// Construct from rows `(λ/nm, ε₁, ε₂)` sorted by increasing wavelength.
    pub fn from_wavelength_eps(
        name: impl Into<String>,
        rows: &[(f64, f64, f64)],
    ) -> Result<Self, MaterialError> {
        // Increasing wavelength is decreasing frequency.
        let rows = rows.iter().rev();
        let omegas = rows.clone().map(|&(lam, _, _)| omega_from_wavelength_nm(lam)).collect();
        let eps_real = rows.clone().map(|&(_, e1, _)| e1).collect();
        let eps_imag = rows.map(|&(_, _, e2)| e2).collect();
        Self::new(name, omegas, eps_real, eps_imag)
    }

    /// Construct from rows `(λ/nm, n, k)`, using $\epsilon_1 = n^2 - k^2$ and
    /// $\epsilon_2 = 2nk$.
    pub fn from_wavelength_nk(
        name: impl Into<String>,
        rows: &[(f64, f64, f64)],
    ) -> Result<Self, MaterialError> {
        let eps: Vec<(f64, f64, f64)> = rows
            .iter()
            .map(|&(lam, n, k)| (lam, n * n - k * k, 2.0 * n * k))
            .collect();
        Self::from_wavelength_eps(name, &eps)
    }

    /// Gold, Johnson & Christy, *Phys. Rev. B* **6**, 4370 (1972).
    pub fn gold_johnson_christy() -> Result<Self, MaterialError> {
        // (λ/nm, ε₁, ε₂)
        let data: &[(f64, f64, f64)] = &[
            (400.0, -1.66, 5.29),
            (450.0, -1.95, 4.01),
            (500.0, -2.83, 3.07),
            (550.0, -5.42, 2.26),
            (600.0, -9.64, 1.66),
            (650.0, -14.05, 1.36),
            (700.0, -18.47, 1.18),
            (750.0, -23.08, 1.10),
            (800.0, -28.24, 1.08),
        ];
        Self::from_wavelength_eps("Au (Johnson & Christy)", data)
    }

    /// Fused silica from Palik, *Handbook of Optical Constants of Solids* (1985).
    pub fn sio2_palik() -> Result<Self, MaterialError> {
        // (λ/nm, n, k)
        let data: &[(f64, f64, f64)] = &[
            (300.0, 1.487, 0.0),
            (340.0, 1.478, 0.0),
            (380.0, 1.473, 0.0),
            (400.0, 1.470, 0.0),
            (440.0, 1.468, 0.0),
            (500.0, 1.462, 0.0),
            (560.0, 1.459, 0.0),
            (600.0, 1.458, 0.0),
            (660.0, 1.456, 0.0),
            (700.0, 1.455, 0.0),
            (760.0, 1.453, 0.0),
            (800.0, 1.452, 0.0),
            (860.0, 1.451, 0.0),
            (900.0, 1.450, 0.0),
            (960.0, 1.449, 0.0),
            (1000.0, 1.448, 0.0),
        ];
        Self::from_wavelength_nk("SiO₂ (Palik)", data)
    }

    /// Frequency range `(min, max)` covered by the data, in c/μm.
    pub fn omega_range(&self) -> (f64, f64) {
        self.spline_real.range()
    }
}

impl MaterialProvider for TabulatedMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn permittivity(&self, omega: Complex64) -> Result<Complex64, MaterialError> {
        let w = omega.re;
        let (min, max) = self.omega_range();
        if w < min || w > max {
            return Err(MaterialError::OutOfRange { omega: w, min, max });
        }
        Ok(Complex64::new(
            self.spline_real.evaluate(w),
            self.spline_imag.evaluate(w),
        ))
    }
}
