//! Polarisability of a single cubic cell.

use num_complex::Complex64;

/// Clausius-Mossotti polarisability of a cell of volume `volume` (μm³):
///
/// $\alpha_{\text{CM}} = 3 V \frac{\epsilon - \epsilon_m}{\epsilon + 2\epsilon_m}$
///
/// The vacuum permittivity is absorbed, so the result has units of volume.
pub fn clausius_mossotti(volume: f64, epsilon: Complex64, epsilon_m: Complex64) -> Complex64 {
    3.0 * volume * (epsilon - epsilon_m) / (epsilon + 2.0 * epsilon_m)
}

/// Radiative reaction correction, needed for energy conservation:
///
/// $\alpha = \frac{\alpha_{\text{CM}}}{1 - \frac{i k^3}{6\pi} \alpha_{\text{CM}}}$
pub fn radiative_correction(alpha_cm: Complex64, k: Complex64) -> Complex64 {
    let correction = Complex64::i() * k * k * k / (6.0 * std::f64::consts::PI);
    alpha_cm / (1.0 - correction * alpha_cm)
}
