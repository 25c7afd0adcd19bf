//! Material property provider trait.
//!
//! All material models implement [`MaterialProvider`], which returns the
//! frequency-dependent complex relative permittivity.

use num_complex::Complex64;
use thiserror::Error;

/// Errors from material providers.
#[derive(Debug, Error)]
pub enum MaterialError {
    #[error("Frequency {omega} is outside the data range [{min}, {max}]")]
    OutOfRange { omega: f64, min: f64, max: f64 },

    #[error("Material not found: {0}")]
    NotFound(String),

    #[error("Data error: {0}")]
    DataError(String),
}

/// Provides frequency-dependent material properties.
pub trait MaterialProvider: Send + Sync {
    /// Human-readable name of this material.
    fn name(&self) -> &str;

    /// Complex relative permittivity $\epsilon(\omega)$.
    fn permittivity(&self, omega: Complex64) -> Result<Complex64, MaterialError>;

    /// Complex refractive index $\tilde{n} = \sqrt{\epsilon}$, branch with
    /// non-negative imaginary part.
    fn refractive_index(&self, omega: Complex64) -> Result<Complex64, MaterialError> {
        let n = self.permittivity(omega)?.sqrt();
        Ok(if n.im < 0.0 { -n } else { n })
    }
}
