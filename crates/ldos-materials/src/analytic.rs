//! Closed-form permittivity models.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::provider::{MaterialError, MaterialProvider};

/// A frequency-independent permittivity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantMaterial {
    pub name: String,
    pub epsilon: Complex64,
}

impl ConstantMaterial {
    pub fn new(name: impl Into<String>, epsilon: Complex64) -> Self {
        Self {
            name: name.into(),
            epsilon,
        }
    }

    pub fn vacuum() -> Self {
        Self::new("vacuum", Complex64::new(1.0, 0.0))
    }
}

impl MaterialProvider for ConstantMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn permittivity(&self, _omega: Complex64) -> Result<Complex64, MaterialError> {
        Ok(self.epsilon)
    }
}

/// One Lorentz oscillator term $\Delta\epsilon\,\omega_0^2 / (\omega_0^2 - \omega^2 - i\gamma\omega)$.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LorentzTerm {
    pub strength: f64,
    pub omega0: f64,
    pub gamma: f64,
}

/// Drude metal with optional Lorentz oscillators:
///
/// $$\epsilon(\omega) = \epsilon_\infty - \frac{\omega_p^2}{\omega(\omega + i\gamma)}
///   + \sum_j \frac{\Delta\epsilon_j\,\omega_j^2}{\omega_j^2 - \omega^2 - i\gamma_j\omega}$$
///
/// Passive (Im ε ≥ 0) for real positive frequencies when all damping rates
/// are non-negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrudeLorentzMaterial {
    pub name: String,
    pub eps_inf: f64,
    pub omega_p: f64,
    pub gamma: f64,
    #[serde(default)]
    pub oscillators: Vec<LorentzTerm>,
}

impl DrudeLorentzMaterial {
    pub fn drude(name: impl Into<String>, eps_inf: f64, omega_p: f64, gamma: f64) -> Self {
        Self {
            name: name.into(),
            eps_inf,
            omega_p,
            gamma,
            oscillators: Vec::new(),
        }
    }

    /// Gold, $\omega_p = 1.37\times10^{16}$ rad/s, $\gamma = 5.32\times10^{13}$ rad/s.
    pub fn gold() -> Self {
        Self::drude("Au (Drude)", 1.0, 45.698, 0.17746)
    }

    /// Silver, $\omega_p = 1.39\times10^{16}$ rad/s, $\gamma = 2.7\times10^{13}$ rad/s.
    pub fn silver() -> Self {
        Self::drude("Ag (Drude)", 1.0, 46.365, 0.090063)
    }

    pub fn with_oscillator(mut self, strength: f64, omega0: f64, gamma: f64) -> Self {
        self.oscillators.push(LorentzTerm { strength, omega0, gamma });
        self
    }
}

impl MaterialProvider for DrudeLorentzMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn permittivity(&self, omega: Complex64) -> Result<Complex64, MaterialError> {
        if omega.norm() == 0.0 && self.omega_p != 0.0 {
            return Err(MaterialError::DataError(format!(
                "{}: Drude term diverges at zero frequency",
                self.name
            )));
        }
        let i = Complex64::i();
        let mut eps = Complex64::from(self.eps_inf);
        if self.omega_p != 0.0 {
            eps -= self.omega_p * self.omega_p / (omega * (omega + i * self.gamma));
        }
        for osc in &self.oscillators {
            let w0sq = osc.omega0 * osc.omega0;
            eps += osc.strength * w0sq / (w0sq - omega * omega - i * osc.gamma * omega);
        }
        Ok(eps)
    }
}
