//! # LDOS Materials
//!
//! Permittivity models for the LDOS workspace. Every model implements
//! [`MaterialProvider`](provider::MaterialProvider), which returns the
//! complex relative permittivity at a complex angular frequency $\omega$
//! given in units of $c / 1\,\mu\text{m}$ (about $3\times 10^{14}$ rad/s).
//!
//! ## Available models
//!
//! | Model | Module |
//! |-------|--------|
//! | Constant $\epsilon$ | [`analytic::ConstantMaterial`] |
//! | Drude–Lorentz | [`analytic::DrudeLorentzMaterial`] |
//! | Tabulated $(\omega, \epsilon)$, spline-interpolated | [`tabulated::TabulatedMaterial`] |
//!
//! Materials are looked up by identifier through a
//! [`MaterialRegistry`](registry::MaterialRegistry).

pub mod analytic;
pub mod provider;
pub mod registry;
pub mod spline;
pub mod tabulated;

/// One unit of angular frequency, $c / 1\,\mu\text{m}$, in rad/s.
pub const OMEGA_UNIT_RAD_PER_S: f64 = 2.997_924_58e14;

pub use provider::{MaterialError, MaterialProvider};
pub use registry::MaterialRegistry;
