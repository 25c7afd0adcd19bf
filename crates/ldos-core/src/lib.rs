//! # LDOS Core
//!
//! Local densities of states and dyadic Green's functions near scattering
//! geometries, evaluated one `(Omega, kBloch)` point at a time.
//!
//! ## Architecture
//!
//! An [`evaluate::LdosSolver`] owns a geometry, a scattering model and the
//! evaluation-point sets. Each call to [`evaluate::LdosSolver::evaluate`]
//! assembles the system matrix with the strategy chosen at setup, factorizes
//! it, asks the model for Green's functions at every point and reduces them
//! into an [`types::LdosResults`] buffer. A [`output::ResultWriter`] appends
//! those buffers to per-set text files.
//!
//! The model is anything implementing [`solver::BlockProvider`] and
//! [`solver::GreensFunctionEvaluator`]; [`solver::dipole::DipoleClusterModel`]
//! is the built-in one. Planar substrates with closed-form Green's functions
//! skip the matrix entirely through [`substrate::SubstrateSolver`].
//!
//! ## Modules
//!
//! - [`types`]: evaluation points, options, result buffers.
//! - [`solver`]: provider contracts, block assembly, LU solver, dipole model.
//! - [`substrate`]: ground-plane and dielectric half-space solvers.
//! - [`ldos`]: Green's functions to LDOS.
//! - [`evaluate`]: the per-point orchestrator.
//! - [`output`]: result files.

pub mod evaluate;
pub mod ldos;
pub mod output;
pub mod solver;
pub mod substrate;
pub mod types;

pub use evaluate::LdosSolver;
pub use solver::SolverError;
pub use types::{EvaluationPoints, LdosOptions, LdosResults, Tolerances};
