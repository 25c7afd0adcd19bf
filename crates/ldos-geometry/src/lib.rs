//! # LDOS Geometry
//!
//! Geometry handling for the LDOS workspace. This crate provides:
//!
//! - **Surfaces and lattices** ([`geometry`], [`lattice`]): surfaces owning
//!   contiguous basis-function ranges, the mate relation between
//!   translation-equivalent surfaces, and 1D/2D lattices with their reciprocal
//!   lattice and Brillouin-zone volume.
//! - **Transformations** ([`transform`]): rigid motions, named geometry
//!   transforms, and the scoped [`transform::TransformGuard`] that restores
//!   the original placement when dropped.
//! - **Parametric primitives** ([`primitives`]) and **discretisation**
//!   ([`discretise`]) into node sets.
//! - **File parsers** ([`parsers`]): evaluation-point files and transform files.

pub mod discretise;
pub mod geometry;
pub mod lattice;
pub mod parsers;
pub mod primitives;
pub mod transform;

pub use geometry::{Geometry, GeometryError, Surface, UNKNOWNS_PER_NODE};
pub use lattice::Lattice;
pub use transform::{GeometryTransform, RigidMotion, TransformGuard};
