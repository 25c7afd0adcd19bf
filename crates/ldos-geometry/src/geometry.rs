//! Surfaces and the scattering geometry.
//!
//! A [`Geometry`] is an ordered list of [`Surface`]s. Each surface owns a
//! contiguous range of basis-function indices in the system matrix, starting
//! at its `BFIndexOffset`. Every node of a surface carries a 3-vector unknown,
//! so a surface with $n$ nodes owns $3n$ basis functions.
//!
//! Two surfaces are *mates* when they share a material and their node sets
//! coincide up to a single translation. A mated surface has the same
//! self-interaction block as its mate, so the assembler only computes it once.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lattice::Lattice;

/// Number of scalar unknowns attached to each surface node.
pub const UNKNOWNS_PER_NODE: usize = 3;

/// Relative tolerance used when comparing node sets for the mate relation.
const MATE_TOLERANCE: f64 = 1e-10;

/// Errors raised while building or transforming a geometry.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("Surface '{0}' has no nodes")]
    EmptySurface(String),

    #[error("Duplicate surface label '{0}'")]
    DuplicateLabel(String),

    #[error("Transform '{tag}' references unknown surface '{label}'")]
    UnknownSurface { tag: String, label: String },

    #[error("Invalid lattice: {0}")]
    InvalidLattice(String),

    #[error("Invalid motion: {0}")]
    InvalidMotion(String),
}

/// A discretised surface: a labelled set of nodes made of one material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    /// Unique label, referenced by transforms.
    pub label: String,
    /// Material identifier resolved by the material registry.
    pub material: String,
    /// Node positions (μm).
    pub nodes: Vec<[f64; 3]>,
}

impl Surface {
    pub fn new(label: impl Into<String>, material: impl Into<String>, nodes: Vec<[f64; 3]>) -> Self {
        Self {
            label: label.into(),
            material: material.into(),
            nodes,
        }
    }

    /// Number of basis functions (system-matrix rows) owned by this surface.
    pub fn basis_functions(&self) -> usize {
        UNKNOWNS_PER_NODE * self.nodes.len()
    }

    /// Arithmetic mean of the node positions.
    pub fn centroid(&self) -> [f64; 3] {
        let n = self.nodes.len().max(1) as f64;
        let mut c = [0.0; 3];
        for p in &self.nodes {
            for d in 0..3 {
                c[d] += p[d];
            }
        }
        [c[0] / n, c[1] / n, c[2] / n]
    }

    /// Check whether `other` is this surface rigidly translated.
    fn is_translate_of(&self, other: &Surface) -> bool {
        if self.material != other.material || self.nodes.len() != other.nodes.len() {
            return false;
        }
        let Some((p0, q0)) = self.nodes.first().zip(other.nodes.first()) else {
            return false;
        };
        let shift = [q0[0] - p0[0], q0[1] - p0[1], q0[2] - p0[2]];
        let scale = self
            .nodes
            .iter()
            .flat_map(|p| p.iter())
            .fold(1.0_f64, |acc, x| acc.max(x.abs()));
        self.nodes.iter().zip(&other.nodes).all(|(p, q)| {
            (0..3).all(|d| (q[d] - p[d] - shift[d]).abs() <= MATE_TOLERANCE * scale)
        })
    }
}

/// The full scattering geometry.
#[derive(Debug, Clone)]
pub struct Geometry {
    surfaces: Vec<Surface>,
    bf_offsets: Vec<usize>,
    total_bfs: usize,
    mates: Vec<Option<usize>>,
    lattice: Option<Lattice>,
}

impl Geometry {
    /// Build a geometry, computing basis-function offsets and mates.
    ///
    /// An empty surface list is allowed; it describes a substrate-only
    /// environment where no system matrix is assembled.
    pub fn new(surfaces: Vec<Surface>, lattice: Option<Lattice>) -> Result<Self, GeometryError> {
        for (i, s) in surfaces.iter().enumerate() {
            if s.nodes.is_empty() {
                return Err(GeometryError::EmptySurface(s.label.clone()));
            }
            if surfaces[..i].iter().any(|t| t.label == s.label) {
                return Err(GeometryError::DuplicateLabel(s.label.clone()));
            }
        }

        let mut bf_offsets = Vec::with_capacity(surfaces.len());
        let mut total_bfs = 0;
        for s in &surfaces {
            bf_offsets.push(total_bfs);
            total_bfs += s.basis_functions();
        }

        let mates = (0..surfaces.len())
            .map(|j| (0..j).find(|&i| surfaces[i].is_translate_of(&surfaces[j])))
            .collect::<Vec<_>>();

        for (j, m) in mates.iter().enumerate() {
            if let Some(i) = m {
                log::debug!("Surface '{}' is a mate of '{}'", surfaces[j].label, surfaces[*i].label);
            }
        }

        Ok(Self {
            surfaces,
            bf_offsets,
            total_bfs,
            mates,
            lattice,
        })
    }

    pub fn num_surfaces(&self) -> usize {
        self.surfaces.len()
    }

    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    pub fn surface(&self, ns: usize) -> &Surface {
        &self.surfaces[ns]
    }

    /// Index of the surface with the given label.
    pub fn surface_index(&self, label: &str) -> Option<usize> {
        self.surfaces.iter().position(|s| s.label == label)
    }

    /// First system-matrix row owned by surface `ns`.
    pub fn bf_offset(&self, ns: usize) -> usize {
        self.bf_offsets[ns]
    }

    /// Total number of basis functions (system-matrix dimension).
    pub fn total_basis_functions(&self) -> usize {
        self.total_bfs
    }

    /// The lowest-indexed surface that `ns` is a translated copy of, if any.
    pub fn mate(&self, ns: usize) -> Option<usize> {
        self.mates[ns]
    }

    pub fn lattice(&self) -> Option<&Lattice> {
        self.lattice.as_ref()
    }

    /// Number of periodic dimensions (0 for compact geometries).
    pub fn ldim(&self) -> usize {
        self.lattice.as_ref().map_or(0, Lattice::dimension)
    }

    /// Number of unordered surface pairs `(ns, nsp)` with `ns <= nsp`.
    pub fn num_surface_pairs(&self) -> usize {
        let n = self.surfaces.len();
        n * (n + 1) / 2
    }

    /// Row-major index of the unordered pair `(ns, nsp)`, `ns <= nsp`.
    pub fn pair_index(&self, ns: usize, nsp: usize) -> usize {
        let (a, b) = if ns <= nsp { (ns, nsp) } else { (nsp, ns) };
        let n = self.surfaces.len();
        a * (2 * n - a + 1) / 2 + (b - a)
    }

    pub(crate) fn nodes_mut(&mut self, ns: usize) -> &mut Vec<[f64; 3]> {
        &mut self.surfaces[ns].nodes
    }
}
