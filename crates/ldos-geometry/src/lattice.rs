//! One- and two-dimensional Bravais lattices in the xy-plane.
//!
//! Periodic geometries repeat their unit cell along one or two lattice
//! vectors. A 1D Bloch vector is the single component `k` along the lattice
//! vector, a 2D one its Cartesian components `(kx, ky)`.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::geometry::GeometryError;

const TWO_PI: f64 = 2.0 * std::f64::consts::PI;

/// A lattice with 1 or 2 primitive vectors lying in the xy-plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    vectors: Vec<[f64; 3]>,
}

impl Lattice {
    pub fn new(vectors: Vec<[f64; 3]>) -> Result<Self, GeometryError> {
        if vectors.is_empty() || vectors.len() > 2 {
            return Err(GeometryError::InvalidLattice(format!(
                "expected 1 or 2 lattice vectors, got {}",
                vectors.len()
            )));
        }
        for v in &vectors {
            if v[2] != 0.0 {
                return Err(GeometryError::InvalidLattice(
                    "lattice vectors must lie in the xy-plane".into(),
                ));
            }
            if v[0] == 0.0 && v[1] == 0.0 {
                return Err(GeometryError::InvalidLattice("zero lattice vector".into()));
            }
        }
        let lattice = Self { vectors };
        if lattice.dimension() == 2 && lattice.cell_determinant().abs() <= f64::EPSILON {
            return Err(GeometryError::InvalidLattice(
                "primitive vectors are linearly dependent".into(),
            ));
        }
        Ok(lattice)
    }

    /// Square lattice of period `a`.
    pub fn square(a: f64) -> Result<Self, GeometryError> {
        Self::new(vec![[a, 0.0, 0.0], [0.0, a, 0.0]])
    }

    /// Number of periodic dimensions.
    pub fn dimension(&self) -> usize {
        self.vectors.len()
    }

    pub fn vectors(&self) -> &[[f64; 3]] {
        &self.vectors
    }

    fn cell_determinant(&self) -> f64 {
        let (a1, a2) = (self.vectors[0], self.vectors[1]);
        a1[0] * a2[1] - a1[1] * a2[0]
    }

    /// Reciprocal lattice vectors $\mathbf{b}_j$ with $\mathbf{a}_i\cdot\mathbf{b}_j = 2\pi\delta_{ij}$.
    pub fn reciprocal(&self) -> Vec<[f64; 3]> {
        match self.dimension() {
            1 => {
                let a = Vector3::from(self.vectors[0]);
                let b = a * (TWO_PI / a.norm_squared());
                vec![[b.x, b.y, 0.0]]
            }
            _ => {
                let (a1, a2) = (self.vectors[0], self.vectors[1]);
                let inv = TWO_PI / self.cell_determinant();
                vec![
                    [a2[1] * inv, -a2[0] * inv, 0.0],
                    [-a1[1] * inv, a1[0] * inv, 0.0],
                ]
            }
        }
    }

    /// Length (1D) or area (2D) of the real-space unit cell.
    pub fn unit_cell_volume(&self) -> f64 {
        match self.dimension() {
            1 => Vector3::from(self.vectors[0]).norm(),
            _ => self.cell_determinant().abs(),
        }
    }

    /// Length (1D) or area (2D) of the first Brillouin zone.
    pub fn brillouin_zone_volume(&self) -> f64 {
        TWO_PI.powi(self.dimension() as i32) / self.unit_cell_volume()
    }

    /// Cartesian lattice vector $\sum_i n_i \mathbf{a}_i$.
    pub fn lattice_vector(&self, n: &[i32]) -> [f64; 3] {
        let mut l = [0.0; 3];
        for (ni, a) in n.iter().zip(&self.vectors) {
            for d in 0..3 {
                l[d] += *ni as f64 * a[d];
            }
        }
        l
    }

    /// All lattice vectors with integer coefficients in `[-cutoff, cutoff]`,
    /// the origin first.
    pub fn images(&self, cutoff: usize) -> Vec<[f64; 3]> {
        let c = cutoff as i32;
        let mut images = vec![[0.0; 3]];
        match self.dimension() {
            1 => {
                for n1 in -c..=c {
                    if n1 != 0 {
                        images.push(self.lattice_vector(&[n1]));
                    }
                }
            }
            _ => {
                for n1 in -c..=c {
                    for n2 in -c..=c {
                        if n1 != 0 || n2 != 0 {
                            images.push(self.lattice_vector(&[n1, n2]));
                        }
                    }
                }
            }
        }
        images
    }

    /// Cartesian Bloch vector. In 1D the single component is taken along the
    /// unit lattice vector $\hat{\mathbf{a}}_1$.
    pub fn cartesian_bloch(&self, k_bloch: &[f64]) -> [f64; 3] {
        let component = |i: usize| k_bloch.get(i).copied().unwrap_or(0.0);
        match self.dimension() {
            1 => {
                let a = Vector3::from(self.vectors[0]).normalize();
                [component(0) * a.x, component(0) * a.y, 0.0]
            }
            _ => [component(0), component(1), 0.0],
        }
    }

    /// Bloch phase argument $\mathbf{k}\cdot\mathbf{L}$ for a Cartesian Bloch
    /// vector.
    pub fn bloch_phase(k_cartesian: &[f64; 3], l: &[f64; 3]) -> f64 {
        k_cartesian.iter().zip(l.iter()).map(|(k, x)| k * x).sum()
    }
}
