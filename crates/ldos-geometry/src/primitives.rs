//! Parametric shapes used to build surfaces from a job file.
//!
//! Each primitive bounds a closed region of space; [`crate::discretise`]
//! fills it with a cubic grid of nodes that becomes one [`crate::Surface`].

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// A shape that can be discretised into surface nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Primitive {
    Sphere(Sphere),
    Cylinder(Cylinder),
    Cuboid(Cuboid),
    Ellipsoid(Ellipsoid),
}

/// A sphere defined by its centre and radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    /// Centre position (μm).
    pub centre: [f64; 3],
    /// Radius (μm).
    pub radius: f64,
}

/// A finite cylinder defined by its base centre, axis, length and radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cylinder {
    /// Centre of the bottom end-cap (μm).
    pub base_centre: [f64; 3],
    /// Axis direction (normalised internally).
    pub axis: [f64; 3],
    /// Length along the axis (μm).
    pub length: f64,
    /// Radius (μm).
    pub radius: f64,
}

/// An axis-aligned cuboid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cuboid {
    pub centre: [f64; 3],
    /// Half-extents along x, y, z (μm).
    pub half_extents: [f64; 3],
}

/// An axis-aligned ellipsoid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    pub centre: [f64; 3],
    /// Semi-axis lengths along x, y, z (μm).
    pub semi_axes: [f64; 3],
}

impl Primitive {
    /// Check whether a point lies inside this primitive.
    pub fn contains(&self, point: &[f64; 3]) -> bool {
        match self {
            Primitive::Sphere(s) => {
                let dx = point[0] - s.centre[0];
                let dy = point[1] - s.centre[1];
                let dz = point[2] - s.centre[2];
                dx * dx + dy * dy + dz * dz <= s.radius * s.radius
            }
            Primitive::Cuboid(c) => (0..3).all(|d| (point[d] - c.centre[d]).abs() <= c.half_extents[d]),
            Primitive::Ellipsoid(e) => {
                let r: f64 = (0..3)
                    .map(|d| ((point[d] - e.centre[d]) / e.semi_axes[d]).powi(2))
                    .sum();
                r <= 1.0
            }
            Primitive::Cylinder(c) => {
                let axis = Vector3::from(c.axis).normalize();
                let rel = Vector3::from(*point) - Vector3::from(c.base_centre);
                let along = rel.dot(&axis);
                let radial = (rel - axis * along).norm();
                (0.0..=c.length).contains(&along) && radial <= c.radius
            }
        }
    }

    /// Axis-aligned bounding box: returns (min_corner, max_corner).
    pub fn bounding_box(&self) -> ([f64; 3], [f64; 3]) {
        match self {
            Primitive::Sphere(s) => (
                s.centre.map(|x| x - s.radius),
                s.centre.map(|x| x + s.radius),
            ),
            Primitive::Cuboid(c) => (
                [0, 1, 2].map(|d| c.centre[d] - c.half_extents[d]),
                [0, 1, 2].map(|d| c.centre[d] + c.half_extents[d]),
            ),
            Primitive::Ellipsoid(e) => (
                [0, 1, 2].map(|d| e.centre[d] - e.semi_axes[d]),
                [0, 1, 2].map(|d| e.centre[d] + e.semi_axes[d]),
            ),
            Primitive::Cylinder(c) => {
                let axis = Vector3::from(c.axis).normalize();
                let top = Vector3::from(c.base_centre) + axis * c.length;
                let mut lo = [0.0; 3];
                let mut hi = [0.0; 3];
                for d in 0..3 {
                    lo[d] = c.base_centre[d].min(top[d]) - c.radius;
                    hi[d] = c.base_centre[d].max(top[d]) + c.radius;
                }
                (lo, hi)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cylinder_containment() {
        let c = Primitive::Cylinder(Cylinder {
            base_centre: [0.0, 0.0, 0.0],
            axis: [0.0, 0.0, 2.0],
            length: 1.0,
            radius: 0.2,
        });
        assert!(c.contains(&[0.1, 0.1, 0.5]));
        assert!(!c.contains(&[0.0, 0.0, 1.2]));
        assert!(!c.contains(&[0.3, 0.0, 0.5]));
        let (lo, hi) = c.bounding_box();
        assert!(lo[2] <= -0.2 + 1e-12 && hi[2] >= 1.2 - 1e-12);
    }
}
