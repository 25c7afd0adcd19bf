//! Discretisation of primitives into surface nodes.
//!
//! Nodes are placed on a cubic grid of spacing $d$ anchored at the lower
//! corner of the primitive's bounding box; only grid points inside the
//! primitive are kept.

use crate::geometry::Surface;
use crate::primitives::Primitive;

/// Grid points inside `primitive` at the given spacing (μm).
pub fn discretise_primitive(primitive: &Primitive, spacing: f64) -> Vec<[f64; 3]> {
    assert!(spacing > 0.0, "Node spacing must be positive");

    let (min, max) = primitive.bounding_box();
    let counts = [0, 1, 2].map(|d| ((max[d] - min[d]) / spacing + 1e-9).floor() as usize + 1);

    let mut points = Vec::new();
    for ix in 0..counts[0] {
        for iy in 0..counts[1] {
            for iz in 0..counts[2] {
                let p = [
                    min[0] + ix as f64 * spacing,
                    min[1] + iy as f64 * spacing,
                    min[2] + iz as f64 * spacing,
                ];
                if primitive.contains(&p) {
                    points.push(p);
                }
            }
        }
    }
    points
}

/// Build a labelled surface from a primitive.
pub fn discretise_surface(
    label: impl Into<String>,
    material: impl Into<String>,
    primitive: &Primitive,
    spacing: f64,
) -> Surface {
    Surface::new(label, material, discretise_primitive(primitive, spacing))
}
