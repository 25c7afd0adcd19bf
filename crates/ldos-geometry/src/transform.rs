//! Rigid motions and named geometry transforms.
//!
//! A [`GeometryTransform`] is an ordered list of per-surface rigid motions
//! with a human-readable tag, typically one element of a symmetry group or
//! one displacement in a parameter scan. Transforms are applied through
//! [`Geometry::apply_transform`], which returns a [`TransformGuard`]; the
//! guard restores the exact pre-transform node positions when it is dropped,
//! on every exit path.

use std::ops::Deref;

use nalgebra::{Matrix3, Rotation3, Unit, Vector3};
use serde::{Deserialize, Serialize};

use crate::geometry::{Geometry, GeometryError};

/// A rigid motion: rotation matrix followed by a translation (μm).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigidMotion {
    /// 3x3 rotation matrix.
    pub rotation: Matrix3<f64>,
    /// Translation vector (μm).
    pub translation: Vector3<f64>,
}

impl Default for RigidMotion {
    fn default() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }
}

impl RigidMotion {
    /// Create a pure translation.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::new(dx, dy, dz),
        }
    }

    /// Rotation by `degrees` about `axis` through the origin.
    ///
    /// The axis must be finite and non-zero.
    pub fn rotation_about(axis: [f64; 3], degrees: f64) -> Result<Self, GeometryError> {
        if !degrees.is_finite() {
            return Err(GeometryError::InvalidMotion(format!(
                "rotation angle {} is not finite",
                degrees
            )));
        }
        let axis = Unit::try_new(Vector3::from(axis), f64::EPSILON)
            .filter(|a| a.iter().all(|c| c.is_finite()))
            .ok_or_else(|| {
                GeometryError::InvalidMotion(format!(
                    "rotation axis [{}, {}, {}] is zero or not finite",
                    axis[0], axis[1], axis[2]
                ))
            })?;
        Ok(Self {
            rotation: Rotation3::from_axis_angle(&axis, degrees.to_radians()).into_inner(),
            translation: Vector3::zeros(),
        })
    }

    /// True when every entry of the rotation and translation is finite.
    pub fn is_finite(&self) -> bool {
        self.rotation.iter().chain(self.translation.iter()).all(|x| x.is_finite())
    }

    /// Apply this motion to a 3D point.
    pub fn apply(&self, point: &[f64; 3]) -> [f64; 3] {
        let v = Vector3::new(point[0], point[1], point[2]);
        let result = self.rotation * v + self.translation;
        [result.x, result.y, result.z]
    }

    /// Compose two motions: self followed by other.
    pub fn then(&self, other: &RigidMotion) -> RigidMotion {
        RigidMotion {
            rotation: other.rotation * self.rotation,
            translation: other.rotation * self.translation + other.translation,
        }
    }

    /// True when the rotation part is the identity.
    pub fn is_translation(&self) -> bool {
        (self.rotation - Matrix3::identity()).amax() <= 1e-14
    }

    pub fn is_identity(&self) -> bool {
        self.is_translation() && self.translation.amax() == 0.0
    }
}

/// The motion of one surface within a [`GeometryTransform`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceMotion {
    pub surface: String,
    pub motion: RigidMotion,
}

/// A named transform: per-surface rigid motions plus a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryTransform {
    pub tag: String,
    pub motions: Vec<SurfaceMotion>,
}

impl GeometryTransform {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            motions: Vec::new(),
        }
    }

    /// The transform that moves nothing.
    pub fn identity() -> Self {
        Self::new("DEFAULT")
    }

    /// Add a motion for `surface`; a second motion of the same surface is
    /// composed after the first.
    pub fn with_motion(mut self, surface: impl Into<String>, motion: RigidMotion) -> Self {
        self.push_motion(surface, motion);
        self
    }

    pub fn push_motion(&mut self, surface: impl Into<String>, motion: RigidMotion) {
        let surface = surface.into();
        match self.motions.iter_mut().find(|m| m.surface == surface) {
            Some(existing) => existing.motion = existing.motion.then(&motion),
            None => self.motions.push(SurfaceMotion { surface, motion }),
        }
    }

    /// Motion applied to `surface`, if the transform moves it.
    pub fn motion_for(&self, surface: &str) -> Option<&RigidMotion> {
        self.motions
            .iter()
            .find(|m| m.surface == surface)
            .map(|m| &m.motion)
    }

    /// Check that every referenced surface exists in `geometry` and that
    /// every motion is finite.
    pub fn validate(&self, geometry: &Geometry) -> Result<(), GeometryError> {
        for m in &self.motions {
            if geometry.surface_index(&m.surface).is_none() {
                return Err(GeometryError::UnknownSurface {
                    tag: self.tag.clone(),
                    label: m.surface.clone(),
                });
            }
            if !m.motion.is_finite() {
                return Err(GeometryError::InvalidMotion(format!(
                    "transform '{}' moves surface '{}' by a non-finite motion",
                    self.tag, m.surface
                )));
            }
        }
        Ok(())
    }
}

impl Geometry {
    /// Move the surfaces referenced by `transform`.
    ///
    /// The returned guard dereferences to the transformed geometry and puts
    /// every moved surface back, bit for bit, when dropped. Because the guard
    /// holds the unique borrow, no second transform can be applied while it
    /// is alive.
    pub fn apply_transform(
        &mut self,
        transform: &GeometryTransform,
    ) -> Result<TransformGuard<'_>, GeometryError> {
        transform.validate(self)?;

        let mut saved = Vec::with_capacity(transform.motions.len());
        for m in &transform.motions {
            let Some(ns) = self.surface_index(&m.surface) else {
                continue;
            };
            let nodes = self.nodes_mut(ns);
            saved.push((ns, nodes.clone()));
            for p in nodes.iter_mut() {
                *p = m.motion.apply(p);
            }
        }

        Ok(TransformGuard {
            geometry: self,
            saved,
            tag: transform.tag.clone(),
        })
    }
}

/// Scoped acquisition of an applied transform.
pub struct TransformGuard<'g> {
    geometry: &'g mut Geometry,
    saved: Vec<(usize, Vec<[f64; 3]>)>,
    tag: String,
}

impl TransformGuard<'_> {
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl Deref for TransformGuard<'_> {
    type Target = Geometry;

    fn deref(&self) -> &Geometry {
        &*self.geometry
    }
}

impl Drop for TransformGuard<'_> {
    fn drop(&mut self) {
        for (ns, nodes) in self.saved.drain(..).rev() {
            *self.geometry.nodes_mut(ns) = nodes;
        }
    }
}
