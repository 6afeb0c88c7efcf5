//! Physics entity state consumed by volumetric collision queries

use crate::foundation::math::Vec3;

/// Outcome of the collision queries run for one movement step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// How far the entity may travel along its movement direction.
    ///
    /// Negative values are the push-back needed to leave a penetrated
    /// surface.
    pub allowed: f32,
    /// Normal of the surface that imposed `allowed`, facing the entity
    pub wall: Option<Vec3>,
    /// The blocking surface was already penetrated before moving
    pub inside: bool,
}

impl Default for Contact {
    fn default() -> Self {
        Self {
            allowed: f32::INFINITY,
            wall: None,
            inside: false,
        }
    }
}

/// A moving volume tested against static geometry
///
/// The volume is axis-aligned in world space and used either as a box or as
/// an ellipsoid, depending on which query is run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysEntity {
    /// World-space center of the volume
    pub center: Vec3,
    /// Half extents (box) or semi-axes (ellipsoid)
    pub half_extents: Vec3,
    /// Written by the collision queries
    pub contact: Contact,
}

impl PhysEntity {
    /// Creates an entity from its volume center and half extents
    pub fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents,
            contact: Contact::default(),
        }
    }

    /// Creates an entity from an eye position and body metrics
    ///
    /// The volume spans from `eye_height` below the eye to `above_eye` above
    /// it, with horizontal radius `radius`.
    pub fn from_eye(eye: Vec3, radius: f32, eye_height: f32, above_eye: f32) -> Self {
        let center = Vec3::new(eye.x, eye.y, eye.z + 0.5 * (above_eye - eye_height));
        let half_extents = Vec3::new(radius, radius, 0.5 * (eye_height + above_eye));
        Self::new(center, half_extents)
    }

    /// Reset the contact record before testing a move along `dir`
    pub fn begin_sweep(&mut self, dir: &Vec3) {
        self.contact = Contact {
            allowed: dir.norm(),
            ..Contact::default()
        };
    }

    /// Whether any query recorded a blocking surface since the last reset
    pub fn is_blocked(&self) -> bool {
        self.contact.wall.is_some()
    }

    /// Whether the volume description is usable
    pub fn is_valid(&self) -> bool {
        self.center.iter().all(|c| c.is_finite())
            && self.half_extents.iter().all(|c| c.is_finite() && *c >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_eye_spans_body() {
        let entity = PhysEntity::from_eye(Vec3::new(0.0, 0.0, 10.0), 2.0, 14.0, 1.0);
        assert_relative_eq!(entity.center.z - entity.half_extents.z, 10.0 - 14.0);
        assert_relative_eq!(entity.center.z + entity.half_extents.z, 10.0 + 1.0);
        assert_relative_eq!(entity.half_extents.x, 2.0);
    }

    #[test]
    fn test_begin_sweep_resets_contact() {
        let mut entity = PhysEntity::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0));
        entity.contact.wall = Some(Vec3::z());
        entity.begin_sweep(&Vec3::new(3.0, 4.0, 0.0));
        assert_relative_eq!(entity.contact.allowed, 5.0);
        assert!(!entity.is_blocked());
        assert!(!entity.contact.inside);
    }
}
