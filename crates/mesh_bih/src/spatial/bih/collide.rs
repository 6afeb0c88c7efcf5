//! Swept box and ellipsoid collision against placed meshes
//!
//! The entity volume is axis-aligned in world space. Its swept bounds are
//! brought into model space to walk the trees; surviving triangles are taken
//! to world space and resolved there.

use log::trace;

use super::mesh::MeshFlags;
use super::Bih;
use crate::foundation::math::{quantize_bounds, transform_point, Mat3Ext, Placement, Vec3};
use crate::physics::{Contact, PhysEntity, Triangle};

/// Shape of the entity volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Volume {
    Box,
    Ellipsoid,
}

impl Volume {
    /// Extent of the volume along unit normal `n`
    fn support(self, radii: &Vec3, n: &Vec3) -> f32 {
        match self {
            Self::Box => radii.dot(&n.abs()),
            Self::Ellipsoid => radii.component_mul(n).norm(),
        }
    }

    fn overlaps(self, triangle: &Triangle, center: &Vec3, radii: &Vec3, epsilon: f32) -> bool {
        match self {
            Self::Box => triangle.overlaps_box(center, &radii.add_scalar(epsilon)),
            Self::Ellipsoid => triangle.overlaps_ellipsoid(center, radii, epsilon),
        }
    }

    /// First touch of the volume moving along unit `dir`, with the contact
    /// normal facing the volume
    fn sweep(
        self,
        triangle: &Triangle,
        center: &Vec3,
        radii: &Vec3,
        dir: &Vec3,
        max_dist: f32,
    ) -> Option<(f32, Vec3)> {
        match self {
            Self::Box => triangle.sweep_box(center, radii, dir, max_dist),
            Self::Ellipsoid => triangle.sweep_ellipsoid(center, radii, dir, max_dist),
        }
    }
}

/// Closest blocking surface found so far
struct Blocker {
    allowed: f32,
    wall: Vec3,
    inside: bool,
}

impl<'a> Bih<'a> {
    /// Resolve a box entity moving by `dir` against this BIH posed by
    /// `placement`.
    ///
    /// Contacts whose approach rate (cosine between the movement and the
    /// surface normal) is at most `cutoff` are treated as grazing and
    /// ignored. A triangle whose plane is reached outside its area still
    /// blocks at the first edge or vertex the volume meets along the sweep.
    /// Returns `true` and tightens `entity.contact` when a blocking
    /// triangle is found closer than the entity's current allowed distance.
    pub fn box_collide(
        &self,
        entity: &mut PhysEntity,
        dir: &Vec3,
        cutoff: f32,
        placement: &Placement,
    ) -> bool {
        self.collide(Volume::Box, entity, dir, cutoff, placement)
    }

    /// Ellipsoid counterpart of [`Bih::box_collide`]; the entity's half
    /// extents are the semi-axes.
    pub fn ellipse_collide(
        &self,
        entity: &mut PhysEntity,
        dir: &Vec3,
        cutoff: f32,
        placement: &Placement,
    ) -> bool {
        self.collide(Volume::Ellipsoid, entity, dir, cutoff, placement)
    }

    fn collide(
        &self,
        volume: Volume,
        entity: &mut PhysEntity,
        dir: &Vec3,
        cutoff: f32,
        placement: &Placement,
    ) -> bool {
        if self.is_empty()
            || !entity.is_valid()
            || !placement.is_valid()
            || !dir.iter().all(|c| c.is_finite())
            || !(0.0..=1.0).contains(&cutoff)
        {
            return false;
        }

        let center = entity.center;
        let radii = entity.half_extents;
        let epsilon = self.collide_config.contact_epsilon;
        let sweep_len = dir.norm();
        let moving = sweep_len > 0.0;
        let dir_hat = if moving { dir / sweep_len } else { Vec3::zeros() };
        let mut limit = entity.contact.allowed.min(sweep_len);

        // Swept world bounds, then their model-space box
        let end = center + dir_hat * limit.max(0.0);
        let margin = radii.add_scalar(epsilon);
        let world_min = center.inf(&end) - margin;
        let world_max = center.sup(&end) + margin;
        let orient = placement.orientation();
        let bo = placement.point_to_model(&orient, &((world_min + world_max) * 0.5));
        let br = orient.abs_entries().tr_mul(&((world_max - world_min) * 0.5)) / placement.scale;
        let Some((qmin, qmax)) = self.clip_to_bounds(&(bo - br), &(bo + br)) else {
            return false;
        };
        let (ibo, ibr) = quantize_bounds(&qmin, &qmax);

        let model_to_world = placement.to_matrix();
        let mut blocker: Option<Blocker> = None;
        for mesh in &self.meshes {
            if !mesh.flags.contains(MeshFlags::COLLIDE)
                || mesh.flags.contains(MeshFlags::NOCLIP)
                || !mesh.overlaps(&qmin, &qmax)
            {
                continue;
            }
            let to_world = model_to_world * mesh.xform;

            self.visit_volume(mesh, &qmin, &qmax, |tri, tribb| {
                if tribb.outside(&ibo, &ibr) {
                    return;
                }
                let triangle = mesh.local_triangle(tri).map(|v| transform_point(&to_world, v));
                let Some(mut normal) = triangle.normal() else {
                    return;
                };
                let mut distance = normal.dot(&(center - triangle.v0));
                if distance < 0.0 {
                    normal = -normal;
                    distance = -distance;
                }
                let gap = distance - volume.support(&radii, &normal);

                let allowed = if moving {
                    let approach = -normal.dot(&dir_hat);
                    if approach <= cutoff {
                        return;
                    }
                    gap / approach
                } else if gap < 0.0 {
                    gap
                } else {
                    return;
                };
                if !(allowed < limit) {
                    return;
                }

                // Meeting the plane outside the triangle: the volume may
                // still reach an edge or vertex later in the sweep
                let contact_center = center + dir_hat * allowed.max(0.0);
                let (allowed, wall) = if volume.overlaps(&triangle, &contact_center, &radii, epsilon) {
                    (allowed, normal)
                } else if moving {
                    match volume.sweep(&triangle, &center, &radii, &dir_hat, limit) {
                        Some((toi, wall)) if toi < limit => (toi, wall),
                        _ => return,
                    }
                } else {
                    return;
                };
                limit = allowed;
                blocker = Some(Blocker {
                    allowed,
                    wall,
                    inside: allowed < 0.0,
                });
            });
        }

        let Some(blocker) = blocker else {
            return false;
        };
        trace!(
            "{:?} blocked after {} of {}, wall {:?}",
            volume,
            blocker.allowed,
            sweep_len,
            blocker.wall
        );
        entity.contact = Contact {
            allowed: blocker.allowed,
            wall: Some(blocker.wall),
            inside: blocker.inside,
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_support_radius() {
        let radii = Vec3::new(1.0, 2.0, 3.0);
        let n = Vec3::new(0.6, 0.0, -0.8);
        assert_relative_eq!(Volume::Box.support(&radii, &n), 0.6 + 2.4);
        assert_relative_eq!(
            Volume::Ellipsoid.support(&radii, &n),
            (0.36f32 + 5.76).sqrt(),
            epsilon = 1e-6
        );
        assert_relative_eq!(Volume::Box.support(&radii, &Vec3::z()), 3.0);
        assert_relative_eq!(Volume::Ellipsoid.support(&radii, &Vec3::z()), 3.0);
    }
}
