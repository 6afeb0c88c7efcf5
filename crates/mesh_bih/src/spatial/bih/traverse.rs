//! Ray traversal

use bitflags::bitflags;

use super::mesh::{BihMesh, MeshFlags};
use super::node::Child;
use super::Bih;
use crate::foundation::math::{transform_point, transform_vector, Placement, Vec3};
use crate::physics::Ray;

bitflags! {
    /// Ray query behavior
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct RayMode: u32 {
        /// Only meshes flagged `COLLIDE`
        const COLLIDE     = 1 << 0;
        /// Only meshes flagged `RENDER`
        const RENDER      = 1 << 1;
        /// Ignore meshes flagged `NOCLIP`
        const SKIP_NOCLIP = 1 << 2;
        /// Report the closest hit instead of the first one found
        const NEAREST     = 1 << 3;
        /// Let transparent texels of `ALPHA` meshes pass rays through
        const ALPHA_TEST  = 1 << 4;
    }
}

impl RayMode {
    /// Whether a mesh with `flags` takes part in this query
    pub fn accepts(self, flags: MeshFlags) -> bool {
        (!self.contains(Self::COLLIDE) || flags.contains(MeshFlags::COLLIDE))
            && (!self.contains(Self::RENDER) || flags.contains(MeshFlags::RENDER))
            && !(self.contains(Self::SKIP_NOCLIP) && flags.contains(MeshFlags::NOCLIP))
    }
}

/// A ray/triangle hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Ray parameter of the hit, in multiples of the direction length
    pub distance: f32,
    /// Unit geometric normal of the hit triangle
    pub normal: Vec3,
    /// Index of the hit mesh in build order
    pub mesh: usize,
    /// Index of the hit triangle in its mesh's input index list
    pub triangle: usize,
}

/// Ray state shared by every node of one mesh
struct MeshRay<'r> {
    /// Model space, for node intervals
    model: &'r Ray,
    inv_dir: Vec3,
    /// Mesh-local space, for triangle tests
    local: Ray,
}

impl<'a> Bih<'a> {
    /// Cast a ray in model space.
    ///
    /// `ray` need not be normalized; hits are accepted for ray parameters in
    /// `(0, max_dist]`. Without [`RayMode::NEAREST`] the first hit found is
    /// returned, which is not necessarily the closest.
    pub fn traverse(&self, origin: &Vec3, ray: &Vec3, max_dist: f32, mode: RayMode) -> Option<RayHit> {
        let model = Ray::new(*origin, *ray);
        if !(max_dist >= 0.0) || !model.is_valid() || self.is_empty() {
            return None;
        }
        let inv_dir = model.inverse_direction();
        let nearest = mode.contains(RayMode::NEAREST);

        let mut limit = max_dist;
        let mut best = None;
        for (index, mesh) in self.meshes.iter().enumerate() {
            if mesh.tri_count == 0 || !mode.accepts(mesh.flags) {
                continue;
            }
            let Some((tmin, tmax)) = slab(&mesh.bbmin, &mesh.bbmax, &model, &inv_dir, limit) else {
                continue;
            };

            let mesh_ray = MeshRay {
                model: &model,
                inv_dir,
                local: Ray::new(
                    transform_point(&mesh.inv_xform, origin),
                    transform_vector(&mesh.inv_xform, ray),
                ),
            };
            if let Some(hit) = self.traverse_mesh(mesh, &mesh_ray, tmin, tmax, limit, mode) {
                let hit = RayHit { mesh: index, ..hit };
                if !nearest {
                    return Some(hit);
                }
                limit = hit.distance;
                best = Some(hit);
            }
        }
        best
    }

    /// Cast a world-space ray against this BIH posed by `placement`.
    ///
    /// The ray is brought into model space once; the returned distance is in
    /// world ray units and the normal is rotated back into world space.
    pub fn intersect_placed(
        &self,
        placement: &Placement,
        origin: &Vec3,
        ray: &Vec3,
        max_dist: f32,
        mode: RayMode,
    ) -> Option<RayHit> {
        if !placement.is_valid() {
            return None;
        }
        let orient = placement.orientation();
        let model_origin = placement.point_to_model(&orient, origin);
        let model_ray = placement.vector_to_model(&orient, ray);
        let hit = self.traverse(&model_origin, &model_ray, max_dist, mode)?;
        Some(RayHit {
            normal: orient * hit.normal,
            ..hit
        })
    }

    fn traverse_mesh(
        &self,
        mesh: &BihMesh<'_>,
        ray: &MeshRay<'_>,
        tmin: f32,
        tmax: f32,
        mut limit: f32,
        mode: RayMode,
    ) -> Option<RayHit> {
        let nodes = self.mesh_nodes(mesh);
        let tris = self.mesh_tris(mesh);
        let nearest = mode.contains(RayMode::NEAREST);
        let cull = mesh.flags.contains(MeshFlags::CULL_FACE);
        let alpha = mode.contains(RayMode::ALPHA_TEST) && mesh.flags.contains(MeshFlags::ALPHA);
        let origin = &ray.model.origin;
        let dir = &ray.model.direction;

        let mut best = None;
        let mut stack = vec![(Child::Node(0), tmin, tmax)];
        while let Some((child, tmin, tmax)) = stack.pop() {
            if tmin > limit {
                continue;
            }
            match child {
                Child::Leaf { start, len } => {
                    for tri in &tris[start as usize..(start + len) as usize] {
                        let triangle = mesh.local_triangle(tri);
                        let Some((t, u, v)) = triangle.intersect_ray(&ray.local, limit, cull) else {
                            continue;
                        };
                        if alpha {
                            let mask = mesh.alpha_mask.zip(mesh.texcoord(tri, u, v));
                            if mask.is_some_and(|(mask, texcoord)| !mask.is_opaque(texcoord)) {
                                continue;
                            }
                        }

                        let hit = RayHit {
                            distance: t,
                            normal: (mesh.normal_xform * triangle.face_normal())
                                .try_normalize(f32::MIN_POSITIVE)
                                .unwrap_or_else(Vec3::zeros),
                            mesh: 0,
                            triangle: tri.source as usize,
                        };
                        if !nearest {
                            return Some(hit);
                        }
                        limit = t;
                        best = Some(hit);
                    }
                }
                Child::Node(index) => {
                    let node = &nodes[index as usize];
                    let k = node.axis.index();

                    // Parallel to the split planes: the interval does not change
                    if dir[k] == 0.0 {
                        if origin[k] <= node.split[0] {
                            stack.push((node.child[0], tmin, tmax));
                        }
                        if origin[k] >= node.split[1] {
                            stack.push((node.child[1], tmin, tmax));
                        }
                        continue;
                    }

                    let near = usize::from(dir[k] < 0.0);
                    let far = 1 - near;
                    let t_near = (node.split[near] - origin[k]) * ray.inv_dir[k];
                    let t_far = (node.split[far] - origin[k]) * ray.inv_dir[k];

                    // Far side first so the near side is popped first
                    if t_far <= tmax {
                        stack.push((node.child[far], tmin.max(t_far), tmax));
                    }
                    if t_near >= tmin {
                        stack.push((node.child[near], tmin, tmax.min(t_near)));
                    }
                }
            }
        }
        best
    }
}

/// Clip `[0, limit]` against a box, `None` when the ray misses it
fn slab(bbmin: &Vec3, bbmax: &Vec3, ray: &Ray, inv_dir: &Vec3, limit: f32) -> Option<(f32, f32)> {
    let mut tmin = 0.0f32;
    let mut tmax = limit;
    for k in 0..3 {
        let t0 = (bbmin[k] - ray.origin[k]) * inv_dir[k];
        let t1 = (bbmax[k] - ray.origin[k]) * inv_dir[k];
        tmin = tmin.max(t0.min(t1));
        tmax = tmax.min(t0.max(t1));
    }
    (tmin <= tmax).then_some((tmin, tmax))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_filters_mesh_flags() {
        let noclip = MeshFlags::RENDER | MeshFlags::NOCLIP;
        assert!(RayMode::RENDER.accepts(noclip));
        assert!(!(RayMode::RENDER | RayMode::SKIP_NOCLIP).accepts(noclip));
        assert!(!RayMode::COLLIDE.accepts(noclip));
        assert!(RayMode::empty().accepts(MeshFlags::empty()));
    }

    #[test]
    fn test_slab_clips_to_limit() {
        let ray = Ray::new(Vec3::new(0.5, 0.5, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let inv = ray.inverse_direction();
        let bbmin = Vec3::new(0.0, 0.0, -1.0);
        let bbmax = Vec3::new(1.0, 1.0, 1.0);
        assert_eq!(slab(&bbmin, &bbmax, &ray, &inv, 10.0), Some((4.0, 6.0)));
        assert_eq!(slab(&bbmin, &bbmax, &ray, &inv, 3.0), None);

        let beside = Ray::new(Vec3::new(2.0, 0.5, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(slab(&bbmin, &bbmax, &beside, &beside.inverse_direction(), 10.0), None);
    }
}
