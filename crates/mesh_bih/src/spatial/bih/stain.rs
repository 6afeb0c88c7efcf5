//! Triangle gathering for decal projection

use log::trace;

use super::mesh::MeshFlags;
use super::Bih;
use crate::foundation::math::{quantize_bounds, transform_point, Placement, Vec3};
use crate::physics::Triangle;

/// Receiver of the triangles gathered by [`Bih::gen_stain_tris`]
pub trait StainSink {
    /// Accept one world-space triangle of mesh `mesh`; `source` is the
    /// triangle's index in that mesh's input index list
    fn add_triangle(&mut self, mesh: usize, source: usize, triangle: &Triangle);
}

impl StainSink for Vec<Triangle> {
    fn add_triangle(&mut self, _mesh: usize, _source: usize, triangle: &Triangle) {
        self.push(*triangle);
    }
}

impl<'a> Bih<'a> {
    /// Emit every renderable, non-blended triangle within `radius` of the
    /// world point `center`, with this BIH posed by `placement`.
    ///
    /// Returns the number of triangles emitted.
    pub fn gen_stain_tris(
        &self,
        sink: &mut impl StainSink,
        center: &Vec3,
        radius: f32,
        placement: &Placement,
    ) -> usize {
        if self.is_empty()
            || !center.iter().all(|c| c.is_finite())
            || !(radius.is_finite() && radius >= 0.0)
            || !placement.is_valid()
        {
            return 0;
        }

        let orient = placement.orientation();
        let bo = placement.point_to_model(&orient, center);
        let br = Vec3::repeat(radius / placement.scale);
        let Some((qmin, qmax)) = self.clip_to_bounds(&(bo - br), &(bo + br)) else {
            return 0;
        };
        let (ibo, ibr) = quantize_bounds(&qmin, &qmax);

        let model_to_world = placement.to_matrix();
        let mut emitted = 0;
        for (index, mesh) in self.meshes.iter().enumerate() {
            if !mesh.flags.contains(MeshFlags::RENDER)
                || mesh.flags.contains(MeshFlags::ALPHA)
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
                if triangle.overlaps_sphere(center, radius) {
                    sink.add_triangle(index, tri.source as usize, &triangle);
                    emitted += 1;
                }
            });
        }
        trace!("Stain at {:?} r={} gathered {} triangles", center, radius, emitted);
        emitted
    }
}
