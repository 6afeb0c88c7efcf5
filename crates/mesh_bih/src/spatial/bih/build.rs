//! BIH construction
//!
//! Every mesh gets its own tree. Subsets are split at the count median along
//! the axis of largest quantized extent, so depth grows with `log2(n)` no
//! matter how the triangles are distributed.

use log::{debug, warn};

use super::mesh::{BihMesh, MeshDescriptor};
use super::node::{Axis, Child, Node, Tri, TriBB};
use super::{Bih, BihError};
use crate::config::{BihConfig, BuildConfig};
use crate::foundation::math::{
    affine_inverse, is_quantizable, linear_part, transform_point, IVec3, Mat4, Vec3, QUANTIZE_LIMIT,
};

/// Minimum thickness of a mesh bounding box along any axis
const MIN_BOUNDS_THICKNESS: f32 = 0.02;

/// A descriptor that passed validation, with its model-space triangle bounds
struct Prepared<'a> {
    desc: MeshDescriptor<'a>,
    inv_xform: Mat4,
    tribbs: Vec<TriBB>,
}

impl<'a> Bih<'a> {
    /// Build with the default configuration
    pub fn new(meshes: Vec<MeshDescriptor<'a>>) -> Result<Self, BihError> {
        Self::build(meshes, &BihConfig::default())
    }

    /// Build a BIH over `meshes`.
    ///
    /// Every mesh is validated before any tree storage is produced, so an
    /// error leaves nothing half-built behind.
    pub fn build(meshes: Vec<MeshDescriptor<'a>>, config: &BihConfig) -> Result<Self, BihError> {
        config.build.validate().map_err(BihError::InvalidConfig)?;

        let prepared = meshes
            .into_iter()
            .enumerate()
            .map(|(index, desc)| prepare(index, desc, &config.build))
            .collect::<Result<Vec<_>, _>>()?;

        let total: usize = prepared.iter().map(|p| p.tribbs.len()).sum();
        let mut bih = Self {
            meshes: Vec::with_capacity(prepared.len()),
            nodes: Vec::new(),
            tris: Vec::with_capacity(total),
            tribbs: Vec::with_capacity(total),
            bounds: None,
            center: Vec3::zeros(),
            radius: 0.0,
            collide_config: config.collide,
        };

        let mut max_depth = 0;
        for mesh in prepared {
            let built = bih.push_mesh(mesh, &config.build);
            max_depth = max_depth.max(built.depth);
            bih.meshes.push(built);
        }
        bih.compute_bounds();

        debug!(
            "Built BIH: {} meshes, {} triangles, {} nodes, max depth {}",
            bih.meshes.len(),
            bih.tris.len(),
            bih.nodes.len(),
            max_depth
        );
        Ok(bih)
    }

    /// Append one validated mesh's tree and permuted triangles
    fn push_mesh(&mut self, prepared: Prepared<'a>, config: &BuildConfig) -> BihMesh<'a> {
        let Prepared { desc, inv_xform, tribbs } = prepared;

        let mut builder = TreeBuilder {
            tribbs: &tribbs,
            order: (0..tribbs.len() as u32).collect(),
            nodes: Vec::new(),
            config,
            depth: 0,
        };
        if !tribbs.is_empty() {
            builder.subdivide(0, tribbs.len(), 0);
        }
        let TreeBuilder { order, nodes, depth, .. } = builder;

        let (bbmin, bbmax) = mesh_bounds(&tribbs);
        let linear = linear_part(&desc.transform);
        let scale = linear.column(0).norm();

        let node_base = self.nodes.len();
        let tri_base = self.tris.len();
        let node_count = nodes.len();
        self.nodes.extend(nodes);
        for &source in &order {
            self.tris.push(Tri {
                vert: desc.triangles[source as usize],
                source,
            });
            self.tribbs.push(tribbs[source as usize]);
        }

        BihMesh {
            positions: desc.positions,
            texcoords: desc.texcoords,
            alpha_mask: desc.alpha_mask,
            flags: desc.flags,
            xform: desc.transform,
            inv_xform,
            normal_xform: linear_part(&inv_xform).transpose(),
            scale,
            inv_scale: 1.0 / scale,
            bbmin,
            bbmax,
            node_base,
            node_count,
            tri_base,
            tri_count: order.len(),
            depth,
        }
    }

    fn compute_bounds(&mut self) {
        self.bounds = self
            .meshes
            .iter()
            .filter(|mesh| mesh.tri_count > 0)
            .map(|mesh| (mesh.bbmin, mesh.bbmax))
            .reduce(|(amin, amax), (bmin, bmax)| (amin.inf(&bmin), amax.sup(&bmax)));
        if let Some((bbmin, bbmax)) = self.bounds {
            self.center = (bbmin + bbmax) * 0.5;
            self.radius = (bbmax - bbmin).norm() * 0.5;
        }
    }
}

/// Check one descriptor and compute its triangle bounds in model space
fn prepare<'a>(
    index: usize,
    desc: MeshDescriptor<'a>,
    config: &BuildConfig,
) -> Result<Prepared<'a>, BihError> {
    let triangles = desc.triangles.len();
    if triangles > config.max_triangles_per_mesh {
        warn!(
            "Mesh {} has {} triangles, more than the cap of {}",
            index, triangles, config.max_triangles_per_mesh
        );
        return Err(BihError::CapacityExceeded {
            mesh: index,
            triangles,
            limit: config.max_triangles_per_mesh,
        });
    }

    let invalid_view = |reason: String| BihError::InvalidVertexView { mesh: index, reason };
    desc.positions.check_layout().map_err(invalid_view)?;
    if let Some(texcoords) = &desc.texcoords {
        texcoords
            .check_layout()
            .map_err(|reason| invalid_view(format!("texcoords: {reason}")))?;
    }

    let inv_xform =
        affine_inverse(&desc.transform).ok_or(BihError::SingularTransform { mesh: index })?;

    let available = desc.positions.len();
    let texcoord_count = desc.texcoords.as_ref().map_or(usize::MAX, |tc| tc.len());
    let mut tribbs = Vec::with_capacity(triangles);
    for (triangle, vert) in desc.triangles.iter().enumerate() {
        for &vertex in vert {
            if vertex as usize >= available {
                return Err(BihError::VertexOutOfRange { mesh: index, triangle, vertex, available });
            }
            if vertex as usize >= texcoord_count {
                return Err(invalid_view(format!(
                    "triangle {triangle} references texcoord {vertex}, view holds {texcoord_count}"
                )));
            }
        }

        let corners = vert.map(|v| transform_point(&desc.transform, &desc.positions.get(v as usize)));
        if corners.iter().any(|c| c.iter().any(|x| !x.is_finite())) {
            return Err(invalid_view(format!("triangle {triangle} has a non-finite vertex")));
        }
        if !corners.iter().all(is_quantizable) {
            return Err(BihError::CoordinateOutOfRange { mesh: index, triangle, limit: QUANTIZE_LIMIT });
        }
        let min = corners[0].inf(&corners[1]).inf(&corners[2]);
        let max = corners[0].sup(&corners[1]).sup(&corners[2]);
        tribbs.push(TriBB::from_bounds(&min, &max));
    }

    Ok(Prepared { desc, inv_xform, tribbs })
}

/// Union of the quantized triangle bounds, padded on flat axes
fn mesh_bounds(tribbs: &[TriBB]) -> (Vec3, Vec3) {
    let Some((lo, hi)) = integer_bounds(tribbs.iter()) else {
        return (Vec3::zeros(), Vec3::zeros());
    };
    let mut bbmin = lo.map(|v| v as f32);
    let mut bbmax = hi.map(|v| v as f32);
    for k in 0..3 {
        if bbmax[k] - bbmin[k] < MIN_BOUNDS_THICKNESS {
            let mid = 0.5 * (bbmin[k] + bbmax[k]);
            bbmin[k] = mid - 0.5 * MIN_BOUNDS_THICKNESS;
            bbmax[k] = mid + 0.5 * MIN_BOUNDS_THICKNESS;
        }
    }
    (bbmin, bbmax)
}

fn integer_bounds<'t>(mut tribbs: impl Iterator<Item = &'t TriBB>) -> Option<(IVec3, IVec3)> {
    let first = tribbs.next()?;
    Some(tribbs.fold((first.min(), first.max()), |(lo, hi), bb| {
        (lo.inf(&bb.min()), hi.sup(&bb.max()))
    }))
}

/// Recursive median-split builder for one mesh
struct TreeBuilder<'b> {
    /// Bounds indexed by source triangle
    tribbs: &'b [TriBB],
    /// Source triangle indices, permuted into leaf order
    order: Vec<u32>,
    nodes: Vec<Node>,
    config: &'b BuildConfig,
    depth: u32,
}

impl TreeBuilder<'_> {
    /// Split `order[start..start + len]` into a new node, returning its index
    fn subdivide(&mut self, start: usize, len: usize, depth: u32) -> u32 {
        self.depth = self.depth.max(depth);
        let index = self.nodes.len();
        self.nodes.push(Node {
            axis: Axis::X,
            split: [f32::NEG_INFINITY, f32::INFINITY],
            child: [Child::Leaf { start: 0, len: 0 }; 2],
        });

        let tribbs = self.tribbs;
        let subset = &mut self.order[start..start + len];
        let axis = match integer_bounds(subset.iter().map(|&t| &tribbs[t as usize])) {
            Some((lo, hi)) => Axis::largest(&(hi - lo)),
            None => Axis::X,
        };
        let k = axis.index();
        let half = len / 2;
        if len > 1 {
            subset.select_nth_unstable_by_key(half, |&t| (tribbs[t as usize].center[k], t));
        }

        let (left, right) = subset.split_at(half);
        let split = [
            left.iter()
                .map(|&t| tribbs[t as usize].max()[k])
                .max()
                .map_or(f32::NEG_INFINITY, |v| v as f32),
            right.iter()
                .map(|&t| tribbs[t as usize].min()[k])
                .min()
                .map_or(f32::INFINITY, |v| v as f32),
        ];

        let child = [
            self.child(start, half, depth),
            self.child(start + half, len - half, depth),
        ];
        self.nodes[index] = Node { axis, split, child };
        index as u32
    }

    fn child(&mut self, start: usize, len: usize, depth: u32) -> Child {
        if len <= self.config.leaf_size || depth + 1 >= self.config.max_depth {
            Child::Leaf {
                start: start as u32,
                len: len as u32,
            }
        } else {
            Child::Node(self.subdivide(start, len, depth + 1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Transform;
    use crate::spatial::bih::mesh::VertexView;

    fn strip(count: usize) -> (Vec<f32>, Vec<[u32; 3]>) {
        let mut positions = Vec::new();
        let mut triangles = Vec::new();
        for i in 0..count {
            let x = i as f32 * 2.0;
            let base = (positions.len() / 3) as u32;
            positions.extend_from_slice(&[x, 0.0, 0.0, x + 1.0, 0.0, 0.0, x, 1.0, 0.0]);
            triangles.push([base, base + 1, base + 2]);
        }
        (positions, triangles)
    }

    fn collect_leaves(bih: &Bih<'_>, mesh: &BihMesh<'_>, child: Child, out: &mut Vec<u32>) {
        match child {
            Child::Leaf { start, len } => {
                let tris = bih.mesh_tris(mesh);
                out.extend(tris[start as usize..(start + len) as usize].iter().map(|t| t.source));
            }
            Child::Node(index) => {
                let node = bih.mesh_nodes(mesh)[index as usize];
                collect_leaves(bih, mesh, node.child[0], out);
                collect_leaves(bih, mesh, node.child[1], out);
            }
        }
    }

    #[test]
    fn test_every_triangle_lands_in_one_leaf() {
        let (positions, triangles) = strip(37);
        let config = BihConfig {
            build: BuildConfig { leaf_size: 1, ..Default::default() },
            ..Default::default()
        };
        let bih = Bih::build(
            vec![MeshDescriptor::new(VertexView::from_floats(&positions, 3), &triangles)],
            &config,
        )
        .unwrap();

        let mesh = &bih.meshes()[0];
        let mut sources = Vec::new();
        collect_leaves(&bih, mesh, Child::Node(0), &mut sources);
        sources.sort_unstable();
        assert_eq!(sources, (0..37).collect::<Vec<_>>());
        assert!(mesh.depth() <= 6);
    }

    #[test]
    fn test_splits_bound_their_subtrees() {
        let (positions, triangles) = strip(20);
        let bih = Bih::new(vec![MeshDescriptor::new(
            VertexView::from_floats(&positions, 3),
            &triangles,
        )])
        .unwrap();
        let mesh = &bih.meshes()[0];
        let tribbs = bih.mesh_tribbs(mesh);

        for node in bih.mesh_nodes(mesh) {
            let k = node.axis.index();
            for (side, child) in node.child.iter().enumerate() {
                let mut sources = Vec::new();
                collect_leaves(&bih, mesh, *child, &mut sources);
                for (tri, bb) in bih.mesh_tris(mesh).iter().zip(tribbs) {
                    if !sources.contains(&tri.source) {
                        continue;
                    }
                    if side == 0 {
                        assert!(bb.max()[k] as f32 <= node.split[0]);
                    } else {
                        assert!(bb.min()[k] as f32 >= node.split[1]);
                    }
                }
            }
        }
    }

    #[test]
    fn test_single_triangle_has_empty_left_child() {
        let (positions, triangles) = strip(1);
        let bih = Bih::new(vec![MeshDescriptor::new(
            VertexView::from_floats(&positions, 3),
            &triangles,
        )])
        .unwrap();
        let node = bih.mesh_nodes(&bih.meshes()[0])[0];
        assert_eq!(node.child[0], Child::Leaf { start: 0, len: 0 });
        assert_eq!(node.child[1], Child::Leaf { start: 0, len: 1 });
        assert_eq!(node.split[0], f32::NEG_INFINITY);
    }

    #[test]
    fn test_flat_mesh_bounds_are_padded() {
        let (positions, triangles) = strip(3);
        let bih = Bih::new(vec![MeshDescriptor::new(
            VertexView::from_floats(&positions, 3),
            &triangles,
        )])
        .unwrap();
        let (bbmin, bbmax) = bih.meshes()[0].bounds();
        assert!(bbmax.z - bbmin.z >= MIN_BOUNDS_THICKNESS - f32::EPSILON);
        assert!(bbmin.z < 0.0 && bbmax.z > 0.0);
        assert!(bih.radius() > 0.0);
    }

    #[test]
    fn test_validation_errors() {
        let (positions, _) = strip(1);
        let view = VertexView::from_floats(&positions, 3);

        let bad_index = [[0, 1, 7]];
        let err = Bih::new(vec![MeshDescriptor::new(view, &bad_index)]).unwrap_err();
        assert_eq!(
            err,
            BihError::VertexOutOfRange { mesh: 0, triangle: 0, vertex: 7, available: 3 }
        );

        let good = [[0, 1, 2]];
        let singular = MeshDescriptor::new(view, &good).with_transform(Mat4::zeros());
        assert_eq!(
            Bih::new(vec![MeshDescriptor::new(view, &good), singular]).unwrap_err(),
            BihError::SingularTransform { mesh: 1 }
        );

        let short_stride = VertexView::from_floats(&positions, 2);
        assert!(matches!(
            Bih::new(vec![MeshDescriptor::new(short_stride, &good)]),
            Err(BihError::InvalidVertexView { mesh: 0, .. })
        ));

        let config = BihConfig {
            build: BuildConfig { leaf_size: 0, ..Default::default() },
            ..Default::default()
        };
        assert!(matches!(
            Bih::build(vec![MeshDescriptor::new(view, &good)], &config),
            Err(BihError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_far_vertices_are_rejected() {
        let (mut positions, triangles) = strip(2);
        positions[4] = 1.0e10;
        let err = Bih::new(vec![MeshDescriptor::new(
            VertexView::from_floats(&positions, 3),
            &triangles,
        )])
        .unwrap_err();
        assert_eq!(
            err,
            BihError::CoordinateOutOfRange { mesh: 0, triangle: 0, limit: QUANTIZE_LIMIT }
        );

        // In range locally, pushed out by the mesh transform
        let (positions, triangles) = strip(2);
        let far = Transform::from_position(Vec3::new(0.0, 0.0, -1.0e10)).to_matrix();
        let desc = MeshDescriptor::new(VertexView::from_floats(&positions, 3), &triangles)
            .with_transform(far);
        assert!(matches!(
            Bih::new(vec![desc]),
            Err(BihError::CoordinateOutOfRange { mesh: 0, triangle: 0, .. })
        ));
    }

    #[test]
    fn test_empty_build() {
        let bih = Bih::new(Vec::new()).unwrap();
        assert!(bih.is_empty());
        assert!(bih.bounds().is_none());
    }
}
