//! Bounded interval hierarchy over static triangle meshes
//!
//! A [`Bih`] is built once from a list of [`MeshDescriptor`]s and then
//! answers three kinds of read-only queries:
//!
//! - ray casts ([`Bih::traverse`], [`Bih::intersect_placed`])
//! - swept-volume collision ([`Bih::box_collide`], [`Bih::ellipse_collide`])
//! - stain gathering ([`Bih::gen_stain_tris`])
//!
//! # Storage
//!
//! Every mesh owns a contiguous slice of the shared node, triangle and
//! triangle-bounds arrays. Nodes reference children by index; leaves
//! reference a range of the mesh's triangle slice, which the builder
//! permutes into node order. Vertex data stays in the caller's buffers.
//!
//! Nodes and triangle bounds live in model space (mesh transforms applied).
//! Triangles are tested in mesh-local space: each query transforms its ray
//! or volume once per mesh.

mod build;
mod collide;
mod mesh;
mod node;
mod stain;
mod traverse;


pub use mesh::{
    AlphaMask, AttributeView, BihMesh, MeshDescriptor, MeshFlags, TexcoordView, VertexView,
};
pub use node::{Axis, Child, Node, Tri, TriBB};
pub use stain::StainSink;
pub use traverse::{RayHit, RayMode};

use crate::config::CollideConfig;
use crate::foundation::math::Vec3;

/// Errors reported while building a BIH
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BihError {
    /// A mesh has more triangles than a mesh may address
    #[error("mesh {mesh} has {triangles} triangles, limit is {limit}; split the mesh")]
    CapacityExceeded {
        /// Mesh index in the build list
        mesh: usize,
        /// Triangles supplied
        triangles: usize,
        /// Configured cap
        limit: usize,
    },

    /// A triangle references a vertex the view does not hold
    #[error("mesh {mesh} triangle {triangle} references vertex {vertex}, view holds {available}")]
    VertexOutOfRange {
        /// Mesh index in the build list
        mesh: usize,
        /// Triangle index in the mesh's index list
        triangle: usize,
        /// Offending vertex index
        vertex: u32,
        /// Vertices in the view
        available: usize,
    },

    /// A vertex or texcoord view is malformed
    #[error("mesh {mesh} has an invalid vertex view: {reason}")]
    InvalidVertexView {
        /// Mesh index in the build list
        mesh: usize,
        /// What is wrong with the view
        reason: String,
    },

    /// A transformed vertex lies beyond the quantizable coordinate range
    #[error("mesh {mesh} triangle {triangle} has a vertex beyond {limit} in model space")]
    CoordinateOutOfRange {
        /// Mesh index in the build list
        mesh: usize,
        /// Triangle index in the mesh's index list
        triangle: usize,
        /// Largest accepted coordinate magnitude
        limit: f32,
    },

    /// The mesh transform cannot be inverted
    #[error("mesh {mesh} has a singular transform")]
    SingularTransform {
        /// Mesh index in the build list
        mesh: usize,
    },

    /// Build parameters outside the supported range
    #[error("invalid build configuration: {0}")]
    InvalidConfig(String),
}

/// Bounded interval hierarchy for one logical model
///
/// Immutable once built; all queries take `&self`.
#[derive(Debug)]
pub struct Bih<'a> {
    meshes: Vec<BihMesh<'a>>,
    nodes: Vec<Node>,
    tris: Vec<Tri>,
    tribbs: Vec<TriBB>,
    bounds: Option<(Vec3, Vec3)>,
    center: Vec3,
    radius: f32,
    collide_config: CollideConfig,
}

impl<'a> Bih<'a> {
    /// Built meshes, in build order
    pub fn meshes(&self) -> &[BihMesh<'a>] {
        &self.meshes
    }

    /// Total nodes across meshes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total triangles across meshes
    pub fn triangle_count(&self) -> usize {
        self.tris.len()
    }

    /// Whether there is nothing to hit
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Union of the mesh bounds, `None` when empty
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        self.bounds
    }

    /// Center of the bounds
    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// Half diagonal of the bounds
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Node slice of a mesh
    pub fn mesh_nodes(&self, mesh: &BihMesh<'_>) -> &[Node] {
        &self.nodes[mesh.node_base..mesh.node_base + mesh.node_count]
    }

    /// Triangle slice of a mesh, in node order
    pub fn mesh_tris(&self, mesh: &BihMesh<'_>) -> &[Tri] {
        &self.tris[mesh.tri_base..mesh.tri_base + mesh.tri_count]
    }

    /// Triangle-bounds slice of a mesh, parallel to [`Bih::mesh_tris`]
    pub fn mesh_tribbs(&self, mesh: &BihMesh<'_>) -> &[TriBB] {
        &self.tribbs[mesh.tri_base..mesh.tri_base + mesh.tri_count]
    }

    /// Intersect a model-space box with the overall bounds, `None` when
    /// they do not touch
    fn clip_to_bounds(&self, qmin: &Vec3, qmax: &Vec3) -> Option<(Vec3, Vec3)> {
        let (bbmin, bbmax) = self.bounds?;
        let overlaps = (0..3).all(|k| qmax[k] >= bbmin[k] && qmin[k] <= bbmax[k]);
        overlaps.then(|| (qmin.sup(&bbmin), qmax.inf(&bbmax)))
    }

    /// Visit every triangle of `mesh` stored under a node interval that a
    /// model-space box `[qmin, qmax]` reaches.
    fn visit_volume(
        &self,
        mesh: &BihMesh<'_>,
        qmin: &Vec3,
        qmax: &Vec3,
        mut visit: impl FnMut(&Tri, &TriBB),
    ) {
        let nodes = self.mesh_nodes(mesh);
        if nodes.is_empty() {
            return;
        }
        let tris = self.mesh_tris(mesh);
        let tribbs = self.mesh_tribbs(mesh);

        let mut stack = vec![Child::Node(0)];
        while let Some(child) = stack.pop() {
            match child {
                Child::Leaf { start, len } => {
                    let range = start as usize..(start + len) as usize;
                    for (tri, tribb) in tris[range.clone()].iter().zip(&tribbs[range]) {
                        visit(tri, tribb);
                    }
                }
                Child::Node(index) => {
                    let node = &nodes[index as usize];
                    let axis = node.axis.index();
                    if qmin[axis] <= node.split[0] {
                        stack.push(node.child[0]);
                    }
                    if qmax[axis] >= node.split[1] {
                        stack.push(node.child[1]);
                    }
                }
            }
        }
    }
}
