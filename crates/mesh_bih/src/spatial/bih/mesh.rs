//! Mesh descriptors, borrowed vertex views and built per-mesh data

use std::fmt;

use bitflags::bitflags;

use super::node::Tri;
use crate::foundation::math::{Mat3, Mat4, Vec2, Vec3};
use crate::physics::Triangle;

bitflags! {
    /// Per-mesh behavior flags
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct MeshFlags: u32 {
        /// Visible geometry, eligible for render rays and stains
        const RENDER    = 1 << 1;
        /// Excluded from clipping; volumetric queries always skip it
        const NOCLIP    = 1 << 2;
        /// Alpha-blended or alpha-tested surface
        const ALPHA     = 1 << 3;
        /// Participates in collision
        const COLLIDE   = 1 << 4;
        /// Rays hitting the back side are ignored
        const CULL_FACE = 1 << 5;
    }
}

impl Default for MeshFlags {
    fn default() -> Self {
        Self::RENDER | Self::COLLIDE
    }
}

/// Strided view of `N` consecutive `f32` components per element
///
/// The bytes are owned elsewhere; elements may be interleaved with other
/// attributes through `stride` and `offset`.
#[derive(Clone, Copy)]
pub struct AttributeView<'a, const N: usize> {
    data: &'a [u8],
    stride: usize,
    offset: usize,
}

/// Three-component position view
pub type VertexView<'a> = AttributeView<'a, 3>;

/// Two-component texcoord view
pub type TexcoordView<'a> = AttributeView<'a, 2>;

impl<'a, const N: usize> AttributeView<'a, N> {
    const ELEMENT_SIZE: usize = N * std::mem::size_of::<f32>();

    /// View over raw bytes with a byte stride
    pub fn new(data: &'a [u8], stride: usize) -> Self {
        Self { data, stride, offset: 0 }
    }

    /// View over tightly or loosely packed floats, stride counted in floats
    pub fn from_floats(data: &'a [f32], stride_floats: usize) -> Self {
        Self::new(bytemuck::cast_slice(data), stride_floats * std::mem::size_of::<f32>())
    }

    /// Skip `offset` bytes before the first element
    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Number of complete elements in the view
    pub fn len(&self) -> usize {
        if self.stride == 0 || self.data.len() < self.offset + Self::ELEMENT_SIZE {
            return 0;
        }
        (self.data.len() - self.offset - Self::ELEMENT_SIZE) / self.stride + 1
    }

    /// Whether the view holds no complete element
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stride check, reported as a reason string
    pub fn check_layout(&self) -> Result<(), String> {
        if self.stride < Self::ELEMENT_SIZE {
            return Err(format!(
                "stride {} is shorter than one {}-float element",
                self.stride, N
            ));
        }
        Ok(())
    }

    fn read(&self, index: usize) -> [f32; N] {
        let at = self.offset + index * self.stride;
        bytemuck::pod_read_unaligned(&self.data[at..at + Self::ELEMENT_SIZE])
    }
}

impl AttributeView<'_, 3> {
    /// Position of vertex `index`
    pub fn get(&self, index: usize) -> Vec3 {
        Vec3::from(self.read(index))
    }
}

impl AttributeView<'_, 2> {
    /// Texcoord of vertex `index`
    pub fn get(&self, index: usize) -> Vec2 {
        Vec2::from(self.read(index))
    }
}

impl<const N: usize> fmt::Debug for AttributeView<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeView")
            .field("components", &N)
            .field("bytes", &self.data.len())
            .field("stride", &self.stride)
            .field("offset", &self.offset)
            .finish()
    }
}

/// Texture alpha lookup for alpha-tested ray hits
pub trait AlphaMask: fmt::Debug + Sync {
    /// Whether the texel at `texcoord` blocks rays
    fn is_opaque(&self, texcoord: Vec2) -> bool;
}

/// One rigid sub-object handed to the builder
#[derive(Debug, Clone)]
pub struct MeshDescriptor<'a> {
    /// Vertex positions in mesh-local space
    pub positions: VertexView<'a>,
    /// Optional texcoords, indexed like `positions`
    pub texcoords: Option<TexcoordView<'a>>,
    /// Vertex index triples
    pub triangles: &'a [[u32; 3]],
    /// Mesh-local to model space; only the affine part is used
    pub transform: Mat4,
    /// Behavior flags
    pub flags: MeshFlags,
    /// Alpha source for `ALPHA` meshes
    pub alpha_mask: Option<&'a dyn AlphaMask>,
}

impl<'a> MeshDescriptor<'a> {
    /// Descriptor with identity transform and default flags
    pub fn new(positions: VertexView<'a>, triangles: &'a [[u32; 3]]) -> Self {
        Self {
            positions,
            texcoords: None,
            triangles,
            transform: Mat4::identity(),
            flags: MeshFlags::default(),
            alpha_mask: None,
        }
    }

    /// Set the mesh transform
    #[must_use]
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    /// Set the behavior flags
    #[must_use]
    pub fn with_flags(mut self, flags: MeshFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Attach texcoords
    #[must_use]
    pub fn with_texcoords(mut self, texcoords: TexcoordView<'a>) -> Self {
        self.texcoords = Some(texcoords);
        self
    }

    /// Attach an alpha mask
    #[must_use]
    pub fn with_alpha_mask(mut self, mask: &'a dyn AlphaMask) -> Self {
        self.alpha_mask = Some(mask);
        self
    }
}

/// A built mesh: borrowed geometry plus cached transforms and slice ranges
/// into the owning BIH's storage
#[derive(Debug, Clone)]
pub struct BihMesh<'a> {
    pub(crate) positions: VertexView<'a>,
    pub(crate) texcoords: Option<TexcoordView<'a>>,
    pub(crate) alpha_mask: Option<&'a dyn AlphaMask>,
    pub(crate) flags: MeshFlags,
    pub(crate) xform: Mat4,
    pub(crate) inv_xform: Mat4,
    pub(crate) normal_xform: Mat3,
    pub(crate) scale: f32,
    pub(crate) inv_scale: f32,
    pub(crate) bbmin: Vec3,
    pub(crate) bbmax: Vec3,
    pub(crate) node_base: usize,
    pub(crate) node_count: usize,
    pub(crate) tri_base: usize,
    pub(crate) tri_count: usize,
    pub(crate) depth: u32,
}

impl BihMesh<'_> {
    /// Behavior flags
    pub fn flags(&self) -> MeshFlags {
        self.flags
    }

    /// Mesh-local to model transform
    pub fn transform(&self) -> &Mat4 {
        &self.xform
    }

    /// Model to mesh-local transform
    pub fn inverse_transform(&self) -> &Mat4 {
        &self.inv_xform
    }

    /// Uniform scale of the transform and its inverse
    pub fn scale(&self) -> (f32, f32) {
        (self.scale, self.inv_scale)
    }

    /// Model-space bounds
    pub fn bounds(&self) -> (Vec3, Vec3) {
        (self.bbmin, self.bbmax)
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.tri_count
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Deepest node level below the root
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Whether the query box overlaps this mesh's bounds
    pub(crate) fn overlaps(&self, qmin: &Vec3, qmax: &Vec3) -> bool {
        (0..3).all(|k| qmax[k] >= self.bbmin[k] && qmin[k] <= self.bbmax[k])
    }

    /// Triangle in mesh-local coordinates
    pub(crate) fn local_triangle(&self, tri: &Tri) -> Triangle {
        Triangle::new(
            self.positions.get(tri.vert[0] as usize),
            self.positions.get(tri.vert[1] as usize),
            self.positions.get(tri.vert[2] as usize),
        )
    }

    /// Interpolated texcoord at barycentrics `(u, v)`
    pub(crate) fn texcoord(&self, tri: &Tri, u: f32, v: f32) -> Option<Vec2> {
        let tc = self.texcoords.as_ref()?;
        let t0 = tc.get(tri.vert[0] as usize);
        let t1 = tc.get(tri.vert[1] as usize);
        let t2 = tc.get(tri.vert[2] as usize);
        Some(t0 * (1.0 - u - v) + t1 * u + t2 * v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleaved_view() {
        // x y z u v per vertex
        let data = [
            0.0f32, 1.0, 2.0, 0.25, 0.75,
            3.0, 4.0, 5.0, 0.5, 0.5,
        ];
        let positions = VertexView::from_floats(&data, 5);
        let texcoords = TexcoordView::from_floats(&data, 5).with_offset(12);
        assert_eq!(positions.len(), 2);
        assert_eq!(texcoords.len(), 2);
        assert_eq!(positions.get(1), Vec3::new(3.0, 4.0, 5.0));
        assert_eq!(texcoords.get(0), Vec2::new(0.25, 0.75));
    }

    #[test]
    fn test_view_layout_check() {
        let data = [0.0f32; 6];
        assert!(VertexView::from_floats(&data, 2).check_layout().is_err());
        assert!(VertexView::from_floats(&data, 3).check_layout().is_ok());
        assert_eq!(VertexView::new(&[], 12).len(), 0);
    }

    #[test]
    fn test_default_flags() {
        let flags = MeshFlags::default();
        assert!(flags.contains(MeshFlags::RENDER | MeshFlags::COLLIDE));
        assert!(!flags.contains(MeshFlags::NOCLIP));
    }
}
