//! Spatial partitioning data structures
//!
//! Provides the bounded interval hierarchy used for ray picking, swept-volume
//! collision and decal gathering against static triangle meshes.

pub mod bih;

pub use bih::{
    AlphaMask, Bih, BihError, BihMesh, MeshDescriptor, MeshFlags, RayHit, RayMode, StainSink,
    TexcoordView, VertexView,
};
