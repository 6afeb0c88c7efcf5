//! # Mesh BIH
//!
//! Bounded interval hierarchy over static triangle meshes.
//!
//! ## Features
//!
//! - **Ray Queries**: nearest-hit and any-hit casts with per-mesh filtering
//! - **Swept Collision**: box and ellipsoid movement resolution
//! - **Stain Gathering**: triangles within a radius, for decal projection
//! - **Borrowed Geometry**: strided views over caller-owned vertex buffers
//!
//! ## Quick Start
//!
//! ```rust
//! use mesh_bih::prelude::*;
//!
//! let positions = [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0];
//! let triangles = [[0, 1, 2], [0, 2, 3]];
//! let mesh = MeshDescriptor::new(VertexView::from_floats(&positions, 3), &triangles);
//!
//! let bih = Bih::new(vec![mesh]).unwrap();
//! let hit = bih
//!     .traverse(&Vec3::new(0.5, 0.5, 5.0), &Vec3::new(0.0, 0.0, -1.0), 10.0, RayMode::NEAREST)
//!     .unwrap();
//! assert!((hit.distance - 5.0).abs() < 1e-6);
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod foundation;
pub mod physics;
pub mod spatial;

/// Common imports for library users
pub mod prelude {
    pub use crate::{
        config::{BihConfig, BuildConfig, CollideConfig, Config},
        foundation::math::{Mat4, Placement, Transform, Vec2, Vec3},
        physics::{Contact, PhysEntity, Ray, Triangle},
        spatial::{
            AlphaMask, Bih, BihError, MeshDescriptor, MeshFlags, RayHit, RayMode, StainSink,
            TexcoordView, VertexView,
        },
    };
}
