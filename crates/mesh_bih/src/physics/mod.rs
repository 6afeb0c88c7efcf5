//! Physics module for collision queries against static meshes
//!
//! Provides the exact triangle primitives and the physics entity state that
//! the BIH's volumetric queries read and tighten.

pub mod collision;
pub mod entity;

pub use collision::{Ray, Triangle};
pub use entity::{Contact, PhysEntity};
