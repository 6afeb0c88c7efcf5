//! Exact intersection primitives
//!
//! The BIH prunes candidates with interval and quantized-box tests; these
//! primitives decide the final answer for each surviving triangle.
//!
//! # Key Types
//!
//! - [`Ray`] - Origin plus unnormalized direction
//! - [`Triangle`] - Ray, box, sphere and ellipsoid tests against one face

pub mod primitives;

pub use primitives::{Ray, Triangle};
