//! Flat node, triangle and triangle-bounds storage

use crate::foundation::math::{IVec3, Vec3};

/// Coordinate axis a node splits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// X axis
    X = 0,
    /// Y axis
    Y = 1,
    /// Z axis
    Z = 2,
}

impl Axis {
    /// Component index of this axis
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Axis of largest extent; ties prefer X, then Y, then Z
    pub fn largest(extent: &IVec3) -> Self {
        let mut axis = Self::X;
        for candidate in [Self::Y, Self::Z] {
            if extent[candidate.index()] > extent[axis.index()] {
                axis = candidate;
            }
        }
        axis
    }
}

/// One side of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Child {
    /// Internal child: index into the owning mesh's node slice
    Node(u32),
    /// Leaf child: range into the owning mesh's triangle slice
    Leaf {
        /// First triangle
        start: u32,
        /// Number of triangles, possibly zero
        len: u32,
    },
}

impl Child {
    /// Whether this child references triangles directly
    pub const fn is_leaf(self) -> bool {
        matches!(self, Self::Leaf { .. })
    }
}

/// Binary BIH node
///
/// `split[0]` is the upper bound of everything under `child[0]` along
/// `axis`; `split[1]` is the lower bound of everything under `child[1]`.
/// The two intervals may overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    /// Split axis
    pub axis: Axis,
    /// Left upper bound, right lower bound
    pub split: [f32; 2],
    /// Left and right children
    pub child: [Child; 2],
}

impl Node {
    /// Whether child `which` (0 or 1) is a leaf
    pub const fn is_leaf(&self, which: usize) -> bool {
        self.child[which].is_leaf()
    }
}

/// Triangle as vertex indices into its mesh's vertex view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tri {
    /// Vertex indices
    pub vert: [u32; 3],
    /// Position of this triangle in the caller's index list
    pub source: u32,
}

/// Quantized triangle bounds in model space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriBB {
    /// Integer center
    pub center: IVec3,
    /// Integer half extent, rounded up
    pub radius: IVec3,
}

impl TriBB {
    /// Quantize float bounds outward
    pub fn from_bounds(min: &Vec3, max: &Vec3) -> Self {
        let (center, radius) = crate::foundation::math::quantize_bounds(min, max);
        Self { center, radius }
    }

    /// Lower corner
    pub fn min(&self) -> IVec3 {
        self.center - self.radius
    }

    /// Upper corner
    pub fn max(&self) -> IVec3 {
        self.center + self.radius
    }

    /// Fast reject against a quantized query box
    pub fn outside(&self, bo: &IVec3, br: &IVec3) -> bool {
        (0..3).any(|k| {
            let gap = (i64::from(bo[k]) - i64::from(self.center[k])).abs();
            gap > i64::from(br[k]) + i64::from(self.radius[k])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_largest_axis_tie_break() {
        assert_eq!(Axis::largest(&IVec3::new(4, 4, 4)), Axis::X);
        assert_eq!(Axis::largest(&IVec3::new(1, 4, 4)), Axis::Y);
        assert_eq!(Axis::largest(&IVec3::new(1, 2, 9)), Axis::Z);
    }

    #[test]
    fn test_tribb_outside() {
        let bb = TriBB::from_bounds(&Vec3::new(0.0, 0.0, 0.0), &Vec3::new(2.0, 2.0, 0.0));
        assert!(bb.min().x <= 0 && bb.max().x >= 2);
        assert!(!bb.outside(&IVec3::new(1, 1, 1), &IVec3::new(1, 1, 1)));
        assert!(bb.outside(&IVec3::new(10, 1, 0), &IVec3::new(1, 1, 1)));
    }

    #[test]
    fn test_tribb_outside_at_integer_extremes() {
        let bb = TriBB { center: IVec3::repeat(i32::MAX), radius: IVec3::repeat(i32::MAX) };
        assert!(!bb.outside(&IVec3::zeros(), &IVec3::zeros()));
        assert!(bb.outside(&IVec3::repeat(i32::MIN), &IVec3::zeros()));
    }

    #[test]
    fn test_child_kinds() {
        let node = Node {
            axis: Axis::Z,
            split: [1.0, 0.0],
            child: [Child::Node(1), Child::Leaf { start: 0, len: 2 }],
        };
        assert!(!node.is_leaf(0));
        assert!(node.is_leaf(1));
    }
}
