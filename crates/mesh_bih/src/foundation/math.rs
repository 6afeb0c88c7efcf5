//! Math utilities and types
//!
//! Provides the nalgebra aliases used throughout the crate, the rigid
//! [`Transform`] used to place meshes inside a BIH, and the instance
//! [`Placement`] used to pose a whole BIH in the world.

pub use nalgebra::{
    Vector2, Vector3,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// Integer 3D vector, used for quantized bounds
pub type IVec3 = Vector3<i32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Replace the scale with a uniform factor
    #[must_use]
    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::new(scale, scale, scale);
        self
    }

    /// Convert to a transformation matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }
}

/// Pose of a model instance in the world.
///
/// Angles are in degrees. The orientation is yaw about +Z, then pitch about
/// +X, then roll about -Y, applied on top of a uniform scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// World position of the model origin
    pub origin: Vec3,
    /// Rotation about the Z axis, degrees
    pub yaw: f32,
    /// Rotation about the X axis, degrees
    pub pitch: f32,
    /// Rotation about the Y axis, degrees
    pub roll: f32,
    /// Uniform scale
    pub scale: f32,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            origin: Vec3::zeros(),
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            scale: 1.0,
        }
    }
}

impl Placement {
    /// Unrotated, unscaled placement at `origin`
    pub fn at(origin: Vec3) -> Self {
        Self {
            origin,
            ..Default::default()
        }
    }

    /// Full placement
    pub fn new(origin: Vec3, yaw: f32, pitch: f32, roll: f32, scale: f32) -> Self {
        Self { origin, yaw, pitch, roll, scale }
    }

    /// Whether this placement can be inverted
    pub fn is_valid(&self) -> bool {
        self.origin.iter().all(|c| c.is_finite())
            && self.yaw.is_finite()
            && self.pitch.is_finite()
            && self.roll.is_finite()
            && self.scale.is_finite()
            && self.scale > 0.0
    }

    /// Rotation part of the placement
    pub fn orientation(&self) -> Mat3 {
        let mut orient = Mat3::identity();
        if self.yaw != 0.0 {
            orient *= Mat3::rotation_z(self.yaw.to_radians());
        }
        if self.pitch != 0.0 {
            orient *= Mat3::rotation_x(self.pitch.to_radians());
        }
        if self.roll != 0.0 {
            orient *= Mat3::rotation_y(-self.roll.to_radians());
        }
        orient
    }

    /// Model-to-world matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.origin)
            * self.orientation().to_homogeneous()
            * Mat4::new_scaling(self.scale)
    }

    /// Bring a world point into model space, given the cached orientation
    pub fn point_to_model(&self, orient: &Mat3, point: &Vec3) -> Vec3 {
        orient.tr_mul(&(point - self.origin)) / self.scale
    }

    /// Bring a world direction into model space, given the cached orientation
    pub fn vector_to_model(&self, orient: &Mat3, vector: &Vec3) -> Vec3 {
        orient.tr_mul(vector) / self.scale
    }
}

/// Extension trait for Mat3 with rotation constructors
pub trait Mat3Ext {
    /// Create a rotation matrix around the X axis
    fn rotation_x(angle: f32) -> Mat3;

    /// Create a rotation matrix around the Y axis
    fn rotation_y(angle: f32) -> Mat3;

    /// Create a rotation matrix around the Z axis
    fn rotation_z(angle: f32) -> Mat3;

    /// Matrix with every entry replaced by its absolute value
    fn abs_entries(&self) -> Mat3;
}

impl Mat3Ext for Mat3 {
    fn rotation_x(angle: f32) -> Mat3 {
        nalgebra::Rotation3::from_axis_angle(&Vec3::x_axis(), angle).into_inner()
    }

    fn rotation_y(angle: f32) -> Mat3 {
        nalgebra::Rotation3::from_axis_angle(&Vec3::y_axis(), angle).into_inner()
    }

    fn rotation_z(angle: f32) -> Mat3 {
        nalgebra::Rotation3::from_axis_angle(&Vec3::z_axis(), angle).into_inner()
    }

    fn abs_entries(&self) -> Mat3 {
        self.map(f32::abs)
    }
}

/// Apply the affine part of a 4x4 matrix to a point
pub fn transform_point(m: &Mat4, p: &Vec3) -> Vec3 {
    m.fixed_view::<3, 3>(0, 0) * p + m.fixed_view::<3, 1>(0, 3)
}

/// Apply the linear part of a 4x4 matrix to a direction
pub fn transform_vector(m: &Mat4, v: &Vec3) -> Vec3 {
    m.fixed_view::<3, 3>(0, 0) * v
}

/// Linear (upper-left 3x3) part of a 4x4 matrix
pub fn linear_part(m: &Mat4) -> Mat3 {
    m.fixed_view::<3, 3>(0, 0).into_owned()
}

/// Inverse of the affine part of a 4x4 matrix; the bottom row is ignored
pub fn affine_inverse(m: &Mat4) -> Option<Mat4> {
    let linear = linear_part(m);
    if !linear.iter().all(|c| c.is_finite()) || linear.determinant().abs() <= f32::MIN_POSITIVE {
        return None;
    }
    let inv_linear = linear.try_inverse()?;
    let translation = -(inv_linear * m.fixed_view::<3, 1>(0, 3));
    let mut inverse = inv_linear.to_homogeneous();
    inverse.fixed_view_mut::<3, 1>(0, 3).copy_from(&translation);
    Some(inverse)
}

/// Largest magnitude a coordinate may have to be quantized exactly
///
/// Leaves headroom so that sums and differences of quantized centers and
/// radii stay inside `i32`.
pub const QUANTIZE_LIMIT: f32 = (1u32 << 28) as f32;

/// Whether every component of `v` can be quantized without clamping
pub fn is_quantizable(v: &Vec3) -> bool {
    v.iter().all(|c| c.abs() <= QUANTIZE_LIMIT)
}

/// Component-wise floor into integer space, clamped to [`QUANTIZE_LIMIT`]
pub fn floor_ivec(v: &Vec3) -> IVec3 {
    v.map(|c| c.floor().clamp(-QUANTIZE_LIMIT, QUANTIZE_LIMIT) as i32)
}

/// Component-wise ceil into integer space, clamped to [`QUANTIZE_LIMIT`]
pub fn ceil_ivec(v: &Vec3) -> IVec3 {
    v.map(|c| c.ceil().clamp(-QUANTIZE_LIMIT, QUANTIZE_LIMIT) as i32)
}

/// Quantized center/half-extent pair covering `[min, max]`
///
/// Coordinates beyond [`QUANTIZE_LIMIT`] are clamped to it.
pub fn quantize_bounds(min: &Vec3, max: &Vec3) -> (IVec3, IVec3) {
    let imin = floor_ivec(min);
    let imax = ceil_ivec(max);
    let center = (imin + imax) / 2;
    let radius = (imax - imin).add_scalar(1) / 2;
    (center, radius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_placement_yaw_rotates_about_z() {
        let placement = Placement::new(Vec3::zeros(), 90.0, 0.0, 0.0, 1.0);
        let rotated = placement.orientation() * Vec3::x();
        assert_relative_eq!(rotated, Vec3::y(), epsilon = EPSILON);
    }

    #[test]
    fn test_placement_round_trip_point() {
        let placement = Placement::new(Vec3::new(3.0, -2.0, 7.0), 30.0, 15.0, -45.0, 2.5);
        let orient = placement.orientation();
        let world = Vec3::new(1.0, 2.0, 3.0);
        let model = placement.point_to_model(&orient, &world);
        let back = transform_point(&placement.to_matrix(), &model);
        assert_relative_eq!(back, world, epsilon = 1e-4);
    }

    #[test]
    fn test_quantize_bounds_covers_input() {
        let (center, radius) = quantize_bounds(&Vec3::new(-3.5, 0.2, 1.0), &Vec3::new(-0.5, 0.8, 4.0));
        for axis in 0..3 {
            let lo = [-3.5f32, 0.2, 1.0][axis];
            let hi = [-0.5f32, 0.8, 4.0][axis];
            assert!((center[axis] - radius[axis]) as f32 <= lo);
            assert!((center[axis] + radius[axis]) as f32 >= hi);
        }
    }

    #[test]
    fn test_quantize_bounds_clamps_huge_input() {
        let (center, radius) = quantize_bounds(&Vec3::repeat(-3.0e9), &Vec3::repeat(3.0e9));
        assert_eq!(center, IVec3::zeros());
        assert_eq!(radius, IVec3::repeat(QUANTIZE_LIMIT as i32));

        let (center, radius) = quantize_bounds(&Vec3::new(1.0e10, 0.0, -1.0e10), &Vec3::new(2.0e10, 1.0, -5.0e9));
        assert_eq!(center.x, QUANTIZE_LIMIT as i32);
        assert_eq!(center.z, -(QUANTIZE_LIMIT as i32));
        assert_eq!(radius.x, 0);
        assert!(!is_quantizable(&Vec3::new(0.0, 3.0e8, 0.0)));
        assert!(is_quantizable(&Vec3::new(-2.0e8, 1.0, 2.0e8)));
    }

    #[test]
    fn test_affine_inverse() {
        let transform = Transform::from_position_rotation(
            Vec3::new(4.0, -1.0, 2.0),
            Quat::from_axis_angle(&Vec3::z_axis(), 0.7),
        )
        .with_uniform_scale(3.0);
        let m = transform.to_matrix();
        let inv = affine_inverse(&m).unwrap();
        let p = Vec3::new(0.5, 2.0, -7.0);
        assert_relative_eq!(transform_point(&inv, &transform_point(&m, &p)), p, epsilon = 1e-4);

        let flat = Transform::identity().with_uniform_scale(0.0).to_matrix();
        assert!(affine_inverse(&flat).is_none());
    }

    #[test]
    fn test_transform_matrix_scales_then_translates() {
        let transform = Transform::from_position(Vec3::new(1.0, 0.0, 0.0)).with_uniform_scale(2.0);
        let p = transform_point(&transform.to_matrix(), &Vec3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(p, Vec3::new(3.0, 2.0, 2.0), epsilon = EPSILON);
    }
}
