//! Primitive collision shapes and intersection algorithms
//!
//! Provides basic geometric primitives (rays, triangles) with the exact
//! intersection and overlap tests the BIH runs at its leaves.

use crate::foundation::math::Vec3;

/// A ray for ray casting and picking
///
/// The direction is not normalized; hit distances are expressed in
/// multiples of its length.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// The origin point of the ray
    pub origin: Vec3,
    /// The direction of the ray
    pub direction: Vec3,
}

impl Ray {
    /// Creates a new ray with the given origin and direction
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Get a point along the ray at parameter t
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Whether the ray can produce meaningful hits at all
    pub fn is_valid(&self) -> bool {
        self.origin.iter().all(|c| c.is_finite())
            && self.direction.iter().all(|c| c.is_finite())
            && self.direction != Vec3::zeros()
    }

    /// Reciprocal direction for slab tests.
    ///
    /// Zero components map to a large finite value so that
    /// `(plane - origin) * inv` never evaluates `0 * inf`.
    pub fn inverse_direction(&self) -> Vec3 {
        self.direction.map(|c| if c != 0.0 { 1.0 / c } else { 1e16 })
    }
}

/// A triangle for collision detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First vertex
    pub v0: Vec3,
    /// Second vertex
    pub v1: Vec3,
    /// Third vertex
    pub v2: Vec3,
}

impl Triangle {
    /// Creates a new triangle
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self { v0, v1, v2 }
    }

    /// Unnormalized face normal (right-hand rule)
    pub fn face_normal(&self) -> Vec3 {
        (self.v1 - self.v0).cross(&(self.v2 - self.v0))
    }

    /// Calculates the unit normal of the triangle, `None` when degenerate
    pub fn normal(&self) -> Option<Vec3> {
        self.face_normal().try_normalize(f32::EPSILON)
    }

    /// Calculates the centroid (center point) of the triangle
    pub fn centroid(&self) -> Vec3 {
        (self.v0 + self.v1 + self.v2) / 3.0
    }

    /// Axis-aligned bounds as `(min, max)`
    pub fn bounds(&self) -> (Vec3, Vec3) {
        (
            self.v0.inf(&self.v1).inf(&self.v2),
            self.v0.sup(&self.v1).sup(&self.v2),
        )
    }

    /// Apply a per-vertex mapping
    #[must_use]
    pub fn map(&self, f: impl Fn(&Vec3) -> Vec3) -> Self {
        Self::new(f(&self.v0), f(&self.v1), f(&self.v2))
    }

    /// Möller-Trumbore ray-triangle intersection algorithm
    /// Returns (t, u, v) if hit, None otherwise
    ///
    /// Accepts `t` in `(0, max_dist]`. With `cull_back` set, rays travelling
    /// along the face normal (hitting the back side) are rejected.
    /// See: "Fast, Minimum Storage Ray/Triangle Intersection" by Möller & Trumbore
    pub fn intersect_ray(&self, ray: &Ray, max_dist: f32, cull_back: bool) -> Option<(f32, f32, f32)> {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let h = ray.direction.cross(&edge2);
        let det = edge1.dot(&h);

        // Parallel, degenerate triangle or zero direction
        let scale = edge1.norm() * edge2.norm() * ray.direction.norm();
        if !(det.abs() > f32::EPSILON * scale) {
            return None;
        }
        if cull_back && det < 0.0 {
            return None;
        }

        let f = 1.0 / det;
        let s = ray.origin - self.v0;
        let u = f * s.dot(&h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = f * ray.direction.dot(&q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(&q);
        if t > 0.0 && t <= max_dist {
            Some((t, u, v))
        } else {
            None
        }
    }

    /// Get the closest point on the triangle to a given point
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        let v0_to_point = point - self.v0;

        let d1 = edge1.dot(&v0_to_point);
        let d2 = edge2.dot(&v0_to_point);

        // Vertex region outside v0
        if d1 <= 0.0 && d2 <= 0.0 {
            return self.v0;
        }

        // Vertex region outside v1
        let v1_to_point = point - self.v1;
        let d3 = edge1.dot(&v1_to_point);
        let d4 = edge2.dot(&v1_to_point);
        if d3 >= 0.0 && d4 <= d3 {
            return self.v1;
        }

        // Vertex region outside v2
        let v2_to_point = point - self.v2;
        let d5 = edge1.dot(&v2_to_point);
        let d6 = edge2.dot(&v2_to_point);
        if d6 >= 0.0 && d5 <= d6 {
            return self.v2;
        }

        // Edge regions
        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let v_val = d1 / (d1 - d3);
            return self.v0 + edge1 * v_val;
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let w = d2 / (d2 - d6);
            return self.v0 + edge2 * w;
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return self.v1 + (self.v2 - self.v1) * w;
        }

        // Inside the face
        let denom = 1.0 / (va + vb + vc);
        let v_val = vb * denom;
        let w = vc * denom;
        self.v0 + edge1 * v_val + edge2 * w
    }

    /// Whether any part of the triangle lies within `radius` of `center`
    pub fn overlaps_sphere(&self, center: &Vec3, radius: f32) -> bool {
        (self.closest_point(*center) - center).norm_squared() <= radius * radius
    }

    /// Whether the triangle overlaps an axis-aligned ellipsoid
    ///
    /// Works in the ellipsoid's unit-sphere space, where the test reduces to
    /// a closest-point distance check.
    pub fn overlaps_ellipsoid(&self, center: &Vec3, radii: &Vec3, epsilon: f32) -> bool {
        let inv = radii.map(|r| 1.0 / r.max(f32::MIN_POSITIVE));
        let unit = self.map(|v| (v - center).component_mul(&inv));
        unit.closest_point(Vec3::zeros()).norm() <= 1.0 + epsilon
    }

    /// Whether the triangle overlaps an axis-aligned box (separating axis test)
    pub fn overlaps_box(&self, center: &Vec3, half_extents: &Vec3) -> bool {
        let local = self.map(|v| v - center);
        local.separating_axes().all(|axis| {
            let (tri_min, tri_max) = local.project(&axis);
            let box_radius = half_extents.dot(&axis.abs());
            tri_min <= box_radius && tri_max >= -box_radius
        })
    }

    /// First contact of an axis-aligned box moving from `center` along `dir`.
    ///
    /// Swept separating axis test: on every axis the box enters the
    /// triangle's projection at some distance, and contact starts once all
    /// axes have been entered. Returns the distance in multiples of `dir`,
    /// within `[0, max_dist]`, and the unit normal of the last axis entered,
    /// facing the box. A box already overlapping at the start is not
    /// reported.
    pub fn sweep_box(
        &self,
        center: &Vec3,
        half_extents: &Vec3,
        dir: &Vec3,
        max_dist: f32,
    ) -> Option<(f32, Vec3)> {
        let local = self.map(|v| v - center);
        let mut enter = f32::NEG_INFINITY;
        let mut exit = f32::INFINITY;
        let mut normal = None;

        for axis in local.separating_axes() {
            let (tri_min, tri_max) = local.project(&axis);
            let box_radius = half_extents.dot(&axis.abs());
            let lo = tri_min - box_radius;
            let hi = tri_max + box_radius;
            let speed = axis.dot(dir);

            if speed == 0.0 {
                if lo > 0.0 || hi < 0.0 {
                    return None;
                }
                continue;
            }
            let (t0, t1) = if speed > 0.0 {
                (lo / speed, hi / speed)
            } else {
                (hi / speed, lo / speed)
            };
            if t0 > enter {
                enter = t0;
                normal = Some(axis * -speed.signum());
            }
            exit = exit.min(t1);
            if enter > exit || enter > max_dist {
                return None;
            }
        }

        if enter < 0.0 {
            return None;
        }
        let normal = normal?.try_normalize(f32::MIN_POSITIVE)?;
        Some((enter, normal))
    }

    /// First contact of an axis-aligned ellipsoid moving from `center` along
    /// `dir`, with the same conventions as [`Triangle::sweep_box`]
    pub fn sweep_ellipsoid(
        &self,
        center: &Vec3,
        radii: &Vec3,
        dir: &Vec3,
        max_dist: f32,
    ) -> Option<(f32, Vec3)> {
        let inv = radii.map(|r| 1.0 / r.max(f32::MIN_POSITIVE));
        let unit = self.map(|v| (v - center).component_mul(&inv));
        let (t, normal) = unit.sweep_unit_sphere(&dir.component_mul(&inv), max_dist)?;
        let normal = normal.component_mul(&inv).try_normalize(f32::MIN_POSITIVE)?;
        Some((t, normal))
    }

    /// Unit sphere at the origin moving by `velocity` per unit distance:
    /// earliest touch of the face interior, an edge or a vertex
    fn sweep_unit_sphere(&self, velocity: &Vec3, max_dist: f32) -> Option<(f32, Vec3)> {
        let speed_sq = velocity.norm_squared();
        if !(speed_sq > 0.0) {
            return None;
        }
        let mut best: Option<(f32, Vec3)> = None;
        let mut consider = |t: f32, contact: Vec3| {
            if best.map_or(true, |(best_t, _)| t < best_t) {
                best = Some((t, velocity * t - contact));
            }
        };

        // Face interior: the sphere meets the plane before any edge
        if let Some(mut n) = self.normal() {
            let mut height = -n.dot(&self.v0);
            if height < 0.0 {
                n = -n;
                height = -height;
            }
            let closing = -n.dot(velocity);
            if height > 1.0 && closing > 0.0 {
                let t = (height - 1.0) / closing;
                let contact = velocity * t - n;
                if t <= max_dist && self.contains_coplanar(&contact, &n) {
                    return Some((t, n));
                }
            }
        }

        for vertex in [self.v0, self.v1, self.v2] {
            let b = -2.0 * velocity.dot(&vertex);
            let c = vertex.norm_squared() - 1.0;
            if let Some(t) = first_root(speed_sq, b, c, max_dist) {
                consider(t, vertex);
            }
        }

        for (start, end) in [(self.v0, self.v1), (self.v1, self.v2), (self.v2, self.v0)] {
            let edge = end - start;
            let edge_sq = edge.norm_squared();
            let base = -start;
            let along = edge.dot(velocity);
            let a = edge_sq * speed_sq - along * along;
            if !(a > 1e-6 * edge_sq * speed_sq) {
                continue;
            }
            let b = 2.0 * (edge_sq * velocity.dot(&base) - along * edge.dot(&base));
            let c = edge_sq * (base.norm_squared() - 1.0) - edge.dot(&base).powi(2);
            let Some(t) = first_root(a, b, c, max_dist) else {
                continue;
            };
            let f = edge.dot(&(base + velocity * t)) / edge_sq;
            if (0.0..=1.0).contains(&f) {
                consider(t, start + edge * f);
            }
        }

        let (t, normal) = best?;
        Some((t, normal.try_normalize(f32::MIN_POSITIVE)?))
    }

    /// Whether `point`, in the triangle's plane, lies inside it
    fn contains_coplanar(&self, point: &Vec3, normal: &Vec3) -> bool {
        let sides = [(self.v0, self.v1), (self.v1, self.v2), (self.v2, self.v0)]
            .map(|(a, b)| (b - a).cross(&(point - a)).dot(normal));
        sides.iter().all(|&side| side >= 0.0) || sides.iter().all(|&side| side <= 0.0)
    }

    /// Candidate separating axes against an axis-aligned box: the box face
    /// normals, the face normal and the box axes crossed with the edges
    fn separating_axes(&self) -> impl Iterator<Item = Vec3> {
        let edges = [self.v1 - self.v0, self.v2 - self.v1, self.v0 - self.v2];
        let basis = [Vec3::x(), Vec3::y(), Vec3::z()];
        let crosses = basis
            .into_iter()
            .flat_map(move |axis| edges.into_iter().map(move |edge| axis.cross(&edge)));
        basis
            .into_iter()
            .chain(std::iter::once(edges[0].cross(&edges[1])))
            .chain(crosses)
            .filter(|axis| axis.norm_squared() > f32::EPSILON * f32::EPSILON)
    }

    /// Interval covered by the vertices along `axis`
    fn project(&self, axis: &Vec3) -> (f32, f32) {
        let p0 = axis.dot(&self.v0);
        let p1 = axis.dot(&self.v1);
        let p2 = axis.dot(&self.v2);
        (p0.min(p1).min(p2), p0.max(p1).max(p2))
    }
}

/// Smaller root of `a t^2 + b t + c` (with `a > 0`) when it lies in
/// `[0, max]`; a negative `c` means the shapes already touch
fn first_root(a: f32, b: f32, c: f32, max: f32) -> Option<f32> {
    if c < 0.0 {
        return None;
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let t = (-b - disc.sqrt()) / (2.0 * a);
    (0.0..=max).contains(&t).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_triangle() -> Triangle {
        Triangle::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        )
    }

    #[test]
    fn test_ray_hits_front_face() {
        let ray = Ray::new(Vec3::new(0.25, 0.25, 3.0), Vec3::new(0.0, 0.0, -1.0));
        let (t, u, v) = unit_triangle().intersect_ray(&ray, 10.0, true).unwrap();
        assert_relative_eq!(t, 3.0, epsilon = 1e-6);
        assert_relative_eq!(u, 0.25, epsilon = 1e-6);
        assert_relative_eq!(v, 0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_unnormalized_direction_scales_distance() {
        let ray = Ray::new(Vec3::new(0.25, 0.25, 3.0), Vec3::new(0.0, 0.0, -2.0));
        let (t, _, _) = unit_triangle().intersect_ray(&ray, 10.0, false).unwrap();
        assert_relative_eq!(t, 1.5, epsilon = 1e-6);
    }

    #[test]
    fn test_back_face_culling() {
        let ray = Ray::new(Vec3::new(0.25, 0.25, -3.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(unit_triangle().intersect_ray(&ray, 10.0, true).is_none());
        assert!(unit_triangle().intersect_ray(&ray, 10.0, false).is_some());
    }

    #[test]
    fn test_max_distance_and_behind_origin() {
        let ray = Ray::new(Vec3::new(0.25, 0.25, 3.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(unit_triangle().intersect_ray(&ray, 2.5, false).is_none());
        let away = Ray::new(Vec3::new(0.25, 0.25, 3.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(unit_triangle().intersect_ray(&away, 10.0, false).is_none());
    }

    #[test]
    fn test_degenerate_inputs_do_not_hit() {
        let flat = Triangle::new(Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0));
        let ray = Ray::new(Vec3::new(0.5, 0.0, 1.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(flat.intersect_ray(&ray, 10.0, false).is_none());
        assert!(flat.normal().is_none());

        let zero = Ray::new(Vec3::new(0.25, 0.25, 1.0), Vec3::zeros());
        assert!(unit_triangle().intersect_ray(&zero, 10.0, false).is_none());
        assert!(!zero.is_valid());
    }

    #[test]
    fn test_parallel_ray_misses() {
        let ray = Ray::new(Vec3::new(-1.0, 0.25, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(unit_triangle().intersect_ray(&ray, 10.0, false).is_none());
    }

    #[test]
    fn test_inverse_direction_is_finite() {
        let ray = Ray::new(Vec3::zeros(), Vec3::new(2.0, 0.0, -4.0));
        let inv = ray.inverse_direction();
        assert_relative_eq!(inv.x, 0.5);
        assert!(inv.y.is_finite() && inv.y > 0.0);
        assert_relative_eq!(inv.z, -0.25);
    }

    #[test]
    fn test_closest_point_regions() {
        let tri = unit_triangle();
        assert_relative_eq!(tri.closest_point(Vec3::new(-1.0, -1.0, 0.0)), tri.v0);
        assert_relative_eq!(tri.closest_point(Vec3::new(0.5, -1.0, 0.0)), Vec3::new(0.5, 0.0, 0.0));
        assert_relative_eq!(
            tri.closest_point(Vec3::new(0.2, 0.2, 5.0)),
            Vec3::new(0.2, 0.2, 0.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_box_overlap() {
        let tri = unit_triangle();
        let half = Vec3::new(0.5, 0.5, 0.5);
        assert!(tri.overlaps_box(&Vec3::new(0.2, 0.2, 0.4), &half));
        assert!(!tri.overlaps_box(&Vec3::new(0.2, 0.2, 0.6), &half));
        // Beyond the hypotenuse, inside the triangle's bounding box
        let small = Vec3::new(0.1, 0.1, 0.1);
        assert!(!tri.overlaps_box(&Vec3::new(0.8, 0.8, 0.0), &small));
    }

    #[test]
    fn test_sphere_and_ellipsoid_overlap() {
        let tri = unit_triangle();
        assert!(tri.overlaps_sphere(&Vec3::new(0.2, 0.2, 0.9), 1.0));
        assert!(!tri.overlaps_sphere(&Vec3::new(0.2, 0.2, 1.1), 1.0));

        let radii = Vec3::new(0.1, 0.1, 2.0);
        assert!(tri.overlaps_ellipsoid(&Vec3::new(0.2, 0.2, 1.9), &radii, 0.0));
        assert!(!tri.overlaps_ellipsoid(&Vec3::new(-0.5, 0.2, 0.0), &radii, 0.0));
    }

    /// Small triangle tilted toward a tall box approaching along +x
    fn sliver() -> Triangle {
        Triangle::new(
            Vec3::new(-1.0, -1.0, -6.0),
            Vec3::new(-1.0, 1.0, -6.0),
            Vec3::new(-0.5, 0.0, -5.5),
        )
    }

    #[test]
    fn test_box_sweep_face_contact() {
        let half = Vec3::new(0.5, 0.5, 0.5);
        let down = Vec3::new(0.0, 0.0, -1.0);
        let (t, n) = unit_triangle().sweep_box(&Vec3::new(0.2, 0.2, 2.0), &half, &down, 10.0).unwrap();
        assert_relative_eq!(t, 1.5, epsilon = 1e-6);
        assert_relative_eq!(n, Vec3::z(), epsilon = 1e-6);

        assert!(unit_triangle().sweep_box(&Vec3::new(0.2, 0.2, 2.0), &half, &down, 1.0).is_none());
        // Already overlapping
        assert!(unit_triangle().sweep_box(&Vec3::new(0.2, 0.2, 0.4), &half, &down, 10.0).is_none());
        // Passes beside
        assert!(unit_triangle().sweep_box(&Vec3::new(3.0, 0.2, 2.0), &half, &down, 10.0).is_none());
    }

    #[test]
    fn test_box_sweep_beyond_plane_contact() {
        let half = Vec3::new(0.5, 0.5, 5.0);
        let center = Vec3::new(-20.0, 0.0, -10.0);
        let (t, n) = sliver().sweep_box(&center, &half, &Vec3::x(), 25.0).unwrap();
        assert_relative_eq!(t, 18.5, epsilon = 1e-4);
        assert_relative_eq!(n, -Vec3::x(), epsilon = 1e-6);
        assert!(sliver().overlaps_box(&(center + Vec3::x() * 18.6), &half));
        assert!(!sliver().overlaps_box(&(center + Vec3::x() * 18.4), &half));
    }

    #[test]
    fn test_sphere_sweep_face_vertex_and_edge() {
        let radii = Vec3::new(1.0, 1.0, 1.0);
        let down = Vec3::new(0.0, 0.0, -1.0);
        let (t, n) = unit_triangle().sweep_ellipsoid(&Vec3::new(0.2, 0.2, 3.0), &radii, &down, 10.0).unwrap();
        assert_relative_eq!(t, 2.0, epsilon = 1e-5);
        assert_relative_eq!(n, Vec3::z(), epsilon = 1e-5);

        // Head on into the corner at the origin
        let (t, n) = unit_triangle().sweep_ellipsoid(&Vec3::new(-2.0, 0.0, 0.0), &radii, &Vec3::x(), 10.0).unwrap();
        assert_relative_eq!(t, 1.0, epsilon = 1e-5);
        assert_relative_eq!(n, -Vec3::x(), epsilon = 1e-5);

        // Across the hypotenuse, offset above the plane
        let center = Vec3::new(2.0, 2.0, 0.6);
        let toward = Vec3::new(-1.0, -1.0, 0.0).normalize();
        let (t, n) = unit_triangle().sweep_ellipsoid(&center, &radii, &toward, 10.0).unwrap();
        let reach = (2.0f32.powi(2) * 2.0).sqrt() - 0.5f32.sqrt() - 0.8;
        assert_relative_eq!(t, reach, epsilon = 1e-4);
        assert!(n.z > 0.0 && n.x > 0.0);

        assert!(unit_triangle().sweep_ellipsoid(&center, &radii, &-toward, 10.0).is_none());
    }

    #[test]
    fn test_ellipsoid_sweep_beyond_plane_contact() {
        let radii = Vec3::new(0.5, 0.5, 5.0);
        let center = Vec3::new(-20.0, 0.0, -10.0);
        let (t, n) = sliver().sweep_ellipsoid(&center, &radii, &Vec3::x(), 25.0).unwrap();
        assert_relative_eq!(t, 18.7, epsilon = 1e-3);
        assert!(n.x < 0.0);
        assert!(sliver().overlaps_ellipsoid(&(center + Vec3::x() * (t + 0.01)), &radii, 0.0));
        assert!(!sliver().overlaps_ellipsoid(&(center + Vec3::x() * (t - 0.05)), &radii, 0.0));
    }
}
