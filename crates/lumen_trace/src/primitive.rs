//! Transformed triangle groups, the leaf objects of the BVH.
//!
//! A primitive is a run of up to [`TRIANGLES_PER_PRIMITIVE`] consecutive
//! triangles of one mesh placed by one world transform. Rays are moved into
//! object space and tested with Möller-Trumbore; the local direction is not
//! renormalized, so hit distances are world-space distances along the
//! original ray.

use std::ops::Range;
use std::sync::Arc;

use lumen_math::{Aabb, Interval, Mat4, Mat4Ext, Ray, Vec2, Vec3};

use crate::hittable::{Hit, Hittable};
use crate::scene::{MaterialId, ObjectId, TriangleMesh};

/// Maximum number of triangles grouped into one primitive.
pub const TRIANGLES_PER_PRIMITIVE: usize = 4;

/// Hits closer than this are treated as self-intersections.
pub const MIN_HIT_DISTANCE: f32 = 1e-4;

/// Determinants below this mean the ray is parallel to the triangle.
const PARALLEL_EPSILON: f32 = 1e-8;

/// Bounds padding so flat primitives keep a volume.
const BOUNDS_PADDING: f32 = 0.0001;

/// Result of a ray-triangle test.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriangleHit {
    pub t: f32,
    /// Barycentric weight of the second vertex
    pub u: f32,
    /// Barycentric weight of the third vertex
    pub v: f32,
}

/// Möller-Trumbore ray-triangle intersection.
///
/// `direction` need not be unit length; `t` is measured in multiples of it.
/// Returns `None` for parallel rays and hits outside the triangle. No range
/// check is applied to `t`.
#[inline]
pub fn intersect_triangle(
    origin: Vec3,
    direction: Vec3,
    [v0, v1, v2]: [Vec3; 3],
) -> Option<TriangleHit> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let h = direction.cross(edge2);
    let det = edge1.dot(h);
    if det.abs() < PARALLEL_EPSILON {
        return None;
    }

    let f = 1.0 / det;
    let s = origin - v0;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * direction.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    Some(TriangleHit {
        t: f * edge2.dot(q),
        u,
        v,
    })
}

/// Up to four triangles of one mesh under one world transform.
#[derive(Clone, Debug)]
pub struct Primitive {
    mesh: Arc<TriangleMesh>,
    triangles: Range<usize>,
    world_to_local: Mat4,
    bounds: Aabb,
    centroid: Vec3,
    material: MaterialId,
    object: ObjectId,
}

impl Primitive {
    /// Group `triangles` of `mesh` under `transform`.
    ///
    /// Returns `None` when the transform cannot be inverted or the world
    /// bounds are not finite; such primitives cannot be traced.
    pub fn new(
        mesh: Arc<TriangleMesh>,
        triangles: Range<usize>,
        transform: Mat4,
        material: MaterialId,
        object: ObjectId,
    ) -> Option<Self> {
        debug_assert!(triangles.len() <= TRIANGLES_PER_PRIMITIVE);
        debug_assert!(triangles.end <= mesh.triangle_count());

        let world_to_local = transform.try_inverse()?;
        let local_bounds = mesh.triangle_bounds(triangles.start, triangles.len());
        let bounds = transform.transform_aabb(&local_bounds).padded(BOUNDS_PADDING);
        if bounds.is_empty() || !bounds.is_finite() {
            return None;
        }

        Some(Self {
            mesh,
            triangles,
            world_to_local,
            centroid: bounds.centroid(),
            bounds,
            material,
            object,
        })
    }

    /// Centroid of the world bounds, used to order primitives during BVH build.
    pub fn centroid(&self) -> Vec3 {
        self.centroid
    }

    pub fn material(&self) -> MaterialId {
        self.material
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    /// Number of triangles in this primitive.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

impl Hittable for Primitive {
    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Hit> {
        let origin = self.world_to_local.transform_point3(ray.origin());
        let direction = self.world_to_local.transform_vector3(ray.direction());
        let t_min = ray_t.min.max(MIN_HIT_DISTANCE);

        let mut closest = ray_t.max;
        let mut best: Option<(TriangleHit, Vec3)> = None;

        for index in self.triangles.clone() {
            let corners = self.mesh.triangle(index);
            let Some(hit) = intersect_triangle(origin, direction, corners) else {
                continue;
            };
            if hit.t < t_min || hit.t >= closest {
                continue;
            }
            let local_normal = (corners[1] - corners[0]).cross(corners[2] - corners[0]);
            closest = hit.t;
            best = Some((hit, local_normal));
        }

        let (hit, local_normal) = best?;
        let normal = self.world_to_local.normal_to_world(local_normal);
        if normal == Vec3::ZERO {
            return None;
        }
        Some(Hit::new(
            ray,
            hit.t,
            normal,
            Vec2::new(hit.u, hit.v),
            self.material,
            self.object,
        ))
    }

    fn bounds(&self) -> Aabb {
        self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle() -> Arc<TriangleMesh> {
        Arc::new(
            TriangleMesh::new(
                vec![
                    Vec3::new(-1.0, -1.0, 0.0),
                    Vec3::new(1.0, -1.0, 0.0),
                    Vec3::new(0.0, 1.0, 0.0),
                ],
                vec![0, 1, 2],
            )
            .unwrap(),
        )
    }

    fn primitive(transform: Mat4) -> Primitive {
        Primitive::new(unit_triangle(), 0..1, transform, MaterialId(0), ObjectId(0)).unwrap()
    }

    #[test]
    fn test_triangle_hit_barycentrics() {
        let corners = [Vec3::ZERO, Vec3::X, Vec3::Y];
        let hit = intersect_triangle(Vec3::new(0.25, 0.5, 1.0), Vec3::NEG_Z, corners).unwrap();

        assert!((hit.t - 1.0).abs() < 1e-6);
        assert!((hit.u - 0.25).abs() < 1e-6);
        assert!((hit.v - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_triangle_parallel_and_outside_miss() {
        let corners = [Vec3::ZERO, Vec3::X, Vec3::Y];

        assert!(intersect_triangle(Vec3::new(0.2, 0.2, 1.0), Vec3::X, corners).is_none());
        assert!(intersect_triangle(Vec3::new(0.8, 0.8, 1.0), Vec3::NEG_Z, corners).is_none());
    }

    #[test]
    fn test_degenerate_triangle_never_hits() {
        let corners = [Vec3::ZERO, Vec3::X, Vec3::X * 2.0];
        assert!(intersect_triangle(Vec3::new(0.5, 0.0, 1.0), Vec3::NEG_Z, corners).is_none());
    }

    #[test]
    fn test_primitive_hit_and_miss() {
        let prim = primitive(Mat4::IDENTITY);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 3.0), Vec3::NEG_Z);

        let hit = prim.intersect(&ray, Interval::UNIVERSE).unwrap();
        assert!((hit.t - 3.0).abs() < 1e-5);
        assert!(hit.front_face);
        assert!((hit.normal - Vec3::Z).length() < 1e-5);

        let away = Ray::new(Vec3::new(0.0, 0.0, 3.0), Vec3::Z);
        assert!(prim.intersect(&away, Interval::UNIVERSE).is_none());
    }

    #[test]
    fn test_primitive_respects_interval_and_epsilon() {
        let prim = primitive(Mat4::IDENTITY);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 3.0), Vec3::NEG_Z);
        assert!(prim.intersect(&ray, Interval::new(0.0, 2.0)).is_none());

        // Origin on the surface: the zero-distance hit is rejected.
        let grazing = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        assert!(prim.intersect(&grazing, Interval::UNIVERSE).is_none());
    }

    #[test]
    fn test_transformed_distance_is_world_distance() {
        // Scaled by 4 and moved to z = -10; the hit must report the world distance.
        let transform = Mat4::from_translation(Vec3::new(0.0, 0.0, -10.0)) * Mat4::from_scale(Vec3::splat(4.0));
        let prim = primitive(transform);
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);

        let hit = prim.intersect(&ray, Interval::UNIVERSE).unwrap();
        assert!((hit.t - 10.0).abs() < 1e-4);
        assert!((hit.position - Vec3::new(0.0, 0.0, -10.0)).length() < 1e-4);
    }

    #[test]
    fn test_normal_uses_inverse_transpose() {
        // Triangle in the plane x + y = 0, stretched along x.
        let mesh = Arc::new(
            TriangleMesh::new(
                vec![Vec3::new(1.0, -1.0, -1.0), Vec3::new(-1.0, 1.0, -1.0), Vec3::new(0.0, 0.0, 1.0)],
                vec![0, 1, 2],
            )
            .unwrap(),
        );
        let transform = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let prim = Primitive::new(mesh, 0..1, transform, MaterialId(0), ObjectId(0)).unwrap();

        let ray = Ray::new(Vec3::new(3.0, 3.0, 0.0), Vec3::new(-1.0, -1.0, 0.0));
        let hit = prim.intersect(&ray, Interval::UNIVERSE).unwrap();
        let expected = Vec3::new(1.0, 2.0, 0.0).normalize();
        assert!((hit.normal - expected).length() < 1e-4);
    }

    #[test]
    fn test_singular_transform_is_rejected() {
        let flat = Mat4::from_scale(Vec3::new(1.0, 1.0, 0.0));
        assert!(Primitive::new(unit_triangle(), 0..1, flat, MaterialId(0), ObjectId(0)).is_none());
    }

    #[test]
    fn test_flat_primitive_bounds_are_padded() {
        let prim = primitive(Mat4::IDENTITY);
        let bounds = prim.bounds();
        assert!(bounds.max.z > bounds.min.z);
    }
}
