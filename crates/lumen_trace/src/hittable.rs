//! Hittable trait and Hit record for ray-scene intersection.

use lumen_math::{Aabb, Interval, Ray, Vec2, Vec3};

use crate::scene::{MaterialId, ObjectId};

/// Record of a ray-surface intersection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    /// Ray parameter of the hit
    pub t: f32,
    /// World-space hit position
    pub position: Vec3,
    /// Unit geometric normal, always facing against the incoming ray
    pub normal: Vec3,
    /// Whether the ray hit the side the winding order faces
    pub front_face: bool,
    /// Barycentric coordinates (u, v) within the hit triangle
    pub barycentric: Vec2,
    pub material: MaterialId,
    pub object: ObjectId,
}

impl Hit {
    /// Build a hit from the outward (winding-order) normal.
    ///
    /// The stored normal is flipped when the ray arrives from behind so
    /// shading always sees a normal on the incoming side.
    pub fn new(
        ray: &Ray,
        t: f32,
        outward_normal: Vec3,
        barycentric: Vec2,
        material: MaterialId,
        object: ObjectId,
    ) -> Self {
        let front_face = ray.direction().dot(outward_normal) < 0.0;
        let normal = if front_face {
            outward_normal
        } else {
            -outward_normal
        };
        Self {
            t,
            position: ray.at(t),
            normal,
            front_face,
            barycentric,
            material,
            object,
        }
    }

    /// Origin for a ray leaving this hit in `direction`, nudged off the
    /// surface on the side the ray travels to.
    pub fn spawn_origin(&self, direction: Vec3) -> Vec3 {
        let offset = SPAWN_OFFSET * (1.0 + self.position.abs().max_element());
        if direction.dot(self.normal) >= 0.0 {
            self.position + self.normal * offset
        } else {
            self.position - self.normal * offset
        }
    }
}

/// Relative distance secondary rays start away from their surface.
const SPAWN_OFFSET: f32 = 1e-4;

/// Anything a ray can be tested against.
pub trait Hittable: Send + Sync {
    /// Closest hit with `t` inside `ray_t`.
    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Hit>;

    /// World-space bounds.
    fn bounds(&self) -> Aabb;
}

/// Closest hit over a slice, by brute force.
impl<T: Hittable> Hittable for [T] {
    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Hit> {
        let mut closest = ray_t.max;
        let mut result = None;
        for object in self {
            if let Some(hit) = object.intersect(ray, ray_t.with_max(closest)) {
                closest = hit.t;
                result = Some(hit);
            }
        }
        result
    }

    fn bounds(&self) -> Aabb {
        self.iter().fold(Aabb::EMPTY, |acc, h| acc.union(&h.bounds()))
    }
}
