use crate::{Interval, Ray, Vec3};

/// Axis-Aligned Bounding Box for spatial acceleration structures (BVH).
///
/// Stored as its min and max corners. The empty box has `min = +inf` and
/// `max = -inf` so that it is the identity of [`Aabb::union`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// A box containing nothing.
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create an AABB from two corner points (in any order).
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Smallest box containing every point of the iterator.
    pub fn enclosing<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        points
            .into_iter()
            .fold(Aabb::EMPTY, |acc, p| acc.grow(p))
    }

    /// Union of two boxes.
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// This box extended to contain `point`.
    pub fn grow(&self, point: Vec3) -> Aabb {
        Aabb {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    /// Pad every axis thinner than `delta` to width `delta`.
    pub fn padded(&self, delta: f32) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        let half = Vec3::select(
            (self.max - self.min).cmplt(Vec3::splat(delta)),
            Vec3::splat(delta * 0.5),
            Vec3::ZERO,
        );
        Aabb {
            min: self.min - half,
            max: self.max + half,
        }
    }

    /// True if the box contains nothing.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// True when both corners are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// True if `other` lies entirely inside this box (boundaries included).
    pub fn contains(&self, other: &Aabb) -> bool {
        other.is_empty() || (self.min.cmple(other.min).all() && other.max.cmple(self.max).all())
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// The eight corners of the box.
    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// Slab test against a ray within `ray_t`.
    ///
    /// Uses the ray's cached inverse direction and sign bits to pick the near
    /// and far plane per axis without branching on the direction. Returns the
    /// entry distance (clamped to `ray_t.min`) when the box overlaps the
    /// interval.
    pub fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<f32> {
        let origin = ray.origin();
        let inv = ray.inv_direction();
        let sign = ray.sign();
        let bounds = [self.min, self.max];

        let mut t_min = ray_t.min;
        let mut t_max = ray_t.max;
        for axis in 0..3 {
            let near = (bounds[sign[axis]][axis] - origin[axis]) * inv[axis];
            let far = (bounds[1 - sign[axis]][axis] - origin[axis]) * inv[axis];
            // f32::max/min ignore the NaN produced by 0 * inf when the origin
            // sits exactly on a slab of a parallel axis.
            t_min = t_min.max(near);
            t_max = t_max.min(far);
            if t_max < t_min {
                return None;
            }
        }
        Some(t_min)
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Aabb::EMPTY
    }
}
