use crate::Vec3;

/// A ray in 3D space with a unit direction.
///
/// The inverse direction and the per-axis sign bits are derived once at
/// construction; the BVH slab test reads them for every node it visits.
/// A ray is immutable after construction.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    origin: Vec3,
    direction: Vec3,
    inv_direction: Vec3,
    sign: [usize; 3],
}

impl Ray {
    /// Create a new ray. `direction` is normalized here.
    ///
    /// A zero or non-finite direction produces a ray whose direction is zero;
    /// use [`Ray::try_new`] when the input is not trusted.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        let direction = direction.normalize_or_zero();
        let inv_direction = direction.recip();
        let sign = [
            (inv_direction.x < 0.0) as usize,
            (inv_direction.y < 0.0) as usize,
            (inv_direction.z < 0.0) as usize,
        ];

        Self {
            origin,
            direction,
            inv_direction,
            sign,
        }
    }

    /// Create a ray, or `None` if the origin is not finite or the direction
    /// cannot be normalized.
    pub fn try_new(origin: Vec3, direction: Vec3) -> Option<Self> {
        if !origin.is_finite() || !direction.is_finite() {
            return None;
        }
        let ray = Self::new(origin, direction);
        if ray.direction == Vec3::ZERO {
            return None;
        }
        Some(ray)
    }

    /// Get the origin point of the ray.
    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Get the unit direction of the ray.
    #[inline]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Component-wise reciprocal of the direction (infinite on axes the ray
    /// is parallel to).
    #[inline]
    pub fn inv_direction(&self) -> Vec3 {
        self.inv_direction
    }

    /// 1 where the direction component is negative, 0 otherwise.
    #[inline]
    pub fn sign(&self) -> [usize; 3] {
        self.sign
    }

    /// Get the point along the ray at parameter t.
    ///
    /// Returns: origin + t * direction
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}
