// Transform utilities for Mat4
//
// Extends glam::Mat4 with the pieces instanced ray tracing needs: bounding
// boxes of transformed geometry, a checked inverse, and normal transport.

use crate::Aabb;
use glam::{Mat4, Vec3};

/// Determinants smaller than this are treated as singular.
const SINGULAR_DETERMINANT: f32 = 1e-12;

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Transform an axis-aligned bounding box.
    /// Computes the bounding box of all 8 transformed corners.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;

    /// Inverse of the matrix, or `None` if it is singular or not finite.
    fn try_inverse(&self) -> Option<Mat4>;

    /// Map a local-space normal to world space, where `self` is the
    /// world-to-local (inverse) matrix: `n_world = inverse^T * n_local`.
    fn normal_to_world(&self, local_normal: Vec3) -> Vec3;
}

impl Mat4Ext for Mat4 {
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        if aabb.is_empty() {
            return Aabb::EMPTY;
        }
        Aabb::enclosing(aabb.corners().iter().map(|&c| self.transform_point3(c)))
    }

    fn try_inverse(&self) -> Option<Mat4> {
        if !self.is_finite() {
            return None;
        }
        let det = self.determinant();
        if !det.is_finite() || det.abs() < SINGULAR_DETERMINANT {
            return None;
        }
        let inverse = self.inverse();
        inverse.is_finite().then_some(inverse)
    }

    fn normal_to_world(&self, local_normal: Vec3) -> Vec3 {
        self.transpose().transform_vector3(local_normal).normalize_or_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_transform_aabb_translation() {
        let mat = Mat4::from_translation(Vec3::splat(5.0));
        let transformed = mat.transform_aabb(&Aabb::from_points(Vec3::ZERO, Vec3::ONE));

        assert!((transformed.min - Vec3::splat(5.0)).length() < 0.001);
        assert!((transformed.max - Vec3::splat(6.0)).length() < 0.001);
    }

    #[test]
    fn test_transform_aabb_rotation_grows_box() {
        let mat = Mat4::from_rotation_z(PI / 4.0);
        let unit = Aabb::from_points(Vec3::splat(-1.0), Vec3::splat(1.0));
        let rotated = mat.transform_aabb(&unit);

        let half_diagonal = std::f32::consts::SQRT_2;
        assert!((rotated.max.x - half_diagonal).abs() < 1e-4);
        assert!((rotated.max.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_transform_empty_aabb_stays_empty() {
        let mat = Mat4::from_scale(Vec3::splat(2.0));
        assert!(mat.transform_aabb(&Aabb::EMPTY).is_empty());
    }

    #[test]
    fn test_try_inverse_round_trips_points() {
        let mat = Mat4::from_rotation_y(PI / 4.0) * Mat4::from_translation(Vec3::new(10.0, 20.0, 30.0));
        let inv = mat.try_inverse().unwrap();

        let point = Vec3::new(5.0, 3.0, 2.0);
        let back = inv.transform_point3(mat.transform_point3(point));
        assert!((back - point).length() < 0.001);
    }

    #[test]
    fn test_try_inverse_rejects_singular() {
        let flattened = Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0));
        assert!(flattened.try_inverse().is_none());

        let mut broken = Mat4::IDENTITY;
        broken.x_axis.x = f32::NAN;
        assert!(broken.try_inverse().is_none());
    }

    #[test]
    fn test_normal_to_world_under_non_uniform_scale() {
        // Plane x + y = 0 has normal (1, 1, 0); stretching x by 2 moves the
        // plane to x/2 + y = 0, whose normal is (1, 2, 0).
        let world = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let inv = world.try_inverse().unwrap();
        let n = inv.normal_to_world(Vec3::new(1.0, 1.0, 0.0));

        let expected = Vec3::new(1.0, 2.0, 0.0).normalize();
        assert!((n - expected).length() < 1e-5);
    }
}
