//! Camera for primary ray generation.
//!
//! Pinhole by default; a positive aperture radius turns it into a thin lens
//! that focuses at `focus_dist`. Pixel (0, 0) is the top-left corner of the
//! image.

use glam::Vec3;
use lumen_math::Ray;

use crate::sampler::{concentric_disk, Sampler};

/// Basis vectors must be unit length and orthogonal within this tolerance.
const BASIS_TOLERANCE: f32 = 1e-3;

/// Camera description supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    center: Vec3,
    // Right, up and backward basis vectors
    u: Vec3,
    v: Vec3,
    w: Vec3,

    vfov: f32, // Vertical field of view in degrees
    aperture_radius: f32,
    focus_dist: f32,

    // Cached tan(vfov / 2)
    half_height: f32,
}

impl Camera {
    /// Camera at `look_from` looking toward `look_at`. When `vup` is
    /// parallel to the view direction an arbitrary perpendicular up is used.
    pub fn look_at(look_from: Vec3, look_at: Vec3, vup: Vec3, vfov: f32) -> Self {
        let w = (look_from - look_at).normalize_or_zero();
        let mut u = vup.cross(w).normalize_or_zero();
        if u == Vec3::ZERO {
            u = w.any_orthonormal_vector();
        }
        let v = w.cross(u);
        Self::from_parts(look_from, u, v, w, vfov)
    }

    /// Camera from an explicit orthonormal basis.
    pub fn from_basis(position: Vec3, right: Vec3, up: Vec3, forward: Vec3, vfov: f32) -> Self {
        Self::from_parts(position, right, up, -forward, vfov)
    }

    fn from_parts(center: Vec3, u: Vec3, v: Vec3, w: Vec3, vfov: f32) -> Self {
        Self {
            center,
            u,
            v,
            w,
            vfov,
            aperture_radius: 0.0,
            focus_dist: 1.0,
            half_height: (vfov.to_radians() / 2.0).tan(),
        }
    }

    /// Enable depth of field.
    pub fn with_thin_lens(mut self, aperture_radius: f32, focus_dist: f32) -> Self {
        self.aperture_radius = aperture_radius;
        self.focus_dist = focus_dist;
        self
    }

    /// Derive the vertical field of view from a lens focal length and sensor
    /// height (both in millimetres).
    pub fn with_physical(mut self, focal_length: f32, sensor_height: f32) -> Self {
        let vfov = (2.0 * (sensor_height / (2.0 * focal_length)).atan()).to_degrees();
        self.vfov = vfov;
        self.half_height = (vfov.to_radians() / 2.0).tan();
        self
    }

    pub fn position(&self) -> Vec3 {
        self.center
    }

    /// Unit view direction.
    pub fn forward(&self) -> Vec3 {
        -self.w
    }

    /// Vertical field of view in degrees.
    pub fn vfov(&self) -> f32 {
        self.vfov
    }

    pub fn aperture_radius(&self) -> f32 {
        self.aperture_radius
    }

    pub fn focus_dist(&self) -> f32 {
        self.focus_dist
    }

    /// True when the camera can generate rays: finite position, orthonormal
    /// basis, field of view in (0, 180), and a positive focus distance when
    /// the lens is open.
    pub fn is_valid(&self) -> bool {
        let unit = |a: Vec3| (a.length() - 1.0).abs() < BASIS_TOLERANCE;
        let orthogonal = |a: Vec3, b: Vec3| a.dot(b).abs() < BASIS_TOLERANCE;

        self.center.is_finite()
            && unit(self.u)
            && unit(self.v)
            && unit(self.w)
            && orthogonal(self.u, self.v)
            && orthogonal(self.u, self.w)
            && orthogonal(self.v, self.w)
            && self.vfov > 0.0
            && self.vfov < 180.0
            && self.aperture_radius >= 0.0
            && (self.aperture_radius == 0.0 || (self.focus_dist > 0.0 && self.focus_dist.is_finite()))
    }

    /// Generate a jittered ray through pixel (`x`, `y`) of a `width` x
    /// `height` image. Returns `None` for an invalid camera or image size.
    pub fn generate_ray(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        sampler: &mut Sampler,
    ) -> Option<Ray> {
        if width == 0 || height == 0 || !self.is_valid() {
            return None;
        }
        let jitter = sampler.next_2d();
        let aspect = width as f32 / height as f32;

        let ndc_x = ((x as f32 + jitter.x) / width as f32) * 2.0 - 1.0;
        let ndc_y = 1.0 - ((y as f32 + jitter.y) / height as f32) * 2.0;

        // Direction to the image plane at unit distance
        let direction = -self.w
            + self.u * (ndc_x * self.half_height * aspect)
            + self.v * (ndc_y * self.half_height);

        if self.aperture_radius <= 0.0 {
            return Ray::try_new(self.center, direction);
        }

        let focus_point = self.center + direction * self.focus_dist;
        let lens = concentric_disk(sampler.next_2d()) * self.aperture_radius;
        let origin = self.center + self.u * lens.x + self.v * lens.y;
        Ray::try_new(origin, focus_point - origin)
    }
}
