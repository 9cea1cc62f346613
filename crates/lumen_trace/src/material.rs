//! Surface materials: evaluation for next-event estimation and sampling of
//! continuation directions.
//!
//! One parameter set covers every surface. Metalness switches between a
//! Lambertian lobe and a roughness-blended mirror lobe, and `transmission`
//! mixes in a dielectric (glass) event.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_1_PI;

use crate::config::Contributions;
use crate::hittable::Hit;
use crate::sampler::{cosine_direction, Sampler};

/// Color type alias (linear RGB)
pub type Color = Vec3;

/// Metalness at or above this selects the metal lobe.
pub const METAL_THRESHOLD: f32 = 0.5;

/// Scattering lobe a continuation sample came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lobe {
    Diffuse,
    /// Mirror or glossy reflection
    Specular,
    /// Refraction through a dielectric
    Transmission,
}

impl Lobe {
    /// Contribution flag for light arriving through this lobe.
    pub fn contribution(self) -> Contributions {
        match self {
            Lobe::Diffuse => Contributions::DIFFUSE,
            Lobe::Specular => Contributions::SPECULAR,
            Lobe::Transmission => Contributions::TRANSMISSION,
        }
    }
}

/// A sampled continuation direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScatterSample {
    /// Unit direction leaving the surface
    pub direction: Vec3,
    /// Throughput multiplier (BRDF x cos / pdf)
    pub weight: Color,
    pub lobe: Lobe,
}

/// Surface parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub albedo: Color,
    pub emission: Color,
    pub emission_intensity: f32,
    /// 0.0 = mirror, 1.0 = fully diffuse reflection (metals only)
    pub roughness: f32,
    pub metalness: f32,
    /// Probability of a dielectric event instead of the surface lobe
    pub transmission: f32,
    /// Index of refraction for the dielectric event
    pub ior: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Color::splat(0.8),
            emission: Color::ZERO,
            emission_intensity: 0.0,
            roughness: 0.5,
            metalness: 0.0,
            transmission: 0.0,
            ior: 1.5,
        }
    }
}

impl Material {
    /// Lambertian surface.
    pub fn diffuse(albedo: Color) -> Self {
        Self {
            albedo,
            ..Default::default()
        }
    }

    /// Metal with the given roughness.
    pub fn metal(albedo: Color, roughness: f32) -> Self {
        Self {
            albedo,
            roughness,
            metalness: 1.0,
            ..Default::default()
        }
    }

    /// Clear glass.
    pub fn glass(ior: f32) -> Self {
        Self {
            albedo: Color::ONE,
            transmission: 1.0,
            ior,
            ..Default::default()
        }
    }

    /// Black surface that emits `color * intensity`.
    pub fn emissive(color: Color, intensity: f32) -> Self {
        Self {
            albedo: Color::ZERO,
            emission: color,
            emission_intensity: intensity,
            ..Default::default()
        }
    }

    pub fn with_albedo(mut self, albedo: Color) -> Self {
        self.albedo = albedo;
        self
    }

    pub fn with_emission(mut self, color: Color, intensity: f32) -> Self {
        self.emission = color;
        self.emission_intensity = intensity;
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness;
        self
    }

    pub fn with_transmission(mut self, transmission: f32, ior: f32) -> Self {
        self.transmission = transmission;
        self.ior = ior;
        self
    }

    /// Copy with every parameter forced into its valid range. Non-finite
    /// colors become black.
    pub fn sanitized(self) -> Self {
        let color = |c: Color| if c.is_finite() { c.max(Color::ZERO) } else { Color::ZERO };
        let unit = |x: f32| if x.is_finite() { x.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            albedo: color(self.albedo).min(Color::ONE),
            emission: color(self.emission),
            emission_intensity: if self.emission_intensity.is_finite() {
                self.emission_intensity.max(0.0)
            } else {
                0.0
            },
            roughness: unit(self.roughness),
            metalness: unit(self.metalness),
            transmission: unit(self.transmission),
            ior: if self.ior.is_finite() && self.ior > 0.0 {
                self.ior
            } else {
                1.5
            },
        }
    }

    /// Uses the metal lobe.
    pub fn is_metal(&self) -> bool {
        self.metalness >= METAL_THRESHOLD
    }

    /// Emitted radiance, identical from both sides.
    pub fn emitted(&self) -> Color {
        self.emission * self.emission_intensity
    }

    /// Constant BRDF used for next-event estimation.
    ///
    /// Diffuse: `albedo / pi`, scaled by the share not taken by
    /// transmission. Metal: `albedo * roughness / pi`, so a perfect mirror
    /// receives no direct light.
    pub fn brdf(&self) -> Color {
        if self.is_metal() {
            self.albedo * self.roughness * FRAC_1_PI
        } else {
            self.albedo * (1.0 - self.transmission) * FRAC_1_PI
        }
    }

    /// BRDF times the cosine term toward `light_dir`, zero below the surface.
    pub fn evaluate(&self, normal: Vec3, light_dir: Vec3) -> Color {
        let cos_theta = normal.dot(light_dir).max(0.0);
        self.brdf() * cos_theta
    }

    /// Sample a continuation direction for a ray travelling along
    /// `incoming` that produced `hit`. Returns `None` when the path is
    /// absorbed.
    pub fn sample(&self, incoming: Vec3, hit: &Hit, sampler: &mut Sampler) -> Option<ScatterSample> {
        let normal = hit.normal;

        if self.transmission > 0.0 && sampler.next_f32() < self.transmission {
            return Some(self.sample_dielectric(incoming, hit, sampler));
        }

        if self.is_metal() {
            let mirror = reflect(incoming, normal);
            let diffuse = cosine_direction(normal, sampler.next_2d());
            let direction = mirror.lerp(diffuse, self.roughness).normalize_or_zero();
            if direction.dot(normal) <= 0.0 {
                return None;
            }
            return Some(ScatterSample {
                direction,
                weight: self.albedo,
                lobe: Lobe::Specular,
            });
        }

        let direction = cosine_direction(normal, sampler.next_2d());
        Some(ScatterSample {
            direction,
            weight: self.albedo,
            lobe: Lobe::Diffuse,
        })
    }

    fn sample_dielectric(&self, incoming: Vec3, hit: &Hit, sampler: &mut Sampler) -> ScatterSample {
        let refraction_ratio = if hit.front_face {
            1.0 / self.ior
        } else {
            self.ior
        };

        let cos_theta = (-incoming).dot(hit.normal).min(1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();

        // Total internal reflection
        let cannot_refract = refraction_ratio * sin_theta > 1.0;

        if cannot_refract || reflectance(cos_theta, refraction_ratio) > sampler.next_f32() {
            ScatterSample {
                direction: reflect(incoming, hit.normal),
                weight: self.albedo,
                lobe: Lobe::Specular,
            }
        } else {
            ScatterSample {
                direction: refract(incoming, hit.normal, refraction_ratio).normalize_or_zero(),
                weight: self.albedo,
                lobe: Lobe::Transmission,
            }
        }
    }
}

/// Reflect a vector about a normal.
#[inline]
fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Refract a unit vector through a surface.
#[inline]
fn refract(uv: Vec3, n: Vec3, etai_over_etat: f32) -> Vec3 {
    let cos_theta = (-uv).dot(n).min(1.0);
    let r_out_perp = etai_over_etat * (uv + cos_theta * n);
    let r_out_parallel = -(1.0 - r_out_perp.length_squared()).abs().sqrt() * n;
    r_out_perp + r_out_parallel
}

/// Schlick's approximation for reflectance
#[inline]
fn reflectance(cosine: f32, ratio: f32) -> f32 {
    let r0 = ((1.0 - ratio) / (1.0 + ratio)).powi(2);
    r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
}
