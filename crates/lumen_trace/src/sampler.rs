//! The random source threaded through every trace call, plus the warping
//! functions that turn uniform numbers into directions and lens positions.
//!
//! Nothing in the crate reads ambient randomness: each pixel sample owns a
//! `Sampler` derived from `(seed, pixel, sample index)`, so an image depends
//! only on the seed and never on thread scheduling.

use glam::{Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use std::f32::consts::FRAC_PI_4;

/// Deterministic pseudo-random sample source.
#[derive(Debug, Clone)]
pub struct Sampler {
    rng: Pcg32,
}

impl Sampler {
    /// Create a sampler from a single seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Sampler for one sample of one pixel.
    ///
    /// The starting state is the first draw of a PCG keyed by `seed` on the
    /// stream of `sample_index`; the pixel index then selects the stream of
    /// the returned generator.
    pub fn for_pixel(seed: u64, pixel: u64, sample_index: u64) -> Self {
        let state = Pcg32::new(seed, sample_index).gen::<u64>();
        Self {
            rng: Pcg32::new(state, pixel),
        }
    }

    /// Uniform number in [0, 1).
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }

    /// Two uniform numbers in [0, 1).
    #[inline]
    pub fn next_2d(&mut self) -> Vec2 {
        Vec2::new(self.next_f32(), self.next_f32())
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    #[inline]
    pub fn next_index(&mut self, len: usize) -> usize {
        // floor(u * N), guarded against u * N rounding up to N
        ((self.next_f32() * len as f32) as usize).min(len - 1)
    }
}

/// Map the unit square to the unit disk (Shirley-Chiu concentric mapping).
pub fn concentric_disk(u: Vec2) -> Vec2 {
    let offset = 2.0 * u - Vec2::ONE;
    if offset == Vec2::ZERO {
        return Vec2::ZERO;
    }
    let (r, theta) = if offset.x.abs() > offset.y.abs() {
        (offset.x, FRAC_PI_4 * (offset.y / offset.x))
    } else {
        (offset.y, 2.0 * FRAC_PI_4 - FRAC_PI_4 * (offset.x / offset.y))
    };
    r * Vec2::new(theta.cos(), theta.sin())
}

/// Cosine-weighted direction on the +Z hemisphere, pdf = cos(theta) / pi.
pub fn cosine_hemisphere(u: Vec2) -> Vec3 {
    let d = concentric_disk(u);
    let z = (1.0 - d.length_squared()).max(0.0).sqrt();
    Vec3::new(d.x, d.y, z)
}

/// Rotate a +Z-up local direction into the frame around `normal`.
pub fn local_to_world(local: Vec3, normal: Vec3) -> Vec3 {
    let (tangent, bitangent) = normal.any_orthonormal_pair();
    tangent * local.x + bitangent * local.y + normal * local.z
}

/// Cosine-weighted direction around `normal`.
pub fn cosine_direction(normal: Vec3, u: Vec2) -> Vec3 {
    local_to_world(cosine_hemisphere(u), normal)
}
