//! Render configuration.
//!
//! Everything the integrator and frame controller can be tuned with lives in
//! [`RenderConfig`]. It is plain data (serde) so hosts can keep it in a
//! settings file and load it with [`RenderConfig::from_json`].

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{TraceError, TraceResult};
use crate::Color;

/// How next-event estimation picks lights at each bounce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LightStrategy {
    /// One shadow ray per light.
    AllLights,
    /// One uniformly selected light, weighted by the light count.
    Uniform,
    /// Resampled importance sampling over `candidates` uniform picks, with
    /// optional reuse of the previous frame's reservoir at the primary hit.
    Reservoir { candidates: u32, temporal_reuse: bool },
}

impl Default for LightStrategy {
    fn default() -> Self {
        LightStrategy::Reservoir {
            candidates: 8,
            temporal_reuse: true,
        }
    }
}

bitflags! {
    /// Shading terms the integrator accumulates, summed per bounce.
    /// Clearing `EMISSION` or `DIRECT` drops that term at every bounce.
    /// Clearing a lobe flag ends the path at the first bounce that samples
    /// that lobe, so nothing arriving through it is traced.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Contributions: u8 {
        /// Emission of surfaces hit by camera or continuation rays.
        const EMISSION = 1 << 0;
        /// Next-event estimation toward light descriptors.
        const DIRECT = 1 << 1;
        /// Light arriving after a diffuse bounce.
        const DIFFUSE = 1 << 2;
        /// Light arriving after a mirror or glossy bounce.
        const SPECULAR = 1 << 3;
        /// Light arriving through a refractive surface.
        const TRANSMISSION = 1 << 4;
    }
}

impl Default for Contributions {
    fn default() -> Self {
        Contributions::all()
    }
}

/// Render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Maximum number of path vertices per camera sample.
    pub max_bounces: u32,
    /// Sample cap per pixel; a pixel that reaches it is converged.
    pub max_samples_per_pixel: u32,
    /// Bounce index from which Russian roulette may end a path.
    /// Values at or above `max_bounces` disable it.
    pub russian_roulette_depth: u32,
    /// Light selection for next-event estimation.
    pub light_strategy: LightStrategy,
    /// Temporal reservoir history is capped at this many times the
    /// per-frame candidate count.
    pub temporal_history_cap: u32,
    /// Adaptive sampling: a pixel converges once the variance of its mean
    /// luminance drops below this. `None` disables adaptive sampling.
    pub convergence_threshold: Option<f32>,
    /// Samples a pixel must have before it may be declared converged.
    pub min_adaptive_samples: u32,
    /// Per-channel ceiling applied to path throughput (firefly guard).
    pub throughput_clamp: f32,
    /// Radiance returned by rays that leave the scene.
    pub background: Color,
    /// Shading terms to accumulate.
    pub contributions: Contributions,
    /// Root seed for every pixel sampler.
    pub seed: u64,
    /// Trace the pixels of a batch on the rayon thread pool.
    pub parallel: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_bounces: 12,
            max_samples_per_pixel: 16_384,
            russian_roulette_depth: 3,
            light_strategy: LightStrategy::default(),
            temporal_history_cap: 20,
            convergence_threshold: None,
            min_adaptive_samples: 16,
            throughput_clamp: 10.0,
            background: Color::ZERO,
            contributions: Contributions::default(),
            seed: 0,
            parallel: true,
        }
    }
}

impl RenderConfig {
    /// Parse a JSON document and validate it. Missing fields take defaults.
    pub fn from_json(json: &str) -> TraceResult<Self> {
        let config: RenderConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the renderer cannot honour.
    pub fn validate(&self) -> TraceResult<()> {
        if self.max_bounces == 0 {
            return Err(invalid("max_bounces must be at least 1"));
        }
        if self.max_samples_per_pixel == 0 {
            return Err(invalid("max_samples_per_pixel must be at least 1"));
        }
        if let LightStrategy::Reservoir { candidates: 0, .. } = self.light_strategy {
            return Err(invalid("reservoir strategy needs at least one candidate"));
        }
        if self.temporal_history_cap == 0 {
            return Err(invalid("temporal_history_cap must be at least 1"));
        }
        if let Some(threshold) = self.convergence_threshold {
            if !(threshold >= 0.0) || !threshold.is_finite() {
                return Err(invalid("convergence_threshold must be a finite value >= 0"));
            }
        }
        if !(self.throughput_clamp > 0.0) {
            return Err(invalid("throughput_clamp must be positive"));
        }
        if !self.background.is_finite() {
            return Err(invalid("background must be finite"));
        }
        Ok(())
    }

    /// True when bounce `depth` is subject to Russian roulette.
    pub(crate) fn roulette_applies(&self, depth: u32) -> bool {
        depth >= self.russian_roulette_depth
    }
}

fn invalid(message: &str) -> TraceError {
    TraceError::InvalidConfig(message.to_string())
}
