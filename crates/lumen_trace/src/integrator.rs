//! Path tracing integrator.
//!
//! Iterative Monte Carlo path tracing with next-event estimation toward the
//! light descriptors and implicit emission from emissive surfaces. The two
//! emitter sets are disjoint (light descriptors are not geometry), so no
//! contribution is counted by both strategies and no MIS weights are needed.

use lumen_math::{Interval, Ray};

use crate::config::{Contributions, LightStrategy, RenderConfig};
use crate::hittable::{Hit, Hittable};
use crate::light::{LightConnection, LightSample};
use crate::material::{Color, Material};
use crate::primitive::MIN_HIT_DISTANCE;
use crate::reservoir::Reservoir;
use crate::sampler::Sampler;
use crate::scene::SceneGeometry;

/// Paths whose throughput drops below this in every channel are ended.
const THROUGHPUT_EPSILON: f32 = 1e-6;

/// Shadow rays stop this fraction short of the light.
const SHADOW_EPSILON: f32 = 1e-3;

/// Result of tracing one camera sample.
#[derive(Debug, Clone)]
pub struct PathSample {
    /// Radiance estimate, zeroed if it was not finite
    pub radiance: Color,
    /// Light reservoir of the primary hit, kept as next frame's history
    pub reservoir: Option<Reservoir<LightSample>>,
    /// The raw estimate was NaN or infinite
    pub non_finite: bool,
    /// Path vertices visited
    pub bounces: u32,
}

/// Everything a trace reads: scene geometry, lights and settings.
#[derive(Clone, Copy)]
pub struct TraceContext<'a> {
    pub geometry: &'a SceneGeometry,
    pub config: &'a RenderConfig,
}

impl<'a> TraceContext<'a> {
    pub fn new(geometry: &'a SceneGeometry, config: &'a RenderConfig) -> Self {
        Self { geometry, config }
    }

    /// Trace one camera ray. `history` is the previous frame's primary-hit
    /// reservoir for this pixel, used only by the reservoir strategy with
    /// temporal reuse.
    pub fn trace(
        &self,
        primary: Ray,
        sampler: &mut Sampler,
        history: Option<&Reservoir<LightSample>>,
    ) -> PathSample {
        let config = self.config;
        let contributions = config.contributions;
        let keep_history = matches!(
            config.light_strategy,
            LightStrategy::Reservoir {
                temporal_reuse: true,
                ..
            }
        );

        let mut radiance = Color::ZERO;
        let mut throughput = Color::ONE;
        let mut ray = primary;
        let mut reservoir = None;
        let mut bounces = 0;

        for depth in 0..config.max_bounces {
            bounces = depth + 1;

            let Some(hit) = self
                .geometry
                .bvh()
                .intersect(&ray, Interval::from_min(MIN_HIT_DISTANCE))
            else {
                radiance += throughput * config.background;
                break;
            };
            let material = self.geometry.material(hit.material);

            if contributions.contains(Contributions::EMISSION) {
                radiance += throughput * material.emitted();
            }

            if contributions.contains(Contributions::DIRECT) {
                let primary_history = if depth == 0 { history } else { None };
                let (direct, primary_reservoir) =
                    self.direct_light(&hit, material, sampler, primary_history);
                radiance += throughput * direct;
                if depth == 0 && keep_history {
                    reservoir = primary_reservoir;
                }
            }

            let Some(scatter) = material.sample(ray.direction(), &hit, sampler) else {
                break;
            };
            if !contributions.contains(scatter.lobe.contribution()) {
                break;
            }

            throughput *= scatter.weight;
            throughput = throughput.min(Color::splat(config.throughput_clamp));
            if throughput.max_element() < THROUGHPUT_EPSILON {
                break;
            }

            if config.roulette_applies(depth) {
                let p = throughput.max_element().min(1.0);
                if sampler.next_f32() >= p {
                    break;
                }
                throughput /= p;
            }

            let Some(next) = Ray::try_new(hit.spawn_origin(scatter.direction), scatter.direction) else {
                break;
            };
            ray = next;
        }

        let non_finite = !radiance.is_finite();
        PathSample {
            radiance: if non_finite { Color::ZERO } else { radiance },
            reservoir,
            non_finite,
            bounces,
        }
    }

    /// Next-event estimate of direct light at `hit` with the configured
    /// strategy. Also returns the reservoir built at this hit for the
    /// reservoir strategy.
    pub fn direct_light(
        &self,
        hit: &Hit,
        material: &Material,
        sampler: &mut Sampler,
        history: Option<&Reservoir<LightSample>>,
    ) -> (Color, Option<Reservoir<LightSample>>) {
        let lights = self.geometry.lights();
        let brdf = material.brdf();
        if lights.is_empty() || brdf == Color::ZERO {
            return (Color::ZERO, None);
        }

        match self.config.light_strategy {
            LightStrategy::AllLights => {
                let mut direct = Color::ZERO;
                for light in lights.lights() {
                    let sample = light.sample(sampler.next_2d(), 1.0);
                    direct += self.unoccluded_contribution(hit, brdf, &sample);
                }
                (direct, None)
            }
            LightStrategy::Uniform => {
                let direct = lights
                    .sample_uniform(sampler)
                    .map_or(Color::ZERO, |sample| self.unoccluded_contribution(hit, brdf, &sample));
                (direct, None)
            }
            LightStrategy::Reservoir {
                candidates,
                temporal_reuse,
            } => {
                let mut reservoir = Reservoir::new();
                for _ in 0..candidates {
                    let Some(sample) = lights.sample_uniform(sampler) else {
                        break;
                    };
                    let target = sample.target(hit.position, hit.normal);
                    reservoir.update(sample, target / sample.pdf, target, sampler.next_f32());
                }

                if temporal_reuse {
                    if let Some(previous) = history {
                        let cap = self.config.temporal_history_cap.saturating_mul(candidates);
                        let previous = previous.capped(cap);
                        let target_now = previous
                            .sample()
                            .map_or(0.0, |s| s.target(hit.position, hit.normal));
                        reservoir.merge(&previous, target_now, sampler.next_f32());
                    }
                }

                let direct = match reservoir.sample() {
                    Some(sample) => match sample.connect(hit.position, hit.normal) {
                        Some(connection) if self.visible(hit, &connection) => {
                            brdf * sample.emission * reservoir.contribution_weight()
                        }
                        _ => Color::ZERO,
                    },
                    None => Color::ZERO,
                };
                (direct, Some(reservoir))
            }
        }
    }

    /// `brdf * emission * target / pdf` for one light sample, zero when the
    /// light is blocked or faces away.
    fn unoccluded_contribution(&self, hit: &Hit, brdf: Color, sample: &LightSample) -> Color {
        match sample.connect(hit.position, hit.normal) {
            Some(connection) if self.visible(hit, &connection) => {
                brdf * sample.emission * (connection.target / sample.pdf)
            }
            _ => Color::ZERO,
        }
    }

    /// Shadow ray test up to just short of the light.
    fn visible(&self, hit: &Hit, connection: &LightConnection) -> bool {
        let Some(ray) = Ray::try_new(hit.spawn_origin(connection.direction), connection.direction) else {
            return false;
        };
        let max = connection.distance * (1.0 - SHADOW_EPSILON);
        !self
            .geometry
            .bvh()
            .occluded(&ray, Interval::new(MIN_HIT_DISTANCE, max))
    }
}
