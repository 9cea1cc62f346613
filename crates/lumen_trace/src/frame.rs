//! Frame controller: owns the accumulation buffer and drives one sampling
//! batch per frame.
//!
//! A batch traces one sample for every pixel that still needs samples,
//! stages the results, and commits them at the end. If a reset is requested
//! through a [`ResetHandle`] while the batch runs, the staged results are
//! discarded and the reset is applied instead.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::accumulator::{AccumulationBuffer, LinearImage, PixelState};
use crate::bucket::{generate_buckets, Bucket, DEFAULT_BUCKET_SIZE};
use crate::camera::Camera;
use crate::config::{LightStrategy, RenderConfig};
use crate::error::TraceResult;
use crate::integrator::TraceContext;
use crate::light::LightSample;
use crate::material::Color;
use crate::reservoir::Reservoir;
use crate::sampler::Sampler;
use crate::scene::{SceneGeometry, SceneSnapshot};

/// Requests an accumulation reset from another thread.
#[derive(Debug, Clone)]
pub struct ResetHandle {
    generation: Arc<AtomicU64>,
}

impl ResetHandle {
    /// Ask the renderer to reset. An in-flight batch is discarded.
    pub fn request_reset(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

/// Summary of one [`Renderer::render_frame`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    /// Committed frames so far
    pub frame: u64,
    /// Pixels traced in this batch
    pub pixels_traced: usize,
    pub converged_pixels: usize,
    /// Samples replaced by black because they were NaN or infinite
    pub non_finite_samples: usize,
    /// The batch was thrown away because of a reset request
    pub discarded: bool,
    pub elapsed: Duration,
}

struct PixelUpdate {
    index: usize,
    radiance: Color,
    reservoir: Option<Reservoir<LightSample>>,
    non_finite: bool,
}

/// Progressive renderer for one view.
pub struct Renderer {
    config: RenderConfig,
    geometry: SceneGeometry,
    camera: Option<Camera>,
    buffer: AccumulationBuffer,
    history: Vec<Option<Reservoir<LightSample>>>,
    buckets: Vec<Bucket>,
    frame: u64,
    generation: Arc<AtomicU64>,
    applied_generation: u64,
}

impl Renderer {
    /// Create a renderer with an empty scene and no camera.
    pub fn new(width: u32, height: u32, config: RenderConfig) -> TraceResult<Self> {
        config.validate()?;
        let buffer = AccumulationBuffer::new(width, height, &config)?;
        let pixels = buffer.len();
        Ok(Self {
            config,
            geometry: SceneGeometry::empty(),
            camera: None,
            buffer,
            history: vec![None; pixels],
            buckets: generate_buckets(width, height, DEFAULT_BUCKET_SIZE),
            frame: 0,
            generation: Arc::new(AtomicU64::new(0)),
            applied_generation: 0,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Replace the configuration and reset accumulation.
    pub fn set_config(&mut self, config: RenderConfig) -> TraceResult<()> {
        config.validate()?;
        self.buffer.set_limits(&config);
        self.config = config;
        self.reset();
        Ok(())
    }

    /// Build the BVH and lights for `snapshot` and reset accumulation.
    /// On error the previous scene stays in place.
    pub fn set_scene(&mut self, snapshot: &SceneSnapshot) -> TraceResult<()> {
        self.geometry = SceneGeometry::build(snapshot)?;
        log::info!(
            "Scene set: {} primitives, {} lights",
            self.geometry.bvh().primitive_count(),
            self.geometry.lights().len()
        );
        self.reset();
        Ok(())
    }

    /// Set or clear the camera and reset accumulation. An invalid camera is
    /// kept but makes the renderer not ready.
    pub fn set_camera(&mut self, camera: Option<Camera>) {
        if let Some(camera) = &camera {
            if !camera.is_valid() {
                log::warn!("Camera is invalid, rendering paused: {:?}", camera);
            }
        }
        self.camera = camera;
        self.reset();
    }

    /// Reallocate for a new resolution.
    pub fn resize(&mut self, width: u32, height: u32) -> TraceResult<()> {
        self.buffer.resize(width, height)?;
        self.buckets = generate_buckets(width, height, DEFAULT_BUCKET_SIZE);
        log::info!("Resized to {}x{}", width, height);
        self.reset();
        Ok(())
    }

    /// Discard all samples and reservoir history.
    pub fn reset(&mut self) {
        self.buffer.reset();
        self.history = vec![None; self.buffer.len()];
        self.frame = 0;
        self.applied_generation = self.generation.load(Ordering::Acquire);
        log::info!("Accumulation reset");
    }

    /// Handle for requesting a reset while a frame may be in flight.
    pub fn reset_handle(&self) -> ResetHandle {
        ResetHandle {
            generation: Arc::clone(&self.generation),
        }
    }

    /// True when a valid camera is set.
    pub fn is_ready(&self) -> bool {
        self.camera.is_some_and(|c| c.is_valid())
    }

    /// True when every pixel has converged.
    pub fn is_converged(&self) -> bool {
        self.buffer.is_converged()
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Frames committed since the last reset.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Current mean radiance at (x, y).
    pub fn radiance(&self, x: u32, y: u32) -> Option<Color> {
        self.buffer.radiance(x, y)
    }

    pub fn pixel_state(&self, x: u32, y: u32) -> Option<PixelState> {
        self.buffer.pixel_state(x, y)
    }

    /// Samples accumulated at (x, y).
    pub fn sample_count(&self, x: u32, y: u32) -> Option<u32> {
        self.buffer.pixel(x, y).map(|p| p.count())
    }

    /// Copy of the current linear radiance image.
    pub fn resolve(&self) -> LinearImage {
        self.buffer.resolve()
    }

    /// Trace one sample for every pixel that needs one and commit the batch.
    /// Does nothing until a valid camera is set.
    pub fn render_frame(&mut self) -> FrameStats {
        if self.generation.load(Ordering::Acquire) != self.applied_generation {
            self.reset();
        }
        let Some(camera) = self.camera.filter(Camera::is_valid) else {
            return FrameStats {
                frame: self.frame,
                ..Default::default()
            };
        };

        let start = Instant::now();
        let generation = self.applied_generation;
        let updates = self.trace_batch(&camera);

        if self.generation.load(Ordering::Acquire) != generation {
            log::warn!(
                "Reset requested during frame {}, discarding {} samples",
                self.frame,
                updates.len()
            );
            self.reset();
            return FrameStats {
                frame: self.frame,
                discarded: true,
                elapsed: start.elapsed(),
                ..Default::default()
            };
        }

        let keep_history = matches!(
            self.config.light_strategy,
            LightStrategy::Reservoir {
                temporal_reuse: true,
                ..
            }
        );
        let pixels_traced = updates.len();
        let mut non_finite_samples = 0;
        for update in updates {
            self.buffer.add_sample(update.index, update.radiance);
            if update.non_finite {
                non_finite_samples += 1;
            }
            if keep_history {
                self.history[update.index] = update.reservoir;
            }
        }
        self.frame += 1;

        let stats = FrameStats {
            frame: self.frame,
            pixels_traced,
            converged_pixels: self.buffer.converged_count(),
            non_finite_samples,
            discarded: false,
            elapsed: start.elapsed(),
        };
        log::debug!(
            "Frame {}: {} pixels traced, {} converged, {} non-finite in {:.2?}",
            stats.frame,
            stats.pixels_traced,
            stats.converged_pixels,
            stats.non_finite_samples,
            stats.elapsed
        );
        stats
    }

    fn trace_batch(&self, camera: &Camera) -> Vec<PixelUpdate> {
        let ctx = TraceContext::new(&self.geometry, &self.config);
        let width = self.buffer.width();
        let height = self.buffer.height();

        let trace_bucket = |bucket: &Bucket| -> Vec<PixelUpdate> {
            bucket
                .pixels()
                .filter_map(|(x, y)| {
                    let index = (y * width + x) as usize;
                    if !self.buffer.needs_samples(index) {
                        return None;
                    }
                    let sample_index = self.buffer.pixel_at(index).count() as u64;
                    let mut sampler = Sampler::for_pixel(self.config.seed, index as u64, sample_index);
                    let ray = camera.generate_ray(x, y, width, height, &mut sampler)?;
                    let path = ctx.trace(ray, &mut sampler, self.history[index].as_ref());
                    Some(PixelUpdate {
                        index,
                        radiance: path.radiance,
                        reservoir: path.reservoir,
                        non_finite: path.non_finite,
                    })
                })
                .collect()
        };

        if self.config.parallel {
            self.buckets.par_iter().flat_map_iter(trace_bucket).collect()
        } else {
            self.buckets.iter().flat_map(trace_bucket).collect()
        }
    }
}
