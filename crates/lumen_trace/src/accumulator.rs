//! Progressive per-pixel accumulation.
//!
//! Every pixel keeps a Welford running mean and second moment, so the
//! displayed value is always the mean of the samples so far and the
//! variance of that mean is available for adaptive sampling.

use glam::Vec3;

use crate::config::RenderConfig;
use crate::error::{TraceError, TraceResult};
use crate::material::Color;

/// Rec. 709 luminance weights.
const LUMINANCE: Vec3 = Vec3::new(0.2126, 0.7152, 0.0722);

/// Luminance of a linear RGB color.
#[inline]
pub fn luminance(color: Color) -> f32 {
    color.dot(LUMINANCE)
}

/// Sampling state of one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelState {
    /// No samples yet
    Clean,
    Accumulating,
    /// Needs no more samples: the sample cap was reached or the estimate
    /// is below the noise threshold
    Converged,
}

/// Running statistics of one pixel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PixelAccumulator {
    count: u32,
    mean: Color,
    m2: Color,
    luminance_mean: f32,
    luminance_m2: f32,
}

impl PixelAccumulator {
    /// Add one sample. Non-finite samples are recorded as black; the return
    /// value is false when that happened.
    pub fn add(&mut self, sample: Color) -> bool {
        let finite = sample.is_finite();
        let sample = if finite { sample } else { Color::ZERO };

        self.count += 1;
        let n = self.count as f32;

        let delta = sample - self.mean;
        self.mean += delta / n;
        self.m2 += delta * (sample - self.mean);

        let y = luminance(sample);
        let delta = y - self.luminance_mean;
        self.luminance_mean += delta / n;
        self.luminance_m2 += delta * (y - self.luminance_mean);

        finite
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Running mean of the samples.
    pub fn mean(&self) -> Color {
        self.mean
    }

    /// Unbiased per-channel sample variance.
    pub fn variance(&self) -> Color {
        if self.count < 2 {
            Color::ZERO
        } else {
            self.m2 / (self.count - 1) as f32
        }
    }

    /// Variance of the mean luminance, `s^2 / n`.
    pub fn mean_variance(&self) -> f32 {
        if self.count < 2 {
            return f32::INFINITY;
        }
        let n = self.count as f32;
        self.luminance_m2 / (n - 1.0) / n
    }
}

/// Linear radiance image produced by [`AccumulationBuffer::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct LinearImage {
    pub width: u32,
    pub height: u32,
    /// Row-major, top row first
    pub pixels: Vec<Color>,
}

impl LinearImage {
    /// Pixel at (x, y).
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Interleaved RGB floats, for upload or file output.
    pub fn as_f32_slice(&self) -> &[f32] {
        bytemuck::cast_slice(&self.pixels)
    }
}

/// Accumulators for every pixel of the image.
#[derive(Debug, Clone)]
pub struct AccumulationBuffer {
    width: u32,
    height: u32,
    pixels: Vec<PixelAccumulator>,
    max_samples: u32,
    convergence_threshold: Option<f32>,
    min_adaptive_samples: u32,
}

impl AccumulationBuffer {
    pub fn new(width: u32, height: u32, config: &RenderConfig) -> TraceResult<Self> {
        let len = pixel_count(width, height)?;
        Ok(Self {
            width,
            height,
            pixels: vec![PixelAccumulator::default(); len],
            max_samples: config.max_samples_per_pixel,
            convergence_threshold: config.convergence_threshold,
            min_adaptive_samples: config.min_adaptive_samples,
        })
    }

    /// Reallocate for a new resolution. All pixels return to clean.
    pub fn resize(&mut self, width: u32, height: u32) -> TraceResult<()> {
        let len = pixel_count(width, height)?;
        self.width = width;
        self.height = height;
        self.pixels = vec![PixelAccumulator::default(); len];
        Ok(())
    }

    /// Adopt the sampling limits of `config` without touching the samples.
    pub fn set_limits(&mut self, config: &RenderConfig) {
        self.max_samples = config.max_samples_per_pixel;
        self.convergence_threshold = config.convergence_threshold;
        self.min_adaptive_samples = config.min_adaptive_samples;
    }

    /// Discard every sample.
    pub fn reset(&mut self) {
        self.pixels.fill(PixelAccumulator::default());
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Row-major index of (x, y), `None` outside the image.
    pub fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| (y * self.width + x) as usize)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<&PixelAccumulator> {
        self.index(x, y).map(|i| &self.pixels[i])
    }

    /// Accumulator by row-major index.
    pub fn pixel_at(&self, index: usize) -> &PixelAccumulator {
        &self.pixels[index]
    }

    /// Current mean radiance at (x, y).
    pub fn radiance(&self, x: u32, y: u32) -> Option<Color> {
        self.pixel(x, y).map(PixelAccumulator::mean)
    }

    pub fn pixel_state(&self, x: u32, y: u32) -> Option<PixelState> {
        self.index(x, y).map(|i| self.state_at(i))
    }

    /// State of the pixel at `index`.
    pub fn state_at(&self, index: usize) -> PixelState {
        let pixel = &self.pixels[index];
        if pixel.count == 0 {
            return PixelState::Clean;
        }
        if pixel.count >= self.max_samples {
            return PixelState::Converged;
        }
        if let Some(threshold) = self.convergence_threshold {
            if pixel.count >= self.min_adaptive_samples.max(2) && pixel.mean_variance() < threshold {
                return PixelState::Converged;
            }
        }
        PixelState::Accumulating
    }

    /// True if the pixel at `index` should receive more samples.
    pub fn needs_samples(&self, index: usize) -> bool {
        self.state_at(index) != PixelState::Converged
    }

    /// Add a sample to the pixel at `index`. Converged pixels ignore it.
    /// Returns false if the sample was ignored or not finite.
    pub fn add_sample(&mut self, index: usize, sample: Color) -> bool {
        if !self.needs_samples(index) {
            return false;
        }
        self.pixels[index].add(sample)
    }

    /// Number of converged pixels.
    pub fn converged_count(&self) -> usize {
        (0..self.pixels.len())
            .filter(|&i| self.state_at(i) == PixelState::Converged)
            .count()
    }

    /// True when every pixel is converged.
    pub fn is_converged(&self) -> bool {
        (0..self.pixels.len()).all(|i| self.state_at(i) == PixelState::Converged)
    }

    /// Snapshot of the current means.
    pub fn resolve(&self) -> LinearImage {
        LinearImage {
            width: self.width,
            height: self.height,
            pixels: self.pixels.iter().map(PixelAccumulator::mean).collect(),
        }
    }
}

fn pixel_count(width: u32, height: u32) -> TraceResult<usize> {
    if width == 0 || height == 0 {
        return Err(TraceError::InvalidResolution { width, height });
    }
    (width as usize)
        .checked_mul(height as usize)
        .filter(|&n| n <= u32::MAX as usize)
        .ok_or(TraceError::InvalidResolution { width, height })
}
