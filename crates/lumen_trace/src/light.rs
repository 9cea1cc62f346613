//! Light descriptors prepared for next-event estimation.

use glam::{Vec2, Vec3};

use crate::material::Color;
use crate::sampler::Sampler;
use crate::scene::{LightDescriptor, LightShape};

/// A point chosen on a light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSample {
    pub position: Vec3,
    /// Emitting side of an area light; `None` for point lights.
    pub normal: Option<Vec3>,
    pub emission: Color,
    /// Probability density of choosing this sample: selection probability,
    /// times `1 / area` for area lights.
    pub pdf: f32,
}

/// Geometry between a shading point and a light sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightConnection {
    /// Unit direction from the shading point to the light
    pub direction: Vec3,
    pub distance: f32,
    /// Unshadowed target value `max(0, N.L) * attenuation`
    pub target: f32,
}

impl LightSample {
    /// Connect a shading point to this sample. Returns `None` when the light
    /// cannot contribute: it lies behind the surface, faces away, or sits on
    /// the point itself.
    pub fn connect(&self, point: Vec3, normal: Vec3) -> Option<LightConnection> {
        let to_light = self.position - point;
        let distance_squared = to_light.length_squared();
        if !(distance_squared > 1e-12) {
            return None;
        }
        let distance = distance_squared.sqrt();
        let direction = to_light / distance;

        let cos_surface = normal.dot(direction);
        if cos_surface <= 0.0 {
            return None;
        }

        let attenuation = match self.normal {
            None => 1.0 / distance_squared,
            Some(light_normal) => {
                let cos_light = light_normal.dot(-direction);
                if cos_light <= 0.0 {
                    return None;
                }
                cos_light / distance_squared
            }
        };

        let target = cos_surface * attenuation;
        target.is_finite().then_some(LightConnection {
            direction,
            distance,
            target,
        })
    }

    /// Target value at a shading point, zero when it cannot contribute.
    pub fn target(&self, point: Vec3, normal: Vec3) -> f32 {
        self.connect(point, normal).map_or(0.0, |c| c.target)
    }
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    Point,
    Quad {
        edge_u: Vec3,
        edge_v: Vec3,
        normal: Vec3,
        area: f32,
    },
}

/// A light ready for sampling.
#[derive(Debug, Clone, Copy)]
pub struct Light {
    position: Vec3,
    emission: Color,
    shape: Shape,
}

impl Light {
    /// Prepare a descriptor. Returns `None` for lights that emit nothing or
    /// have a degenerate shape.
    pub fn new(descriptor: &LightDescriptor) -> Option<Self> {
        let emission = descriptor.emission();
        if !emission.is_finite() || emission.max_element() <= 0.0 || !descriptor.position.is_finite() {
            return None;
        }

        let shape = match descriptor.shape {
            LightShape::Point => Shape::Point,
            LightShape::Quad { edge_u, edge_v } => {
                let cross = edge_u.cross(edge_v);
                let area = cross.length();
                if !(area > 0.0) || !area.is_finite() {
                    return None;
                }
                Shape::Quad {
                    edge_u,
                    edge_v,
                    normal: cross / area,
                    area,
                }
            }
        };

        Some(Self {
            position: descriptor.position,
            emission,
            shape,
        })
    }

    /// Sample a point on the light. `selection_pdf` is the probability this
    /// light was chosen.
    pub fn sample(&self, u: Vec2, selection_pdf: f32) -> LightSample {
        match self.shape {
            Shape::Point => LightSample {
                position: self.position,
                normal: None,
                emission: self.emission,
                pdf: selection_pdf,
            },
            Shape::Quad {
                edge_u,
                edge_v,
                normal,
                area,
            } => LightSample {
                position: self.position + edge_u * u.x + edge_v * u.y,
                normal: Some(normal),
                emission: self.emission,
                pdf: selection_pdf / area,
            },
        }
    }

    pub fn emission(&self) -> Color {
        self.emission
    }
}

/// The scene's lights with uniform selection.
#[derive(Debug, Clone, Default)]
pub struct LightSampler {
    lights: Vec<Light>,
}

impl LightSampler {
    pub fn new(descriptors: &[LightDescriptor]) -> Self {
        let lights: Vec<Light> = descriptors.iter().filter_map(Light::new).collect();
        if lights.len() < descriptors.len() {
            log::debug!(
                "Ignored {} lights with no emission or degenerate shape",
                descriptors.len() - lights.len()
            );
        }
        Self { lights }
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Pick one light uniformly (`floor(u * N)`, pdf `1/N`) and sample it.
    pub fn sample_uniform(&self, sampler: &mut Sampler) -> Option<LightSample> {
        if self.lights.is_empty() {
            return None;
        }
        let index = sampler.next_index(self.lights.len());
        let selection_pdf = 1.0 / self.lights.len() as f32;
        Some(self.lights[index].sample(sampler.next_2d(), selection_pdf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_light_connection() {
        let light = Light::new(&LightDescriptor::point(Vec3::new(0.0, 2.0, 0.0), Color::ONE, 8.0)).unwrap();
        let sample = light.sample(Vec2::ZERO, 1.0);

        let c = sample.connect(Vec3::ZERO, Vec3::Y).unwrap();
        assert!((c.distance - 2.0).abs() < 1e-6);
        assert!((c.target - 0.25).abs() < 1e-6);
        assert_eq!(sample.emission, Color::splat(8.0));

        // Below the surface
        assert!(sample.connect(Vec3::ZERO, Vec3::NEG_Y).is_none());
        assert_eq!(sample.target(Vec3::ZERO, Vec3::NEG_Y), 0.0);
    }

    #[test]
    fn test_quad_light_is_one_sided() {
        // Faces down: X x Z = -Y
        let descriptor = LightDescriptor::quad(Vec3::new(-0.5, 1.0, -0.5), Vec3::X, Vec3::Z, Color::ONE, 1.0);
        let light = Light::new(&descriptor).unwrap();
        let sample = light.sample(Vec2::splat(0.5), 1.0);

        assert!((sample.position - Vec3::Y).length() < 1e-6);
        assert_eq!(sample.normal, Some(Vec3::NEG_Y));
        assert!((sample.pdf - 1.0).abs() < 1e-6);

        let below = sample.connect(Vec3::ZERO, Vec3::Y).unwrap();
        assert!((below.target - 1.0).abs() < 1e-5);

        // A point above the light sees its back.
        assert!(sample.connect(Vec3::new(0.0, 2.0, 0.0), Vec3::NEG_Y).is_none());
    }

    #[test]
    fn test_quad_pdf_includes_area() {
        let descriptor = LightDescriptor::quad(Vec3::ZERO, Vec3::X * 2.0, Vec3::Z * 3.0, Color::ONE, 1.0);
        let light = Light::new(&descriptor).unwrap();
        let sample = light.sample(Vec2::new(0.3, 0.7), 0.5);
        assert!((sample.pdf - 0.5 / 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_lights_are_dropped() {
        let descriptors = [
            LightDescriptor::point(Vec3::ZERO, Color::ONE, 0.0),
            LightDescriptor::quad(Vec3::ZERO, Vec3::X, Vec3::X, Color::ONE, 1.0),
            LightDescriptor::point(Vec3::ZERO, Color::ONE, 1.0),
        ];
        let lights = LightSampler::new(&descriptors);
        assert_eq!(lights.len(), 1);
    }

    #[test]
    fn test_uniform_selection_covers_all_lights() {
        let descriptors: Vec<_> = (0..4)
            .map(|i| LightDescriptor::point(Vec3::new(i as f32, 0.0, 0.0), Color::ONE, 1.0))
            .collect();
        let lights = LightSampler::new(&descriptors);
        let mut sampler = Sampler::new(21);
        let mut counts = [0usize; 4];

        for _ in 0..4000 {
            let sample = lights.sample_uniform(&mut sampler).unwrap();
            assert!((sample.pdf - 0.25).abs() < 1e-6);
            counts[sample.position.x as usize] += 1;
        }
        for count in counts {
            assert!((800..1200).contains(&count), "{counts:?}");
        }
        assert!(LightSampler::new(&[]).sample_uniform(&mut sampler).is_none());
    }
}
