//! Lumen math - glam re-exports plus the ray-tracing primitives shared by
//! the BVH and the integrator.

// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod interval;
mod ray;
mod transform;

pub use aabb::Aabb;
pub use interval::Interval;
pub use ray::Ray;
pub use transform::Mat4Ext;
