//! Lumen trace - progressive CPU path tracing.
//!
//! A Monte Carlo path tracer over a BVH of instanced triangle meshes, with
//! next-event estimation through a weighted-reservoir light resampler and
//! per-pixel progressive accumulation.
//!
//! The host hands over a flattened [`SceneSnapshot`] and a [`Camera`]; the
//! [`Renderer`] traces one sample per pixel per [`Renderer::render_frame`]
//! and exposes the running mean radiance. Tone mapping and display are left
//! to the host.

mod accumulator;
mod bucket;
mod bvh;
mod camera;
mod config;
mod error;
mod frame;
mod hittable;
mod integrator;
mod light;
mod material;
mod primitive;
mod reservoir;
mod sampler;
mod scene;

pub use accumulator::{luminance, AccumulationBuffer, LinearImage, PixelAccumulator, PixelState};
pub use bucket::{generate_buckets, Bucket, DEFAULT_BUCKET_SIZE};
pub use bvh::{Bvh, BvhNode, MAX_DEPTH};
pub use camera::Camera;
pub use config::{Contributions, LightStrategy, RenderConfig};
pub use error::{TraceError, TraceResult};
pub use frame::{FrameStats, ResetHandle, Renderer};
pub use hittable::{Hit, Hittable};
pub use integrator::{PathSample, TraceContext};
pub use light::{Light, LightConnection, LightSample, LightSampler};
pub use material::{Color, Lobe, Material, ScatterSample, METAL_THRESHOLD};
pub use primitive::{intersect_triangle, Primitive, TriangleHit, MIN_HIT_DISTANCE, TRIANGLES_PER_PRIMITIVE};
pub use reservoir::Reservoir;
pub use sampler::{concentric_disk, cosine_direction, cosine_hemisphere, Sampler};
pub use scene::{
    LightDescriptor, LightShape, MaterialId, ObjectId, SceneGeometry, SceneObject, SceneSnapshot,
    TriangleMesh,
};

/// Re-export the math types used throughout the API
pub use lumen_math::{Aabb, Interval, Mat4, Ray, Vec2, Vec3};
