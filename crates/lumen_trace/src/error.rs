//! Error types for scene building and renderer configuration.
//!
//! Only caller mistakes surface here. Degenerate geometry, a missing camera
//! and malformed samples are handled in place and never become errors.

use thiserror::Error;

use crate::scene::{MaterialId, ObjectId};

/// Errors reported by the tracing core.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Invalid render configuration: {0}")]
    InvalidConfig(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Invalid resolution {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },

    #[error("Malformed triangle mesh: {0}")]
    MalformedMesh(String),

    #[error("Object {object:?} references unknown material {material:?}")]
    UnknownMaterial { object: ObjectId, material: MaterialId },
}

/// Result type for tracing-core operations.
pub type TraceResult<T> = Result<T, TraceError>;
