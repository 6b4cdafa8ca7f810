use std::path::PathBuf;

use crate::types::FieldKind;

/// Errors surfaced by the simulation core.
///
/// Degraded texture precision is deliberately absent: the field store falls
/// back to the best available format and only logs a warning.
#[derive(Debug, thiserror::Error)]
pub enum FluidError {
    #[error("no suitable GPU adapter available: {0}")]
    Adapter(String),
    #[error("failed to create GPU device: {0}")]
    Device(String),
    #[error("failed to compile {stage} kernel: {message}")]
    ShaderCompile { stage: &'static str, message: String },
    #[error("failed to link {stage} pipeline: {message}")]
    PipelineLink { stage: &'static str, message: String },
    #[error("failed to read back {kind} field: {message}")]
    ReadBack { kind: FieldKind, message: String },
    #[error("export size {width}x{height} exceeds the adapter limit of {max}")]
    ExportSize { width: u32, height: u32, max: u32 },
    #[error("failed to write image to {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
