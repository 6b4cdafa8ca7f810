//! GPU-resident "ink in water" fluid simulation.
//!
//! An operator-split incompressible Navier-Stokes solver running entirely in
//! fragment kernels on `wgpu`. The flow of one frame is:
//!
//! ```text
//!   pointer / ambient / event splats
//!          │ SplatRequest
//!          ▼
//!   FluidEngine::step(dt) ──▶ splat ─▶ curl ─▶ vorticity ─▶ advect ─▶ project
//!          │
//!          └─▶ FluidEngine::render_to(view) ─▶ display tone-map ─▶ host target
//! ```
//!
//! Velocity and pressure live on a coarse grid, dye on a finer one; both are
//! derived from the viewport by [`GridResolution`]. Fields are double
//! buffered ([`PingPong`]) so no pass reads and writes the same texture.
//!
//! CPU-side pieces ([`PointerTracker`], [`ColorGenerator`],
//! [`GridResolution`]) are plain data and usable without a GPU.

mod color;
mod error;
mod gpu;
mod input;
mod resolution;
mod types;

pub use color::{hsv_to_rgb, ColorGenerator};
pub use error::FluidError;
pub use gpu::{
    create_instance, AdapterProfile, DoubleField, Field, FieldFormat, FieldFormats,
    FieldSnapshot, FieldStore, FluidEngine, GpuContext, PingPong,
};
pub use input::{correct_delta, Pointer, PointerId, PointerTracker};
pub use resolution::{aspect_ratio, GridResolution};
pub use types::{
    FieldKind, Rgb, SimulationParams, SplatRequest, DEFAULT_DYE_RESOLUTION, DEFAULT_MAX_DT,
    DEFAULT_SIM_RESOLUTION,
};

/// Re-exported so hosts can name surface formats and views without a
/// separate dependency on a matching `wgpu` version.
pub use wgpu;
