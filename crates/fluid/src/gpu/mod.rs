//! GPU side of the simulation.
//!
//! - `context` owns the wgpu instance/adapter/device and probes which field
//!   formats the adapter can render to and filter.
//! - `fields` allocates the field textures, the ping-pong pairs and handles
//!   synchronous read-back.
//! - `kernels` holds the GLSL for every stage and compiles it through naga.
//! - `programs` turns kernels into cached render pipelines and records passes.
//! - `uniforms` mirrors the shared `StageParams` block.
//! - `engine` sequences the passes of one step and exposes the public API.

mod context;
mod engine;
mod fields;
mod kernels;
mod programs;
mod uniforms;

pub use context::{create_instance, AdapterProfile, FieldFormat, FieldFormats, GpuContext};
pub use engine::FluidEngine;
pub use fields::{DoubleField, Field, FieldSnapshot, FieldStore, PingPong};
