#![allow(dead_code)]

use fluid::{FluidEngine, GpuContext, SimulationParams};

/// Small grids keep software adapters fast.
pub fn small_params() -> SimulationParams {
    SimulationParams {
        sim_resolution: 64,
        dye_resolution: 128,
        ..SimulationParams::default()
    }
}

/// Builds an engine, or returns `None` (after logging) when the machine has
/// no usable adapter.
pub fn engine(width: u32, height: u32, params: SimulationParams) -> Option<FluidEngine> {
    match GpuContext::headless() {
        Ok(context) => {
            Some(FluidEngine::new(context, width, height, params).expect("engine builds on a working adapter"))
        }
        Err(err) => {
            eprintln!("skipping GPU test: {err}");
            None
        }
    }
}
