use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use fluid::SimulationParams;
use fluidconfig::FluidConfig;
use tracing_subscriber::EnvFilter;

use crate::paths::AppPaths;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Configuration in effect plus the file it came from, if any.
pub struct LoadedConfig {
    pub config: FluidConfig,
    pub source: Option<PathBuf>,
}

/// Loads `explicit` when given; otherwise the user config file if it exists,
/// falling back to built-in defaults.
pub fn load_config(explicit: Option<&Path>, paths: &AppPaths) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = FluidConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?;
        return Ok(LoadedConfig {
            config,
            source: Some(path.to_path_buf()),
        });
    }

    let default_file = paths.config_file();
    if default_file.is_file() {
        let config = FluidConfig::load(&default_file)
            .with_context(|| format!("failed to load configuration {}", default_file.display()))?;
        return Ok(LoadedConfig {
            config,
            source: Some(default_file),
        });
    }

    tracing::debug!(
        path = %default_file.display(),
        "no configuration file found; using defaults"
    );
    Ok(LoadedConfig {
        config: FluidConfig::default(),
        source: None,
    })
}

pub fn simulation_params(config: &FluidConfig) -> SimulationParams {
    let sim = &config.simulation;
    SimulationParams {
        curl_strength: sim.curl_strength,
        splat_radius: sim.splat_radius,
        splat_force: sim.splat_force,
        pressure_iterations: sim.pressure_iterations,
        pressure_decay: sim.pressure_decay,
        velocity_dissipation: sim.velocity_dissipation,
        dye_dissipation: sim.dye_dissipation,
        max_dt: sim.max_dt.as_secs_f32(),
        sim_resolution: sim.sim_resolution,
        dye_resolution: sim.dye_resolution,
        display_exponent: config.display.exponent,
    }
}

/// Command-line seed, then the configured one, then the wall clock.
pub fn resolve_seed(cli_seed: Option<u64>, config: &FluidConfig) -> u64 {
    cli_seed.or(config.ambient.seed).unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or_default()
    })
}
