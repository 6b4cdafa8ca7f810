use std::fs;
use std::time::{Duration, Instant};

use ambient::AmbientSplatter;
use anyhow::{bail, Context, Result};
use fluid::{FluidEngine, GpuContext};
use fluidconfig::FluidConfig;

use crate::cli::RenderArgs;
use crate::run;

/// Runs the simulation offscreen on a fixed clock and writes the last frame.
pub fn render(args: RenderArgs, config: &FluidConfig) -> Result<()> {
    if !args.dt.is_finite() || args.dt <= 0.0 {
        bail!("--dt must be a positive number of seconds (got {})", args.dt);
    }
    let (width, height) = args
        .size
        .unwrap_or((config.display.width, config.display.height));

    let context = GpuContext::headless().context("failed to acquire a GPU adapter")?;
    tracing::info!(
        adapter = %context.profile().name,
        backend = ?context.profile().backend,
        width,
        height,
        frames = args.frames,
        "rendering offscreen"
    );
    let mut engine = FluidEngine::new(context, width, height, run::simulation_params(config))
        .context("failed to initialise the fluid engine")?;

    let seed = run::resolve_seed(args.seed, config);
    let mut splatter = AmbientSplatter::new(&config.ambient, seed)?;
    engine.submit_splats(splatter.random_splats(args.splats));

    // Ambient splats follow simulated time, so output depends only on the seed.
    let start = Instant::now();
    let frame_time = Duration::from_secs_f32(args.dt);
    for frame in 0..args.frames {
        engine.submit_splats(splatter.tick(start + frame_time * frame, false));
        engine
            .step(args.dt)
            .with_context(|| format!("simulation step {frame} failed"))?;
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    engine.export_png(&args.output, width, height)?;
    tracing::info!(path = %args.output.display(), seed, "frame exported");
    Ok(())
}
