mod cli;
mod headless;
mod paths;
mod preview;
mod run;

use std::path::Path;

use anyhow::{Context, Result};
use cli::{Command, ConfigAction};
use fluidconfig::FluidConfig;
use paths::AppPaths;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    let paths = AppPaths::discover()?;
    match cli.command {
        Some(Command::Config(config_cmd)) => {
            handle_config_command(config_cmd.action, cli.config.as_deref(), &paths)
        }
        Some(Command::Render(args)) => {
            let loaded = run::load_config(cli.config.as_deref(), &paths)?;
            headless::render(args, &loaded.config)
        }
        Some(Command::Preview(args)) => launch_preview(args, cli.config.as_deref(), &paths),
        None => launch_preview(cli::PreviewArgs::default(), cli.config.as_deref(), &paths),
    }
}

fn launch_preview(args: cli::PreviewArgs, explicit: Option<&Path>, paths: &AppPaths) -> Result<()> {
    let loaded = run::load_config(explicit, paths)?;
    if let Some(source) = &loaded.source {
        tracing::info!(config = %source.display(), "loaded configuration");
    }
    preview::run(args, loaded.config, paths)
}

fn handle_config_command(
    action: ConfigAction,
    explicit: Option<&Path>,
    paths: &AppPaths,
) -> Result<()> {
    match action {
        ConfigAction::Check { file } => {
            let target = file
                .or_else(|| explicit.map(Path::to_path_buf))
                .unwrap_or_else(|| paths.config_file());
            let config = FluidConfig::load(&target)
                .with_context(|| format!("{} is not a valid configuration", target.display()))?;
            println!("{}: ok", target.display());
            println!(
                "  simulation: {} pressure iterations, sim {} / dye {}",
                config.simulation.pressure_iterations,
                config.simulation.sim_resolution,
                config.simulation.dye_resolution
            );
            println!(
                "  ambient:    {} (every {})",
                if config.ambient.enabled { "on" } else { "off" },
                format_seconds(config.ambient.interval)
            );
            Ok(())
        }
        ConfigAction::Where => {
            let file = explicit
                .map(Path::to_path_buf)
                .unwrap_or_else(|| paths.config_file());
            println!("Configuration file:");
            println!(
                "  {} ({})",
                file.display(),
                if file.is_file() { "present" } else { "missing" }
            );
            println!("Snapshots:");
            println!("  {}", paths.snapshot_dir().display());
            Ok(())
        }
        ConfigAction::Default => {
            print!("{}", FluidConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}

fn format_seconds(value: std::time::Duration) -> String {
    format!("{:.2}s", value.as_secs_f64())
}
