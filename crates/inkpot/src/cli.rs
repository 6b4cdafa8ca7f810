use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use fluidconfig::MAX_DISPLAY_DIMENSION;

#[derive(Parser, Debug)]
#[command(
    name = "inkpot",
    author,
    version,
    about = "Ink-in-water fluid simulation",
    arg_required_else_help = false
)]
pub struct Cli {
    /// Configuration file to use instead of the one in the user config directory.
    #[arg(long, global = true, value_name = "FILE", env = "INKPOT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open an interactive preview window (the default).
    Preview(PreviewArgs),
    /// Simulate offscreen for a number of frames and export the last one as PNG.
    Render(RenderArgs),
    /// Inspect or generate configuration files.
    Config(ConfigCommand),
}

#[derive(Args, Debug, Default)]
pub struct PreviewArgs {
    /// Initial window size (e.g. `1280x720`); defaults to `[display]` in the config.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_dimensions)]
    pub size: Option<(u32, u32)>,

    /// Disable idle auto-splatting.
    #[arg(long)]
    pub no_ambient: bool,

    /// Seed for ambient splats; overrides `ambient.seed`.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Start with the simulation paused.
    #[arg(long)]
    pub paused: bool,
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Destination PNG file.
    #[arg(long, short, value_name = "PATH", value_parser = parse_export_path)]
    pub output: PathBuf,

    /// Number of simulation steps before the frame is captured.
    #[arg(long, value_name = "COUNT", default_value_t = 120)]
    pub frames: u32,

    /// Output size (e.g. `1920x1080`); defaults to `[display]` in the config.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_dimensions)]
    pub size: Option<(u32, u32)>,

    /// Timestep per frame in seconds.
    #[arg(long, value_name = "SECONDS", default_value_t = 1.0 / 60.0)]
    pub dt: f32,

    /// Random splats injected before the first step.
    #[arg(long, value_name = "COUNT", default_value_t = 8)]
    pub splats: u32,

    /// Seed for random splats; overrides `ambient.seed`.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
}

#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate a configuration file (defaults to the active one).
    Check {
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
    /// Print where the configuration file is looked up.
    Where,
    /// Print the default configuration as TOML.
    Default,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_export_path(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    match extension(&path).as_deref() {
        Some("png") => Ok(path),
        None => Err("export path has no extension; expected .png".to_string()),
        Some(other) => Err(format!(
            "unsupported export format '.{other}'; expected .png"
        )),
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

pub fn parse_dimensions(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width '{}'", w.trim()))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height '{}'", h.trim()))?;
    if width == 0 || height == 0 {
        return Err("dimensions must be greater than zero".into());
    }
    if width > MAX_DISPLAY_DIMENSION || height > MAX_DISPLAY_DIMENSION {
        return Err(format!("dimensions must not exceed {MAX_DISPLAY_DIMENSION}"));
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dimensions() {
        assert_eq!(parse_dimensions("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_dimensions(" 64 X 32 ").unwrap(), (64, 32));
        assert!(parse_dimensions("1280").is_err());
        assert!(parse_dimensions("0x720").is_err());
        assert!(parse_dimensions("wide x tall").is_err());
        assert!(parse_dimensions("20000x100").is_err());
        assert_eq!(parse_dimensions("16384x1").unwrap(), (16384, 1));
    }

    #[test]
    fn export_path_must_be_png() {
        assert!(parse_export_path("frame.png").is_ok());
        assert!(parse_export_path("frame.PNG").is_ok());
        assert!(parse_export_path("frame.exr").is_err());
        assert!(parse_export_path("frame").is_err());
    }

    #[test]
    fn bare_invocation_has_no_subcommand() {
        let cli = Cli::try_parse_from(["inkpot"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn render_arguments_parse() {
        let cli = Cli::try_parse_from([
            "inkpot", "render", "--output", "out.png", "--frames", "10", "--size", "320x200",
        ])
        .unwrap();
        let Some(Command::Render(args)) = cli.command else {
            panic!("expected render subcommand");
        };
        assert_eq!(args.frames, 10);
        assert_eq!(args.size, Some((320, 200)));
        assert_eq!(args.splats, 8);
    }
}
