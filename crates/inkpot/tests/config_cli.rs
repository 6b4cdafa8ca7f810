use std::fs;
use std::process::{Command, Output};

use fluidconfig::FluidConfig;
use tempfile::TempDir;

fn inkpot(root: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_inkpot"))
        .env("INKPOT_CONFIG_DIR", root.path().join("config"))
        .env("INKPOT_DATA_DIR", root.path().join("data"))
        .env_remove("INKPOT_CONFIG")
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run inkpot")
}

#[test]
fn config_default_prints_a_valid_document() {
    let root = TempDir::new().unwrap();
    let output = inkpot(&root, &["config", "default"]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let parsed = FluidConfig::from_toml_str(&stdout).expect("default output should parse");
    assert_eq!(parsed, FluidConfig::default());
}

#[test]
fn config_check_reports_valid_and_invalid_files() {
    let root = TempDir::new().unwrap();
    let good = root.path().join("good.toml");
    let bad = root.path().join("bad.toml");
    fs::write(&good, "version = 1\n[simulation]\ncurl_strength = 10\n").unwrap();
    fs::write(&bad, "version = 1\n[simulation]\npressure_decay = 3\n").unwrap();

    let output = inkpot(&root, &["config", "check", good.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(": ok"));

    let output = inkpot(&root, &["config", "check", bad.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("pressure_decay"));
}

#[test]
fn config_check_defaults_to_user_config_file() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let missing = inkpot(&root, &["config", "check"]);
    assert!(!missing.status.success());

    fs::write(config_dir.join("inkpot.toml"), "version = 1\n").unwrap();
    let present = inkpot(&root, &["config", "check"]);
    assert!(present.status.success());
}

#[test]
fn config_where_honours_directory_overrides() {
    let root = TempDir::new().unwrap();
    let output = inkpot(&root, &["config", "where"]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let expected = root.path().join("config").join("inkpot.toml");
    assert!(stdout.contains(&expected.display().to_string()));
    assert!(stdout.contains("missing"));
    assert!(stdout.contains("snapshots"));
}

#[test]
fn render_rejects_non_png_output() {
    let root = TempDir::new().unwrap();
    let output = inkpot(&root, &["render", "--output", "frame.jpg"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("expected .png"));
}

#[test]
fn render_rejects_sizes_beyond_the_display_limit() {
    let root = TempDir::new().unwrap();
    let output = inkpot(&root, &["render", "--size", "20000x100"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("must not exceed"));
}
