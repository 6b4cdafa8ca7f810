mod common;

use fluid::{FieldKind, GridResolution, Rgb};
use tempfile::TempDir;

const DT: f32 = 1.0 / 60.0;

fn scripted_run() -> Option<(fluid::FieldSnapshot, fluid::FieldSnapshot)> {
    let mut engine = common::engine(96, 64, common::small_params())?;
    for frame in 0..6 {
        let t = frame as f32 / 6.0;
        engine.splat(0.2 + 0.1 * t, 0.5, 30.0, 10.0 * t, Rgb::new(0.4, 0.2 * t, 0.1));
        engine.step(DT).unwrap();
    }
    Some((
        engine.read_field(FieldKind::Velocity).unwrap(),
        engine.read_field(FieldKind::Dye).unwrap(),
    ))
}

#[test]
fn identical_inputs_give_identical_fields() {
    let Some((velocity_a, dye_a)) = scripted_run() else {
        return;
    };
    let Some((velocity_b, dye_b)) = scripted_run() else {
        return;
    };
    assert!(velocity_a.bitwise_eq(&velocity_b));
    assert!(dye_a.bitwise_eq(&dye_b));
}

#[test]
fn resize_is_deferred_and_round_trips() {
    let params = common::small_params();
    let Some(mut engine) = common::engine(160, 90, params) else {
        return;
    };
    let original = engine.resolution();
    assert_eq!(
        original,
        GridResolution::for_viewport(160, 90, params.sim_resolution, params.dye_resolution)
    );

    engine.resize(90, 160);
    assert_eq!(engine.resolution(), original, "resize applied before frame boundary");
    engine.step(DT).unwrap();
    let portrait = engine.resolution();
    assert_eq!(
        portrait,
        GridResolution::for_viewport(90, 160, params.sim_resolution, params.dye_resolution)
    );
    let velocity = engine.read_field(FieldKind::Velocity).unwrap();
    assert_eq!((velocity.width, velocity.height), portrait.sim_size());
    let dye = engine.read_field(FieldKind::Dye).unwrap();
    assert_eq!((dye.width, dye.height), portrait.dye_size());

    engine.resize(160, 90);
    engine.step(DT).unwrap();
    assert_eq!(engine.resolution(), original);
}

#[test]
fn resize_discards_previous_state() {
    let Some(mut engine) = common::engine(64, 64, common::small_params()) else {
        return;
    };
    engine.splat(0.5, 0.5, 20.0, 0.0, Rgb::new(0.5, 0.5, 0.5));
    engine.step(DT).unwrap();
    engine.resize(128, 64);
    engine.step(DT).unwrap();
    assert_eq!(engine.read_field(FieldKind::Dye).unwrap().max_abs(0), 0.0);
}

#[test]
fn paused_engine_holds_state_and_queue() {
    let Some(mut engine) = common::engine(64, 64, common::small_params()) else {
        return;
    };
    engine.pause();
    engine.splat(0.5, 0.5, 20.0, 0.0, Rgb::new(0.5, 0.5, 0.5));
    engine.step(DT).unwrap();
    assert!(engine.is_paused());
    assert_eq!(engine.frame(), 0);
    assert_eq!(engine.pending_splats(), 1);

    engine.resume();
    engine.step(DT).unwrap();
    assert_eq!(engine.frame(), 1);
    assert_eq!(engine.pending_splats(), 0);
    assert!(engine.read_field(FieldKind::Dye).unwrap().max_abs(0) > 0.0);
}

#[test]
fn changing_baseline_resolution_reallocates_at_next_step() {
    let Some(mut engine) = common::engine(64, 64, common::small_params()) else {
        return;
    };
    engine.set_resolution(32, 64);
    assert_eq!(engine.resolution().sim_size(), (64, 64));
    engine.step(DT).unwrap();
    assert_eq!(engine.resolution().sim_size(), (32, 32));
    assert_eq!(engine.resolution().dye_size(), (64, 64));
}

#[test]
fn display_is_tone_mapped_dye() {
    let Some(mut engine) = common::engine(64, 64, common::small_params()) else {
        return;
    };
    engine.set_display_exponent(1.0);
    engine.splat(0.5, 0.5, 0.0, 0.0, Rgb::new(0.5, 0.25, 0.0));
    engine.flush_splats().unwrap();

    let display = engine.read_field(FieldKind::Display).unwrap();
    let center = display.sample_uv(0.5, 0.5);
    assert!((center[0] - 0.5).abs() < 0.02, "{center:?}");
    assert!((center[1] - 0.25).abs() < 0.02, "{center:?}");
    assert!(center[2] < 0.01);
    // Alpha follows the brightest channel.
    assert!((center[3] - center[0]).abs() < 0.01);
}

#[test]
fn export_writes_png_with_requested_size() {
    let Some(mut engine) = common::engine(64, 64, common::small_params()) else {
        return;
    };
    engine.splat(0.5, 0.5, 10.0, 0.0, Rgb::new(0.5, 0.1, 0.4));
    engine.step(DT).unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("frame.png");
    engine.export_png(&path, 80, 60).unwrap();

    let image = image::open(&path).expect("exported png decodes").to_rgba8();
    assert_eq!(image.dimensions(), (80, 60));
    let center = image.get_pixel(40, 30);
    assert!(center.0[0] > 0, "ink missing from exported frame");
}

#[test]
fn export_to_missing_directory_reports_path() {
    let Some(mut engine) = common::engine(32, 32, common::small_params()) else {
        return;
    };
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing").join("frame.png");
    let err = engine.export_png(&path, 16, 16).unwrap_err();
    assert!(matches!(err, fluid::FluidError::Export { .. }));
    assert!(err.to_string().contains("frame.png"));
}

#[test]
fn oversized_export_is_rejected_before_allocation() {
    let Some(mut engine) = common::engine(32, 32, common::small_params()) else {
        return;
    };
    let max = engine.context().profile().max_texture_dimension;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("big.png");

    let err = engine.export_png(&path, max + 1, 16).unwrap_err();
    match err {
        fluid::FluidError::ExportSize { width, height, max: limit } => {
            assert_eq!((width, height, limit), (max + 1, 16, max));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!path.exists());
    assert!(engine.render_image(16, max + 1).is_err());

    // The engine stays usable afterwards.
    engine.step(DT).unwrap();
    engine.export_png(&path, 16, 16).unwrap();
}
