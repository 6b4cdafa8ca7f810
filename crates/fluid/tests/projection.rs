mod common;

use fluid::{FieldKind, Rgb, SimulationParams};

const DYE: Rgb = Rgb::new(0.2, 0.2, 0.2);

fn smooth_params(iterations: u32) -> SimulationParams {
    SimulationParams {
        splat_radius: 2.0,
        pressure_iterations: iterations,
        ..common::small_params()
    }
}

/// Mean |divergence| before and after one projection of a single splat.
fn divergence_around_projection(iterations: u32) -> Option<(f32, f32)> {
    let mut engine = common::engine(64, 64, smooth_params(iterations))?;
    engine.splat(0.5, 0.5, 40.0, 0.0, DYE);
    engine.flush_splats().unwrap();
    let before = engine.measure_divergence().unwrap().mean_abs(0);
    engine.project().unwrap();
    let after = engine.measure_divergence().unwrap().mean_abs(0);
    Some((before, after))
}

#[test]
fn projection_reduces_divergence() {
    let Some((before, after)) = divergence_around_projection(20) else {
        return;
    };
    assert!(before > 0.0, "splat produced no divergence");
    assert!(after <= before, "divergence grew: {before} -> {after}");
}

#[test]
fn more_iterations_remove_more_divergence() {
    let Some((before, four)) = divergence_around_projection(4) else {
        return;
    };
    let Some((_, twenty_four)) = divergence_around_projection(24) else {
        return;
    };
    assert!(four < before, "{four} !< {before}");
    assert!(twenty_four < four, "{twenty_four} !< {four}");
}

#[test]
fn zero_iterations_leave_velocity_untouched() {
    let Some(mut engine) = common::engine(64, 64, smooth_params(0)) else {
        return;
    };
    engine.splat(0.4, 0.6, 25.0, -10.0, DYE);
    engine.flush_splats().unwrap();
    let velocity = engine.read_field(FieldKind::Velocity).unwrap();
    let pressure = engine.read_field(FieldKind::Pressure).unwrap();

    engine.project().unwrap();

    assert!(velocity.bitwise_eq(&engine.read_field(FieldKind::Velocity).unwrap()));
    assert!(pressure.bitwise_eq(&engine.read_field(FieldKind::Pressure).unwrap()));
    assert_eq!(pressure.max_abs(0), 0.0);
}

#[test]
fn zero_iterations_still_refresh_divergence() {
    let Some(mut engine) = common::engine(64, 64, smooth_params(0)) else {
        return;
    };
    assert_eq!(engine.read_field(FieldKind::Divergence).unwrap().max_abs(0), 0.0);

    engine.splat(0.4, 0.6, 25.0, -10.0, DYE);
    engine.step(1.0 / 60.0).unwrap();
    let divergence = engine.read_field(FieldKind::Divergence).unwrap();
    assert!(divergence.max_abs(0) > 0.0, "divergence left stale");
    assert_eq!(engine.read_field(FieldKind::Pressure).unwrap().max_abs(0), 0.0);
}

#[test]
fn reset_clears_every_field() {
    let Some(mut engine) = common::engine(64, 64, smooth_params(10)) else {
        return;
    };
    engine.splat(0.5, 0.5, 40.0, 0.0, DYE);
    engine.step(1.0 / 60.0).unwrap();
    assert!(engine.read_field(FieldKind::Pressure).unwrap().max_abs(0) > 0.0);

    engine.reset();
    for kind in [
        FieldKind::Velocity,
        FieldKind::Dye,
        FieldKind::Pressure,
        FieldKind::Divergence,
        FieldKind::Curl,
    ] {
        let snapshot = engine.read_field(kind).unwrap();
        for channel in 0..kind.components() {
            assert_eq!(snapshot.max_abs(channel), 0.0, "{kind} not cleared");
        }
    }
}
