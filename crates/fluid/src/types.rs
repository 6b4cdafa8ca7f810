use std::fmt;

/// Baseline cell count on the shorter axis of the velocity/pressure grid.
pub const DEFAULT_SIM_RESOLUTION: u32 = 256;
/// Baseline cell count on the shorter axis of the dye grid.
pub const DEFAULT_DYE_RESOLUTION: u32 = 1024;
/// Longest timestep a single `step` will integrate, in seconds.
pub const DEFAULT_MAX_DT: f32 = 1.0 / 60.0;

/// Simulated quantities owned by the field store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Velocity,
    Dye,
    Pressure,
    Divergence,
    Curl,
    /// Offscreen tone-mapped output used for frame export.
    Display,
}

impl FieldKind {
    /// Number of meaningful components stored per cell.
    pub fn components(self) -> usize {
        match self {
            FieldKind::Velocity => 2,
            FieldKind::Pressure | FieldKind::Divergence | FieldKind::Curl => 1,
            FieldKind::Dye => 3,
            FieldKind::Display => 4,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Velocity => "velocity",
            FieldKind::Dye => "dye",
            FieldKind::Pressure => "pressure",
            FieldKind::Divergence => "divergence",
            FieldKind::Curl => "curl",
            FieldKind::Display => "display",
        };
        f.write_str(name)
    }
}

/// Linear RGB triple used for dye injection.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self::new(self.r * factor, self.g * factor, self.b * factor)
    }

    pub(crate) fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, 1.0]
    }
}

/// A single Gaussian injection of momentum and dye.
///
/// Positions are in UV space with a bottom-left origin. Values outside
/// `[0, 1]` are accepted as-is; the Gaussian falloff and edge clamping
/// attenuate them naturally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplatRequest {
    pub position: [f32; 2],
    pub impulse: [f32; 2],
    pub color: Rgb,
}

impl SplatRequest {
    pub fn new(u: f32, v: f32, dx: f32, dy: f32, color: Rgb) -> Self {
        Self {
            position: [u, v],
            impulse: [dx, dy],
            color,
        }
    }
}

/// Tunable simulation parameters.
///
/// Every field is read at the start of the next `step`, so changes take
/// effect immediately without smoothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    /// Vorticity confinement strength.
    pub curl_strength: f32,
    /// Splat radius in percent of the shorter viewport axis (divided by 100 in the kernel).
    pub splat_radius: f32,
    /// Multiplier applied to pointer deltas before they become impulses.
    pub splat_force: f32,
    /// Jacobi sweeps per pressure solve. Zero disables projection.
    pub pressure_iterations: u32,
    /// Factor applied to the previous frame's pressure before the solve.
    pub pressure_decay: f32,
    pub velocity_dissipation: f32,
    pub dye_dissipation: f32,
    /// Upper bound for the timestep handed to `step`.
    pub max_dt: f32,
    pub sim_resolution: u32,
    pub dye_resolution: u32,
    /// Exponent of the display tone curve.
    pub display_exponent: f32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            curl_strength: 30.0,
            splat_radius: 0.25,
            splat_force: 6000.0,
            pressure_iterations: 20,
            pressure_decay: 0.8,
            velocity_dissipation: 0.2,
            dye_dissipation: 1.0,
            max_dt: DEFAULT_MAX_DT,
            sim_resolution: DEFAULT_SIM_RESOLUTION,
            dye_resolution: DEFAULT_DYE_RESOLUTION,
            display_exponent: 0.85,
        }
    }
}

impl SimulationParams {
    /// Clamps a host-supplied frame delta into the stable integration range.
    ///
    /// Non-finite and negative values collapse to zero so a stalled or
    /// misbehaving clock never injects a huge advection step.
    pub fn clamp_dt(&self, dt: f32) -> f32 {
        if !dt.is_finite() || dt <= 0.0 {
            return 0.0;
        }
        dt.min(self.max_dt.max(0.0))
    }

    /// Splat radius as consumed by the splat kernel for a viewport aspect ratio.
    pub fn corrected_radius(&self, aspect: f32) -> f32 {
        let radius = self.splat_radius / 100.0;
        if aspect > 1.0 {
            radius * aspect
        } else {
            radius
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_dt_bounds_stalled_clocks() {
        let params = SimulationParams::default();
        assert_eq!(params.clamp_dt(5.0), DEFAULT_MAX_DT);
        assert_eq!(params.clamp_dt(0.004), 0.004);
        assert_eq!(params.clamp_dt(-1.0), 0.0);
        assert_eq!(params.clamp_dt(f32::NAN), 0.0);
        assert_eq!(params.clamp_dt(f32::INFINITY), 0.0);
    }

    #[test]
    fn radius_grows_with_wide_viewports_only() {
        let params = SimulationParams::default();
        let base = params.splat_radius / 100.0;
        assert!((params.corrected_radius(1.0) - base).abs() < 1e-9);
        assert!((params.corrected_radius(0.5) - base).abs() < 1e-9);
        assert!((params.corrected_radius(2.0) - base * 2.0).abs() < 1e-9);
    }

    #[test]
    fn field_components_match_storage_layout() {
        assert_eq!(FieldKind::Velocity.components(), 2);
        assert_eq!(FieldKind::Pressure.components(), 1);
        assert_eq!(FieldKind::Dye.components(), 3);
        assert_eq!(FieldKind::Dye.to_string(), "dye");
    }
}
