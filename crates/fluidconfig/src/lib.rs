use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

pub const CONFIG_VERSION: u32 = 1;

/// Largest window or export edge accepted in `[display]`. Adapters may
/// support less; exports are checked again against the device limit.
pub const MAX_DISPLAY_DIMENSION: u32 = 16384;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FluidConfig {
    pub version: u32,
    #[serde(default)]
    pub simulation: SimulationSection,
    #[serde(default)]
    pub ambient: AmbientSection,
    #[serde(default)]
    pub bursts: BurstSection,
    #[serde(default)]
    pub display: DisplaySection,
}

/// Solver parameters. Every field may be omitted.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSection {
    pub curl_strength: f32,
    pub splat_radius: f32,
    pub splat_force: f32,
    pub pressure_iterations: u32,
    pub pressure_decay: f32,
    pub velocity_dissipation: f32,
    pub dye_dissipation: f32,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub max_dt: Duration,
    pub sim_resolution: u32,
    pub dye_resolution: u32,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            curl_strength: 30.0,
            splat_radius: 0.25,
            splat_force: 6000.0,
            pressure_iterations: 20,
            pressure_decay: 0.8,
            velocity_dissipation: 0.2,
            dye_dissipation: 1.0,
            max_dt: Duration::from_secs_f64(1.0 / 60.0),
            sim_resolution: 256,
            dye_resolution: 1024,
        }
    }
}

/// Idle auto-splatting.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AmbientSection {
    pub enabled: bool,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub interval: Duration,
    /// Upper bound of splats per ambient burst (at least one is emitted).
    pub max_splats: u32,
    /// Largest impulse component of an ambient splat.
    pub force: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for AmbientSection {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(3),
            max_splats: 3,
            force: 250.0,
            seed: None,
        }
    }
}

/// Splat rings emitted for host events.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BurstSection {
    pub base_count: u32,
    pub max_count: u32,
    /// Ring radius in UV units.
    pub ring_radius: f32,
    pub force: f32,
}

impl Default for BurstSection {
    fn default() -> Self {
        Self {
            base_count: 6,
            max_count: 24,
            ring_radius: 0.04,
            force: 400.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplaySection {
    pub exponent: f32,
    pub width: u32,
    pub height: u32,
    /// Frame cap for the preview window; 0 leaves pacing to vsync.
    pub max_fps: f32,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            exponent: 0.85,
            width: 1280,
            height: 720,
            max_fps: 60.0,
        }
    }
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            simulation: SimulationSection::default(),
            ambient: AmbientSection::default(),
            bursts: BurstSection::default(),
            display: DisplaySection::default(),
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_duration_opt(deserializer)?
        .ok_or_else(|| de::Error::custom("expected a duration"))
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be finite and non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

impl FluidConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: FluidConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CONFIG_VERSION}",
                self.version
            )));
        }

        let sim = &self.simulation;
        non_negative("simulation.curl_strength", sim.curl_strength)?;
        positive("simulation.splat_radius", sim.splat_radius)?;
        non_negative("simulation.splat_force", sim.splat_force)?;
        non_negative("simulation.velocity_dissipation", sim.velocity_dissipation)?;
        non_negative("simulation.dye_dissipation", sim.dye_dissipation)?;
        if !(0.0..=1.0).contains(&sim.pressure_decay) {
            return Err(ConfigError::Invalid(
                "simulation.pressure_decay must be within [0, 1]".into(),
            ));
        }
        if sim.pressure_iterations > 1000 {
            return Err(ConfigError::Invalid(
                "simulation.pressure_iterations must be at most 1000".into(),
            ));
        }
        if sim.max_dt.is_zero() {
            return Err(ConfigError::Invalid(
                "simulation.max_dt must be greater than zero".into(),
            ));
        }
        resolution("simulation.sim_resolution", sim.sim_resolution)?;
        resolution("simulation.dye_resolution", sim.dye_resolution)?;

        let ambient = &self.ambient;
        if ambient.enabled && ambient.interval.is_zero() {
            return Err(ConfigError::Invalid(
                "ambient.interval must be greater than zero".into(),
            ));
        }
        if ambient.max_splats == 0 {
            return Err(ConfigError::Invalid("ambient.max_splats must be >= 1".into()));
        }
        non_negative("ambient.force", ambient.force)?;

        let bursts = &self.bursts;
        if bursts.base_count == 0 {
            return Err(ConfigError::Invalid("bursts.base_count must be >= 1".into()));
        }
        if bursts.max_count < bursts.base_count {
            return Err(ConfigError::Invalid(format!(
                "bursts.max_count ({}) must be >= bursts.base_count ({})",
                bursts.max_count, bursts.base_count
            )));
        }
        non_negative("bursts.ring_radius", bursts.ring_radius)?;
        non_negative("bursts.force", bursts.force)?;

        let display = &self.display;
        positive("display.exponent", display.exponent)?;
        let edges = [
            ("display.width", display.width),
            ("display.height", display.height),
        ];
        for (name, value) in edges {
            if !(1..=MAX_DISPLAY_DIMENSION).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be within 1..={MAX_DISPLAY_DIMENSION} (got {value})"
                )));
            }
        }
        non_negative("display.max_fps", display.max_fps)?;

        Ok(())
    }
}

fn non_negative(name: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{name} must be a finite value >= 0 (got {value})"
        )))
    }
}

fn positive(name: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{name} must be a finite value > 0 (got {value})"
        )))
    }
}

fn resolution(name: &str, value: u32) -> Result<(), ConfigError> {
    if (8..=8192).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{name} must be within 8..=8192 (got {value})"
        )))
    }
}
