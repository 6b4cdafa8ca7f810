//! Splat sources that do not come from a pointer: idle auto-splatting and
//! bursts triggered by host events.

use std::time::{Duration, Instant};

use fluid::{ColorGenerator, SplatRequest};
use fluidconfig::AmbientSection;
use rand::prelude::*;

mod bursts;

pub use bursts::{EventBurst, GameEvent};

#[derive(Debug, thiserror::Error)]
pub enum AmbientError {
    #[error("ambient interval must be greater than zero")]
    ZeroInterval,
    #[error("{0} must be at least 1")]
    EmptyBurst(&'static str),
    #[error("burst max_count ({max}) is below base_count ({base})")]
    InvertedBurstRange { base: u32, max: u32 },
}

/// Emits a handful of random splats whenever no pointer has been active for
/// a full interval.
pub struct AmbientSplatter {
    enabled: bool,
    interval: Duration,
    max_splats: u32,
    force: f32,
    colors: ColorGenerator,
    rng: StdRng,
    anchor: Option<Instant>,
}

impl AmbientSplatter {
    pub fn new(settings: &AmbientSection, seed: u64) -> Result<Self, AmbientError> {
        if settings.enabled && settings.interval.is_zero() {
            return Err(AmbientError::ZeroInterval);
        }
        if settings.max_splats == 0 {
            return Err(AmbientError::EmptyBurst("ambient max_splats"));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let colors = ColorGenerator::new(rng.gen());
        Ok(Self {
            enabled: settings.enabled,
            interval: settings.interval,
            max_splats: settings.max_splats,
            force: settings.force,
            colors,
            rng,
            anchor: None,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.anchor = None;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Advances the idle clock. Pointer activity restarts the interval; the
    /// first call only starts it.
    pub fn tick(&mut self, now: Instant, pointers_active: bool) -> Vec<SplatRequest> {
        if !self.enabled {
            return Vec::new();
        }
        let anchor = match self.anchor {
            Some(anchor) if !pointers_active => anchor,
            _ => {
                self.anchor = Some(now);
                return Vec::new();
            }
        };
        if now.saturating_duration_since(anchor) < self.interval {
            return Vec::new();
        }
        self.anchor = Some(now);
        let count = self.rng.gen_range(1..=self.max_splats);
        self.random_splats(count)
    }

    /// Random splats anywhere in the viewport, each with its own color.
    pub fn random_splats(&mut self, count: u32) -> Vec<SplatRequest> {
        (0..count)
            .map(|_| {
                let u = self.rng.gen::<f32>();
                let v = self.rng.gen::<f32>();
                let dx = self.force * self.rng.gen_range(-1.0..=1.0);
                let dy = self.force * self.rng.gen_range(-1.0..=1.0);
                SplatRequest::new(u, v, dx, dy, self.colors.next_color())
            })
            .collect()
    }
}
