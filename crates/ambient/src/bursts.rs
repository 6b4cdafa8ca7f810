use std::f32::consts::TAU;

use fluid::{ColorGenerator, SplatRequest};
use fluidconfig::BurstSection;

use crate::AmbientError;

/// Host events that stir the fluid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameEvent {
    /// Two tiles merged into one worth `value` at a UV position.
    TileMerge { position: [f32; 2], value: u32 },
    /// Generic impulse with a caller-chosen intensity.
    Pulse { position: [f32; 2], intensity: f32 },
}

impl GameEvent {
    pub fn position(&self) -> [f32; 2] {
        match *self {
            GameEvent::TileMerge { position, .. } | GameEvent::Pulse { position, .. } => position,
        }
    }

    /// Tile merges grow with the power of two reached (4 -> 2, 2048 -> 11).
    pub fn magnitude(&self) -> f32 {
        match *self {
            GameEvent::TileMerge { value, .. } => value.max(1).ilog2() as f32,
            GameEvent::Pulse { intensity, .. } if intensity.is_finite() => intensity.max(0.0),
            GameEvent::Pulse { .. } => 0.0,
        }
    }
}

/// Turns events into a ring of outward-pointing splats sharing one color.
pub struct EventBurst {
    base_count: u32,
    max_count: u32,
    ring_radius: f32,
    force: f32,
    colors: ColorGenerator,
}

impl EventBurst {
    pub fn new(settings: &BurstSection, colors: ColorGenerator) -> Result<Self, AmbientError> {
        if settings.base_count == 0 {
            return Err(AmbientError::EmptyBurst("burst base_count"));
        }
        if settings.max_count < settings.base_count {
            return Err(AmbientError::InvertedBurstRange {
                base: settings.base_count,
                max: settings.max_count,
            });
        }
        Ok(Self {
            base_count: settings.base_count,
            max_count: settings.max_count,
            ring_radius: settings.ring_radius,
            force: settings.force,
            colors,
        })
    }

    pub fn splat_count(&self, magnitude: f32) -> u32 {
        let extra = magnitude.max(0.0).floor().min(u32::MAX as f32) as u32;
        self.base_count.saturating_add(extra).min(self.max_count)
    }

    pub fn emit(&mut self, event: &GameEvent) -> Vec<SplatRequest> {
        let magnitude = event.magnitude();
        let count = self.splat_count(magnitude);
        let [cx, cy] = event.position();
        let strength = self.force * (1.0 + 0.25 * magnitude);
        let color = self.colors.next_color();
        (0..count)
            .map(|index| {
                let angle = TAU * index as f32 / count as f32;
                let (sin, cos) = angle.sin_cos();
                SplatRequest::new(
                    cx + self.ring_radius * cos,
                    cy + self.ring_radius * sin,
                    strength * cos,
                    strength * sin,
                    color,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn burst() -> EventBurst {
        let settings = BurstSection {
            base_count: 4,
            max_count: 10,
            ring_radius: 0.05,
            force: 100.0,
        };
        EventBurst::new(&settings, ColorGenerator::default()).unwrap()
    }

    #[test]
    fn merge_magnitude_is_log2_of_value() {
        let merge = |value| GameEvent::TileMerge {
            position: [0.5, 0.5],
            value,
        };
        assert_eq!(merge(4).magnitude(), 2.0);
        assert_eq!(merge(2048).magnitude(), 11.0);
        assert_eq!(merge(0).magnitude(), 0.0);
        let pulse = GameEvent::Pulse {
            position: [0.0, 0.0],
            intensity: f32::NAN,
        };
        assert_eq!(pulse.magnitude(), 0.0);
    }

    #[test]
    fn count_grows_with_magnitude_up_to_cap() {
        let burst = burst();
        assert_eq!(burst.splat_count(0.0), 4);
        assert_eq!(burst.splat_count(3.7), 7);
        assert_eq!(burst.splat_count(50.0), 10);
    }

    #[test]
    fn ring_points_outward_with_one_color() {
        let mut burst = burst();
        let splats = burst.emit(&GameEvent::TileMerge {
            position: [0.3, 0.6],
            value: 4,
        });
        assert_eq!(splats.len(), 6);
        let color = splats[0].color;
        for splat in &splats {
            assert_eq!(splat.color, color);
            let offset = [splat.position[0] - 0.3, splat.position[1] - 0.6];
            let distance = offset[0].hypot(offset[1]);
            assert!((distance - 0.05).abs() < 1e-5);
            let dot = offset[0] * splat.impulse[0] + offset[1] * splat.impulse[1];
            assert!(dot > 0.0, "impulse points inward");
            let speed = splat.impulse[0].hypot(splat.impulse[1]);
            assert!((speed - 150.0).abs() < 1e-2);
        }
    }

    #[test]
    fn consecutive_bursts_change_color() {
        let mut burst = burst();
        let event = GameEvent::Pulse {
            position: [0.5, 0.5],
            intensity: 1.0,
        };
        let first = burst.emit(&event);
        let second = burst.emit(&event);
        assert_ne!(first[0].color, second[0].color);
    }

    #[test]
    fn rejects_inverted_range() {
        let settings = BurstSection {
            base_count: 8,
            max_count: 2,
            ..BurstSection::default()
        };
        assert!(matches!(
            EventBurst::new(&settings, ColorGenerator::default()),
            Err(AmbientError::InvertedBurstRange { base: 8, max: 2 })
        ));
    }
}
