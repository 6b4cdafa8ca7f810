use crate::types::Rgb;

const GOLDEN_RATIO_CONJUGATE: f32 = 0.618_034;
const SATURATION: f32 = 1.0;
const VALUE: f32 = 1.0;
/// Injected colors are halved so accumulated dye does not clip to white.
const INJECTION_SCALE: f32 = 0.5;

/// Golden-ratio hue stepper producing well-separated splat colors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorGenerator {
    hue: f32,
}

impl ColorGenerator {
    pub fn new(initial_hue: f32) -> Self {
        Self {
            hue: initial_hue.rem_euclid(1.0),
        }
    }

    pub fn hue(&self) -> f32 {
        self.hue
    }

    /// Advances the hue and returns the next injection color.
    pub fn next_color(&mut self) -> Rgb {
        self.hue = (self.hue + GOLDEN_RATIO_CONJUGATE).rem_euclid(1.0);
        hsv_to_rgb(self.hue, SATURATION, VALUE).scaled(INJECTION_SCALE)
    }
}

impl Default for ColorGenerator {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Converts HSV (all components in `[0, 1]`) to RGB.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb {
    let h = h.rem_euclid(1.0) * 6.0;
    let sector = h.floor();
    let f = h - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);
    match sector as u32 % 6 {
        0 => Rgb::new(v, t, p),
        1 => Rgb::new(q, v, p),
        2 => Rgb::new(p, v, t),
        3 => Rgb::new(p, q, v),
        4 => Rgb::new(t, p, v),
        _ => Rgb::new(v, p, q),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Rgb, b: Rgb) -> bool {
        (a.r - b.r).abs() < 1e-5 && (a.g - b.g).abs() < 1e-5 && (a.b - b.b).abs() < 1e-5
    }

    #[test]
    fn primary_hues_convert_exactly() {
        assert!(close(hsv_to_rgb(0.0, 1.0, 1.0), Rgb::new(1.0, 0.0, 0.0)));
        assert!(close(hsv_to_rgb(1.0 / 3.0, 1.0, 1.0), Rgb::new(0.0, 1.0, 0.0)));
        assert!(close(hsv_to_rgb(2.0 / 3.0, 1.0, 1.0), Rgb::new(0.0, 0.0, 1.0)));
        assert!(close(hsv_to_rgb(0.5, 0.0, 0.25), Rgb::new(0.25, 0.25, 0.25)));
    }

    #[test]
    fn sequence_is_deterministic_and_wraps() {
        let mut first = ColorGenerator::new(0.2);
        let mut second = ColorGenerator::new(0.2);
        for _ in 0..32 {
            assert_eq!(first.next_color(), second.next_color());
            assert!((0.0..1.0).contains(&first.hue()));
        }
    }

    #[test]
    fn consecutive_hues_are_well_separated() {
        let mut colors = ColorGenerator::default();
        let mut previous = colors.hue();
        for _ in 0..16 {
            colors.next_color();
            let distance = (colors.hue() - previous).abs();
            let wrapped = distance.min(1.0 - distance);
            assert!(wrapped > 0.3, "hue step too small: {wrapped}");
            previous = colors.hue();
        }
    }

    #[test]
    fn injected_colors_are_halved() {
        let mut colors = ColorGenerator::default();
        let color = colors.next_color();
        let peak = color.r.max(color.g).max(color.b);
        assert!((peak - INJECTION_SCALE).abs() < 1e-5);
    }
}
