/// Cell counts for the two coexisting simulation lattices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridResolution {
    pub sim_width: u32,
    pub sim_height: u32,
    pub dye_width: u32,
    pub dye_height: u32,
}

impl GridResolution {
    /// Derives both grids from a viewport in physical pixels.
    ///
    /// The shorter axis keeps the baseline cell count and the longer axis is
    /// scaled by the aspect ratio, so cells stay square on screen.
    pub fn for_viewport(width: u32, height: u32, sim_base: u32, dye_base: u32) -> Self {
        let (sim_width, sim_height) = scaled_axes(width, height, sim_base);
        let (dye_width, dye_height) = scaled_axes(width, height, dye_base);
        Self {
            sim_width,
            sim_height,
            dye_width,
            dye_height,
        }
    }

    pub fn sim_size(&self) -> (u32, u32) {
        (self.sim_width, self.sim_height)
    }

    pub fn dye_size(&self) -> (u32, u32) {
        (self.dye_width, self.dye_height)
    }
}

/// Viewport aspect ratio (width over height) with zero-sized axes clamped to one pixel.
pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

fn scaled_axes(width: u32, height: u32, base: u32) -> (u32, u32) {
    let base = base.max(1);
    let mut aspect = aspect_ratio(width, height);
    if aspect < 1.0 {
        aspect = 1.0 / aspect;
    }
    let min = base;
    let max = (base as f32 * aspect).round().max(base as f32) as u32;
    if width.max(1) > height.max(1) {
        (max, min)
    } else {
        (min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_viewport_uses_baseline() {
        let grid = GridResolution::for_viewport(800, 800, 256, 1024);
        assert_eq!(grid.sim_size(), (256, 256));
        assert_eq!(grid.dye_size(), (1024, 1024));
    }

    #[test]
    fn landscape_scales_width() {
        let grid = GridResolution::for_viewport(1920, 1080, 256, 1024);
        assert_eq!(grid.sim_height, 256);
        assert_eq!(grid.sim_width, 455);
        assert_eq!(grid.dye_height, 1024);
        assert_eq!(grid.dye_width, 1820);
    }

    #[test]
    fn portrait_scales_height() {
        let grid = GridResolution::for_viewport(540, 1080, 128, 512);
        assert_eq!(grid.sim_size(), (128, 256));
        assert_eq!(grid.dye_size(), (512, 1024));
    }

    #[test]
    fn never_drops_below_baseline() {
        let grid = GridResolution::for_viewport(0, 0, 256, 1024);
        assert_eq!(grid.sim_size(), (256, 256));
        let tiny = GridResolution::for_viewport(3, 2, 64, 64);
        assert!(tiny.sim_width >= 64 && tiny.sim_height >= 64);
    }

    #[test]
    fn resize_round_trip_restores_shape() {
        let a = GridResolution::for_viewport(1280, 720, 256, 1024);
        let b = GridResolution::for_viewport(600, 900, 256, 1024);
        assert_ne!(a, b);
        assert_eq!(a, GridResolution::for_viewport(1280, 720, 256, 1024));
    }
}
