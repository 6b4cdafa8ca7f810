use bytemuck::{Pod, Zeroable};

/// Parameters consumed by every stage kernel.
///
/// Mirrors the `StageParams` block in `kernels.rs` under std140; every member
/// is a float so the Rust layout carries no hidden padding. Fields a stage does
/// not read are left at zero.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub(crate) struct StageUniforms {
    /// Texel size of the field sampled for neighbors (or velocity, in advection).
    pub texel: [f32; 2],
    /// Pixel size of the destination.
    pub target_size: [f32; 2],
    pub point: [f32; 2],
    pub aspect: f32,
    pub radius: f32,
    pub color: [f32; 4],
    pub dt: f32,
    pub dissipation: f32,
    pub curl_strength: f32,
    /// Stage-specific scalar: decay factor or display exponent.
    pub scalar: f32,
}

pub(crate) const STAGE_UNIFORMS_SIZE: u64 = std::mem::size_of::<StageUniforms>() as u64;

impl StageUniforms {
    pub fn for_target(width: u32, height: u32) -> Self {
        Self {
            target_size: [width as f32, height as f32],
            texel: texel_size(width, height),
            ..Self::default()
        }
    }

    pub fn with_texel(mut self, texel: [f32; 2]) -> Self {
        self.texel = texel;
        self
    }

    pub fn with_scalar(mut self, scalar: f32) -> Self {
        self.scalar = scalar;
        self
    }
}

pub(crate) fn texel_size(width: u32, height: u32) -> [f32; 2] {
    [1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_std140_block() {
        assert_eq!(STAGE_UNIFORMS_SIZE, 64);
        assert_eq!(std::mem::offset_of!(StageUniforms, color), 32);
        assert_eq!(std::mem::offset_of!(StageUniforms, dt), 48);
        assert_eq!(std::mem::offset_of!(StageUniforms, scalar), 60);
    }

    #[test]
    fn target_defaults_texel_to_its_own_grid() {
        let uniforms = StageUniforms::for_target(256, 128);
        assert_eq!(uniforms.target_size, [256.0, 128.0]);
        assert_eq!(uniforms.texel, [1.0 / 256.0, 1.0 / 128.0]);
        assert_eq!(uniforms.with_scalar(0.8).scalar, 0.8);
    }
}
