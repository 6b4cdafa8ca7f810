use wgpu::{TextureFormatFeatureFlags, TextureUsages};

use crate::error::FluidError;

/// Summary of the adapter the engine runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
    pub max_texture_dimension: u32,
}

impl AdapterProfile {
    pub fn from_wgpu(info: &wgpu::AdapterInfo, limits: &wgpu::Limits) -> Self {
        Self {
            name: info.name.clone(),
            backend: info.backend,
            device_type: info.device_type,
            max_texture_dimension: limits.max_texture_dimension_2d,
        }
    }

    pub fn is_software(&self) -> bool {
        matches!(self.device_type, wgpu::DeviceType::Cpu)
    }
}

/// Storage formats a field may be allocated with, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldFormat {
    R16Float,
    Rg16Float,
    Rgba16Float,
    /// Last resort. Negative values clamp to zero and precision drops to 1/255.
    Rgba8Unorm,
}

impl FieldFormat {
    pub fn texture_format(self) -> wgpu::TextureFormat {
        match self {
            FieldFormat::R16Float => wgpu::TextureFormat::R16Float,
            FieldFormat::Rg16Float => wgpu::TextureFormat::Rg16Float,
            FieldFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            FieldFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        }
    }

    pub fn channels(self) -> usize {
        match self {
            FieldFormat::R16Float => 1,
            FieldFormat::Rg16Float => 2,
            FieldFormat::Rgba16Float | FieldFormat::Rgba8Unorm => 4,
        }
    }

    pub fn bytes_per_texel(self) -> u32 {
        match self {
            FieldFormat::R16Float => 2,
            FieldFormat::Rg16Float | FieldFormat::Rgba8Unorm => 4,
            FieldFormat::Rgba16Float => 8,
        }
    }

    pub fn is_half_float(self) -> bool {
        !matches!(self, FieldFormat::Rgba8Unorm)
    }

    /// Appends the channels of one texel to `out` as `f32`.
    pub(crate) fn decode_texel(self, bytes: &[u8], out: &mut Vec<f32>) {
        match self {
            FieldFormat::Rgba8Unorm => {
                out.extend(bytes.iter().map(|&byte| byte as f32 / 255.0));
            }
            _ => {
                out.extend(
                    bytes
                        .chunks_exact(2)
                        .map(|pair| half::f16::from_le_bytes([pair[0], pair[1]]).to_f32()),
                );
            }
        }
    }

    /// Candidates for a field needing `components` channels, best first.
    fn chain(components: usize) -> &'static [FieldFormat] {
        match components {
            1 => &[
                FieldFormat::R16Float,
                FieldFormat::Rg16Float,
                FieldFormat::Rgba16Float,
                FieldFormat::Rgba8Unorm,
            ],
            2 => &[
                FieldFormat::Rg16Float,
                FieldFormat::Rgba16Float,
                FieldFormat::Rgba8Unorm,
            ],
            _ => &[FieldFormat::Rgba16Float, FieldFormat::Rgba8Unorm],
        }
    }
}

/// Formats chosen for scalar, vector and color fields on the active adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldFormats {
    pub scalar: FieldFormat,
    pub vector: FieldFormat,
    pub color: FieldFormat,
}

impl Default for FieldFormats {
    fn default() -> Self {
        Self {
            scalar: FieldFormat::R16Float,
            vector: FieldFormat::Rg16Float,
            color: FieldFormat::Rgba16Float,
        }
    }
}

impl FieldFormats {
    /// Walks each fallback chain and keeps the first supported format.
    ///
    /// `Rgba8Unorm` is always accepted since every backend can render to it.
    pub fn select_with(supports: impl Fn(FieldFormat) -> bool) -> Self {
        let pick = |components: usize| {
            FieldFormat::chain(components)
                .iter()
                .copied()
                .find(|&format| format == FieldFormat::Rgba8Unorm || supports(format))
                .unwrap_or(FieldFormat::Rgba8Unorm)
        };
        let formats = Self {
            scalar: pick(1),
            vector: pick(2),
            color: pick(4),
        };
        if formats != Self::default() {
            tracing::warn!(
                scalar = ?formats.scalar,
                vector = ?formats.vector,
                color = ?formats.color,
                "preferred half-float field formats unavailable; degrading precision"
            );
        }
        formats
    }

    pub fn for_adapter(adapter: &wgpu::Adapter) -> Self {
        Self::select_with(|format| {
            let features = adapter.get_texture_format_features(format.texture_format());
            features.allowed_usages.contains(
                TextureUsages::RENDER_ATTACHMENT
                    | TextureUsages::TEXTURE_BINDING
                    | TextureUsages::COPY_SRC,
            ) && features.flags.contains(TextureFormatFeatureFlags::FILTERABLE)
        })
    }

    pub fn is_degraded(&self) -> bool {
        *self != Self::default()
    }
}

/// Instance, adapter, device and queue shared by the engine and its host.
pub struct GpuContext {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    profile: AdapterProfile,
    formats: FieldFormats,
}

pub fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

impl GpuContext {
    /// Creates a context without a presentation surface, falling back to a
    /// software adapter when no hardware one is exposed.
    pub fn headless() -> Result<Self, FluidError> {
        let instance = create_instance();
        let adapter = match request_adapter(&instance, None, false) {
            Ok(adapter) => adapter,
            Err(err) => {
                tracing::debug!(error = %err, "no hardware adapter; trying fallback adapter");
                request_adapter(&instance, None, true)?
            }
        };
        Self::from_adapter(instance, adapter)
    }

    /// Creates a context whose adapter can present to `surface`.
    pub fn for_surface(
        instance: wgpu::Instance,
        surface: &wgpu::Surface<'_>,
    ) -> Result<Self, FluidError> {
        let adapter = request_adapter(&instance, Some(surface), false)?;
        Self::from_adapter(instance, adapter)
    }

    fn from_adapter(instance: wgpu::Instance, adapter: wgpu::Adapter) -> Result<Self, FluidError> {
        let info = adapter.get_info();
        let limits = adapter.limits();
        let profile = AdapterProfile::from_wgpu(&info, &limits);
        tracing::debug!(
            name = %profile.name,
            backend = ?profile.backend,
            device_type = ?profile.device_type,
            is_software = profile.is_software(),
            "selected GPU adapter"
        );

        let formats = FieldFormats::for_adapter(&adapter);
        tracing::debug!(?formats, "selected field formats");

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("fluid device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))
        .map_err(|err| FluidError::Device(err.to_string()))?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            profile,
            formats,
        })
    }

    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn profile(&self) -> &AdapterProfile {
        &self.profile
    }

    pub fn formats(&self) -> FieldFormats {
        self.formats
    }
}

fn request_adapter(
    instance: &wgpu::Instance,
    compatible_surface: Option<&wgpu::Surface<'_>>,
    force_fallback_adapter: bool,
) -> Result<wgpu::Adapter, FluidError> {
    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface,
        force_fallback_adapter,
    }))
    .map_err(|err| FluidError::Adapter(err.to_string()))
}
