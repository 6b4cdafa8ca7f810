use crate::error::FluidError;
use crate::resolution::GridResolution;
use crate::types::FieldKind;

use super::context::{FieldFormat, FieldFormats};
use super::uniforms::texel_size;

/// One GPU texture holding a simulated quantity.
pub struct Field {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    format: FieldFormat,
    filter: wgpu::FilterMode,
}

impl Field {
    pub(crate) fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: FieldFormat,
        filter: wgpu::FilterMode,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: format.texture_format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width: width.max(1),
            height: height.max(1),
            format,
            filter,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> FieldFormat {
        self.format
    }

    pub fn filter(&self) -> wgpu::FilterMode {
        self.filter
    }

    pub fn texel(&self) -> [f32; 2] {
        texel_size(self.width, self.height)
    }

    pub(crate) fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub(crate) fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// Records a pass that zeroes every texel.
    pub(crate) fn clear(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("field clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }
}

/// Two owned slots with an index toggle. Slot `read` is the current state,
/// the other slot is the destination of the next pass.
#[derive(Debug)]
pub struct PingPong<T> {
    slots: [T; 2],
    read: usize,
}

pub type DoubleField = PingPong<Field>;

impl<T> PingPong<T> {
    pub fn new(first: T, second: T) -> Self {
        Self {
            slots: [first, second],
            read: 0,
        }
    }

    pub fn read(&self) -> &T {
        &self.slots[self.read]
    }

    pub fn write(&self) -> &T {
        &self.slots[1 - self.read]
    }

    /// Both roles at once, for a pass that samples one and renders the other.
    pub fn split(&self) -> (&T, &T) {
        (self.read(), self.write())
    }

    pub fn swap(&mut self) {
        self.read = 1 - self.read;
    }

    pub fn slots(&self) -> &[T; 2] {
        &self.slots
    }
}

impl DoubleField {
    pub(crate) fn allocate(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: FieldFormat,
        filter: wgpu::FilterMode,
    ) -> Self {
        Self::new(
            Field::new(device, &format!("{label} a"), width, height, format, filter),
            Field::new(device, &format!("{label} b"), width, height, format, filter),
        )
    }

    pub(crate) fn clear(&self, encoder: &mut wgpu::CommandEncoder) {
        for field in &self.slots {
            field.clear(encoder);
        }
    }
}

/// All fields of one simulation, sized for a single [`GridResolution`].
pub struct FieldStore {
    pub(crate) velocity: DoubleField,
    pub(crate) dye: DoubleField,
    pub(crate) pressure: DoubleField,
    pub(crate) divergence: Field,
    pub(crate) curl: Field,
    grid: GridResolution,
    formats: FieldFormats,
}

impl FieldStore {
    /// Allocates every field and records their clear passes into `encoder`.
    pub(crate) fn allocate(
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        grid: GridResolution,
        formats: FieldFormats,
    ) -> Self {
        let (sim_w, sim_h) = grid.sim_size();
        let (dye_w, dye_h) = grid.dye_size();
        let linear = wgpu::FilterMode::Linear;
        let nearest = wgpu::FilterMode::Nearest;
        let store = Self {
            velocity: DoubleField::allocate(device, "velocity", sim_w, sim_h, formats.vector, linear),
            dye: DoubleField::allocate(device, "dye", dye_w, dye_h, formats.color, linear),
            pressure: DoubleField::allocate(device, "pressure", sim_w, sim_h, formats.scalar, nearest),
            divergence: Field::new(device, "divergence", sim_w, sim_h, formats.scalar, nearest),
            curl: Field::new(device, "curl", sim_w, sim_h, formats.scalar, nearest),
            grid,
            formats,
        };
        store.clear(encoder);
        tracing::debug!(
            sim = ?grid.sim_size(),
            dye = ?grid.dye_size(),
            ?formats,
            "allocated simulation fields"
        );
        store
    }

    pub(crate) fn clear(&self, encoder: &mut wgpu::CommandEncoder) {
        self.velocity.clear(encoder);
        self.dye.clear(encoder);
        self.pressure.clear(encoder);
        self.divergence.clear(encoder);
        self.curl.clear(encoder);
    }

    pub fn grid(&self) -> GridResolution {
        self.grid
    }

    pub fn formats(&self) -> FieldFormats {
        self.formats
    }

    /// Current (read-side) field for `kind`. `Display` has no stored field.
    pub fn field(&self, kind: FieldKind) -> Option<&Field> {
        match kind {
            FieldKind::Velocity => Some(self.velocity.read()),
            FieldKind::Dye => Some(self.dye.read()),
            FieldKind::Pressure => Some(self.pressure.read()),
            FieldKind::Divergence => Some(&self.divergence),
            FieldKind::Curl => Some(&self.curl),
            FieldKind::Display => None,
        }
    }
}

/// CPU copy of a field, rows ordered bottom to top to match UV space.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSnapshot {
    pub kind: FieldKind,
    pub width: u32,
    pub height: u32,
    /// Channels stored per texel (may exceed `kind.components()` on padded formats).
    pub channels: usize,
    pub data: Vec<f32>,
}

impl FieldSnapshot {
    pub fn texel(&self, x: u32, y: u32) -> &[f32] {
        let start = (y as usize * self.width as usize + x as usize) * self.channels;
        &self.data[start..start + self.channels]
    }

    pub fn component(&self, x: u32, y: u32, channel: usize) -> f32 {
        self.texel(x, y)[channel]
    }

    /// Texel containing the UV point, clamped to the grid.
    pub fn texel_at_uv(&self, u: f32, v: f32) -> (u32, u32) {
        let x = (u * self.width as f32).floor().clamp(0.0, (self.width - 1) as f32);
        let y = (v * self.height as f32).floor().clamp(0.0, (self.height - 1) as f32);
        (x as u32, y as u32)
    }

    pub fn sample_uv(&self, u: f32, v: f32) -> &[f32] {
        let (x, y) = self.texel_at_uv(u, v);
        self.texel(x, y)
    }

    fn channel_values(&self, channel: usize) -> impl Iterator<Item = f32> + '_ {
        self.data.iter().skip(channel).step_by(self.channels).copied()
    }

    pub fn mean_abs(&self, channel: usize) -> f32 {
        let count = (self.width as usize * self.height as usize).max(1);
        let total: f64 = self.channel_values(channel).map(|value| value.abs() as f64).sum();
        (total / count as f64) as f32
    }

    pub fn max_abs(&self, channel: usize) -> f32 {
        self.channel_values(channel).fold(0.0, |acc, value| acc.max(value.abs()))
    }

    pub fn sum(&self, channel: usize) -> f64 {
        self.channel_values(channel).map(f64::from).sum()
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|value| value.is_finite())
    }

    /// Bit-exact equality, including NaN payloads.
    pub fn bitwise_eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.channels == other.channels
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

pub(crate) fn padded_bytes_per_row(width: u32, bytes_per_texel: u32) -> u32 {
    let unpadded = width * bytes_per_texel;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Copies `texture` into a mappable buffer, waits for the GPU and decodes it.
pub(crate) fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    format: FieldFormat,
    kind: FieldKind,
) -> Result<FieldSnapshot, FluidError> {
    let width = texture.width();
    let height = texture.height();
    let bytes_per_texel = format.bytes_per_texel();
    let bytes_per_row = padded_bytes_per_row(width, bytes_per_texel);

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("field read-back"),
        size: bytes_per_row as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("field read-back encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(Some(encoder.finish()));

    let read_back_error = |message: String| FluidError::ReadBack { kind, message };
    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device
        .poll(wgpu::PollType::Wait)
        .map_err(|err| read_back_error(err.to_string()))?;
    rx.recv()
        .map_err(|err| read_back_error(err.to_string()))?
        .map_err(|err| read_back_error(err.to_string()))?;

    let channels = format.channels();
    let mut data = Vec::with_capacity(width as usize * height as usize * channels);
    {
        let mapped = slice.get_mapped_range();
        let row_bytes = (width * bytes_per_texel) as usize;
        // Texture rows run top to bottom; snapshots run bottom to top.
        for row in (0..height as usize).rev() {
            let start = row * bytes_per_row as usize;
            for texel in mapped[start..start + row_bytes].chunks_exact(bytes_per_texel as usize) {
                format.decode_texel(texel, &mut data);
            }
        }
    }
    buffer.unmap();

    Ok(FieldSnapshot {
        kind,
        width,
        height,
        channels,
        data,
    })
}
