use std::path::Path;

use crate::error::FluidError;
use crate::resolution::{aspect_ratio, GridResolution};
use crate::types::{FieldKind, Rgb, SimulationParams, SplatRequest};

use super::context::{FieldFormat, FieldFormats, GpuContext};
use super::fields::{read_texture, Field, FieldSnapshot, FieldStore};
use super::kernels::Stage;
use super::programs::{StagePrograms, Target};
use super::uniforms::StageUniforms;

/// Offscreen format used for exported frames.
const EXPORT_FORMAT: FieldFormat = FieldFormat::Rgba8Unorm;

/// A single fluid simulation and the GPU resources it owns.
///
/// Lifecycle: [`FluidEngine::new`] allocates every field and compiles every
/// kernel, [`FluidEngine::step`] and [`FluidEngine::render_to`] run once per
/// frame, and dropping the engine releases the GPU resources.
pub struct FluidEngine {
    context: GpuContext,
    programs: StagePrograms,
    store: FieldStore,
    params: SimulationParams,
    viewport: (u32, u32),
    pending_viewport: Option<(u32, u32)>,
    reallocate: bool,
    pending_splats: Vec<SplatRequest>,
    paused: bool,
    frame: u64,
}

impl FluidEngine {
    pub fn new(
        context: GpuContext,
        width: u32,
        height: u32,
        params: SimulationParams,
    ) -> Result<Self, FluidError> {
        let mut programs = StagePrograms::new(context.device())?;
        warm_pipelines(&mut programs, context.device(), context.formats())?;

        let viewport = (width.max(1), height.max(1));
        let grid = grid_for(viewport, &params, &context);
        let store = allocate_store(&context, grid);
        tracing::debug!(
            adapter = %context.profile().name,
            viewport = ?viewport,
            sim = ?grid.sim_size(),
            dye = ?grid.dye_size(),
            "fluid engine ready"
        );

        Ok(Self {
            context,
            programs,
            store,
            params,
            viewport,
            pending_viewport: None,
            reallocate: false,
            pending_splats: Vec::new(),
            paused: false,
            frame: 0,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn resolution(&self) -> GridResolution {
        self.store.grid()
    }

    pub fn formats(&self) -> FieldFormats {
        self.store.formats()
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Completed steps since construction.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn pending_splats(&self) -> usize {
        self.pending_splats.len()
    }

    // --- injection ------------------------------------------------------

    /// Queues a splat for the next step. Coordinates are not validated.
    pub fn splat(&mut self, u: f32, v: f32, dx: f32, dy: f32, color: Rgb) {
        self.pending_splats.push(SplatRequest::new(u, v, dx, dy, color));
    }

    pub fn submit_splat(&mut self, request: SplatRequest) {
        self.pending_splats.push(request);
    }

    pub fn submit_splats(&mut self, requests: impl IntoIterator<Item = SplatRequest>) {
        self.pending_splats.extend(requests);
    }

    // --- lifecycle ------------------------------------------------------

    /// Records a viewport change; fields are rebuilt at the next step.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pending_viewport = Some((width.max(1), height.max(1)));
    }

    /// Zeroes every field and drops queued splats.
    pub fn reset(&mut self) {
        let mut encoder = self.encoder("fluid reset");
        self.store.clear(&mut encoder);
        self.context.queue().submit(Some(encoder.finish()));
        self.pending_splats.clear();
        tracing::debug!("fluid fields reset");
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // --- parameters -----------------------------------------------------

    /// Replaces every parameter. Changed baseline resolutions rebuild the
    /// fields at the next step.
    pub fn set_params(&mut self, params: SimulationParams) {
        if params.sim_resolution != self.params.sim_resolution
            || params.dye_resolution != self.params.dye_resolution
        {
            self.reallocate = true;
        }
        self.params = params;
    }

    pub fn set_curl_strength(&mut self, value: f32) {
        self.params.curl_strength = value;
    }

    pub fn set_splat_radius(&mut self, value: f32) {
        self.params.splat_radius = value;
    }

    pub fn set_splat_force(&mut self, value: f32) {
        self.params.splat_force = value;
    }

    pub fn set_pressure_iterations(&mut self, value: u32) {
        self.params.pressure_iterations = value;
    }

    pub fn set_pressure_decay(&mut self, value: f32) {
        self.params.pressure_decay = value;
    }

    pub fn set_velocity_dissipation(&mut self, value: f32) {
        self.params.velocity_dissipation = value;
    }

    pub fn set_dye_dissipation(&mut self, value: f32) {
        self.params.dye_dissipation = value;
    }

    pub fn set_max_dt(&mut self, value: f32) {
        self.params.max_dt = value;
    }

    pub fn set_display_exponent(&mut self, value: f32) {
        self.params.display_exponent = value;
    }

    pub fn set_resolution(&mut self, sim_resolution: u32, dye_resolution: u32) {
        self.set_params(SimulationParams {
            sim_resolution,
            dye_resolution,
            ..self.params
        });
    }

    // --- stepping -------------------------------------------------------

    /// Advances the simulation by `dt` seconds (clamped to `[0, max_dt]`).
    ///
    /// Order: pending resize, pending splats, curl, vorticity confinement,
    /// velocity advection, dye advection, divergence, pressure decay and
    /// relaxation, gradient subtraction. Everything is recorded into one
    /// encoder and submitted once. While paused only the resize is applied.
    pub fn step(&mut self, dt: f32) -> Result<(), FluidError> {
        self.apply_pending_resize();
        if self.paused {
            return Ok(());
        }
        let dt = self.params.clamp_dt(dt);

        let mut encoder = self.encoder("fluid step");
        self.encode_splats(&mut encoder)?;
        self.encode_advance(&mut encoder, dt)?;
        self.encode_projection(&mut encoder)?;
        self.context.queue().submit(Some(encoder.finish()));

        self.frame += 1;
        tracing::trace!(frame = self.frame, dt, "fluid step");
        Ok(())
    }

    /// Applies queued splats without advancing time.
    pub fn flush_splats(&mut self) -> Result<(), FluidError> {
        self.apply_pending_resize();
        let mut encoder = self.encoder("fluid splats");
        self.encode_splats(&mut encoder)?;
        self.context.queue().submit(Some(encoder.finish()));
        Ok(())
    }

    /// Runs only the projection phase on the current velocity.
    pub fn project(&mut self) -> Result<(), FluidError> {
        let mut encoder = self.encoder("fluid projection");
        self.encode_projection(&mut encoder)?;
        self.context.queue().submit(Some(encoder.finish()));
        Ok(())
    }

    /// Recomputes divergence of the current velocity and reads it back.
    pub fn measure_divergence(&mut self) -> Result<FieldSnapshot, FluidError> {
        let mut encoder = self.encoder("fluid divergence");
        self.encode_divergence(&mut encoder)?;
        self.context.queue().submit(Some(encoder.finish()));
        self.read_field(FieldKind::Divergence)
    }

    fn apply_pending_resize(&mut self) {
        let viewport = self.pending_viewport.take().unwrap_or(self.viewport);
        if viewport == self.viewport && !self.reallocate {
            return;
        }
        self.viewport = viewport;
        self.reallocate = false;
        let grid = grid_for(viewport, &self.params, &self.context);
        self.store = allocate_store(&self.context, grid);
        tracing::debug!(viewport = ?viewport, sim = ?grid.sim_size(), dye = ?grid.dye_size(), "fluid fields resized");
    }

    fn encode_splats(&mut self, encoder: &mut wgpu::CommandEncoder) -> Result<(), FluidError> {
        if self.pending_splats.is_empty() {
            return Ok(());
        }
        let splats = std::mem::take(&mut self.pending_splats);
        let aspect = aspect_ratio(self.viewport.0, self.viewport.1);
        let radius = self.params.corrected_radius(aspect);
        let device = self.context.device();

        for splat in &splats {
            let (width, height) = self.store.velocity.read().size();
            let uniforms = StageUniforms {
                point: splat.position,
                aspect,
                radius,
                color: [splat.impulse[0], splat.impulse[1], 0.0, 1.0],
                ..StageUniforms::for_target(width, height)
            };
            let (read, write) = self.store.velocity.split();
            self.programs
                .dispatch(device, encoder, Stage::Splat, &[read], write.into(), &uniforms)?;
            self.store.velocity.swap();

            let (width, height) = self.store.dye.read().size();
            let uniforms = StageUniforms {
                point: splat.position,
                aspect,
                radius,
                color: splat.color.to_array(),
                ..StageUniforms::for_target(width, height)
            };
            let (read, write) = self.store.dye.split();
            self.programs
                .dispatch(device, encoder, Stage::Splat, &[read], write.into(), &uniforms)?;
            self.store.dye.swap();
        }
        tracing::trace!(count = splats.len(), "applied splats");
        Ok(())
    }

    fn encode_advance(&mut self, encoder: &mut wgpu::CommandEncoder, dt: f32) -> Result<(), FluidError> {
        let device = self.context.device();
        let (sim_w, sim_h) = self.store.velocity.read().size();
        let velocity_texel = self.store.velocity.read().texel();

        let uniforms = StageUniforms::for_target(sim_w, sim_h);
        self.programs.dispatch(
            device,
            encoder,
            Stage::Curl,
            &[self.store.velocity.read()],
            (&self.store.curl).into(),
            &uniforms,
        )?;

        let uniforms = StageUniforms {
            dt,
            curl_strength: self.params.curl_strength,
            ..StageUniforms::for_target(sim_w, sim_h)
        };
        let (velocity, write) = self.store.velocity.split();
        self.programs.dispatch(
            device,
            encoder,
            Stage::Vorticity,
            &[velocity, &self.store.curl],
            write.into(),
            &uniforms,
        )?;
        self.store.velocity.swap();

        let uniforms = StageUniforms {
            dt,
            dissipation: self.params.velocity_dissipation,
            ..StageUniforms::for_target(sim_w, sim_h).with_texel(velocity_texel)
        };
        let (velocity, write) = self.store.velocity.split();
        self.programs.dispatch(
            device,
            encoder,
            Stage::Advection,
            &[velocity, velocity],
            write.into(),
            &uniforms,
        )?;
        self.store.velocity.swap();

        let (dye_w, dye_h) = self.store.dye.read().size();
        let uniforms = StageUniforms {
            dt,
            dissipation: self.params.dye_dissipation,
            ..StageUniforms::for_target(dye_w, dye_h).with_texel(velocity_texel)
        };
        let (dye, write) = self.store.dye.split();
        self.programs.dispatch(
            device,
            encoder,
            Stage::Advection,
            &[self.store.velocity.read(), dye],
            write.into(),
            &uniforms,
        )?;
        self.store.dye.swap();
        Ok(())
    }

    fn encode_divergence(&mut self, encoder: &mut wgpu::CommandEncoder) -> Result<(), FluidError> {
        let (sim_w, sim_h) = self.store.velocity.read().size();
        self.programs.dispatch(
            self.context.device(),
            encoder,
            Stage::Divergence,
            &[self.store.velocity.read()],
            (&self.store.divergence).into(),
            &StageUniforms::for_target(sim_w, sim_h),
        )
    }

    /// Divergence, warm-started pressure relaxation and gradient subtraction.
    /// Divergence is always refreshed; zero iterations leave velocity and
    /// pressure untouched.
    fn encode_projection(&mut self, encoder: &mut wgpu::CommandEncoder) -> Result<(), FluidError> {
        self.encode_divergence(encoder)?;
        let iterations = self.params.pressure_iterations;
        if iterations == 0 {
            return Ok(());
        }

        let device = self.context.device();
        let (sim_w, sim_h) = self.store.pressure.read().size();
        let base = StageUniforms::for_target(sim_w, sim_h);

        let (pressure, write) = self.store.pressure.split();
        self.programs.dispatch(
            device,
            encoder,
            Stage::Decay,
            &[pressure],
            write.into(),
            &base.with_scalar(self.params.pressure_decay),
        )?;
        self.store.pressure.swap();

        for _ in 0..iterations {
            let (pressure, write) = self.store.pressure.split();
            self.programs.dispatch(
                device,
                encoder,
                Stage::Pressure,
                &[pressure, &self.store.divergence],
                write.into(),
                &base,
            )?;
            self.store.pressure.swap();
        }

        let (velocity, write) = self.store.velocity.split();
        self.programs.dispatch(
            device,
            encoder,
            Stage::GradientSubtract,
            &[self.store.pressure.read(), velocity],
            write.into(),
            &base,
        )?;
        self.store.velocity.swap();
        Ok(())
    }

    // --- output ---------------------------------------------------------

    /// Draws the tone-mapped dye into a host target of `width` x `height` pixels.
    pub fn render_to(
        &mut self,
        view: &wgpu::TextureView,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Result<(), FluidError> {
        let mut encoder = self.encoder("fluid display");
        self.programs.dispatch(
            self.context.device(),
            &mut encoder,
            Stage::Display,
            &[self.store.dye.read()],
            Target { view, format },
            &StageUniforms::for_target(width, height).with_scalar(self.params.display_exponent),
        )?;
        self.context.queue().submit(Some(encoder.finish()));
        Ok(())
    }

    /// Synchronously reads back the current contents of a field.
    ///
    /// `FieldKind::Display` renders the display kernel offscreen at dye
    /// resolution first.
    pub fn read_field(&mut self, kind: FieldKind) -> Result<FieldSnapshot, FluidError> {
        if kind == FieldKind::Display {
            let (width, height) = self.store.dye.read().size();
            let target = self.render_offscreen(width, height)?;
            return read_texture(
                self.context.device(),
                self.context.queue(),
                target.texture(),
                EXPORT_FORMAT,
                kind,
            );
        }
        let Some(field) = self.store.field(kind) else {
            return Err(FluidError::ReadBack {
                kind,
                message: "field is not stored".to_owned(),
            });
        };
        read_texture(
            self.context.device(),
            self.context.queue(),
            field.texture(),
            field.format(),
            kind,
        )
    }

    /// Renders the display kernel into an RGBA8 image with a top-left origin.
    pub fn render_image(&mut self, width: u32, height: u32) -> Result<image::RgbaImage, FluidError> {
        let target = self.render_offscreen(width, height)?;
        let snapshot = read_texture(
            self.context.device(),
            self.context.queue(),
            target.texture(),
            EXPORT_FORMAT,
            FieldKind::Display,
        )?;
        Ok(snapshot_to_image(&snapshot))
    }

    /// Writes the current frame as a PNG at `path`.
    pub fn export_png(&mut self, path: &Path, width: u32, height: u32) -> Result<(), FluidError> {
        let image = self.render_image(width, height)?;
        image
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|source| FluidError::Export {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(path = %path.display(), width, height, "exported frame");
        Ok(())
    }

    fn render_offscreen(&mut self, width: u32, height: u32) -> Result<Field, FluidError> {
        let max = self.context.profile().max_texture_dimension;
        if width > max || height > max {
            return Err(FluidError::ExportSize { width, height, max });
        }
        let target = Field::new(
            self.context.device(),
            "display export",
            width,
            height,
            EXPORT_FORMAT,
            wgpu::FilterMode::Linear,
        );
        let (width, height) = target.size();
        self.render_to(
            target.view(),
            EXPORT_FORMAT.texture_format(),
            width,
            height,
        )?;
        Ok(target)
    }

    fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.context
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }
}

fn grid_for(viewport: (u32, u32), params: &SimulationParams, context: &GpuContext) -> GridResolution {
    let grid = GridResolution::for_viewport(
        viewport.0,
        viewport.1,
        params.sim_resolution,
        params.dye_resolution,
    );
    let max = context.profile().max_texture_dimension.max(1);
    let clamped = GridResolution {
        sim_width: grid.sim_width.min(max),
        sim_height: grid.sim_height.min(max),
        dye_width: grid.dye_width.min(max),
        dye_height: grid.dye_height.min(max),
    };
    if clamped != grid {
        tracing::warn!(requested = ?grid, max, "grid exceeds adapter texture limit; clamping");
    }
    clamped
}

fn allocate_store(context: &GpuContext, grid: GridResolution) -> FieldStore {
    let mut encoder = context
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("field allocation"),
        });
    let store = FieldStore::allocate(context.device(), &mut encoder, grid, context.formats());
    context.queue().submit(Some(encoder.finish()));
    store
}

/// Links every pipeline a step can need so failures surface at construction.
fn warm_pipelines(
    programs: &mut StagePrograms,
    device: &wgpu::Device,
    formats: FieldFormats,
) -> Result<(), FluidError> {
    let vector = formats.vector.texture_format();
    let scalar = formats.scalar.texture_format();
    let color = formats.color.texture_format();
    let plan = [
        (Stage::Splat, vector),
        (Stage::Splat, color),
        (Stage::Curl, scalar),
        (Stage::Vorticity, vector),
        (Stage::Advection, vector),
        (Stage::Advection, color),
        (Stage::Divergence, scalar),
        (Stage::Decay, scalar),
        (Stage::Pressure, scalar),
        (Stage::GradientSubtract, vector),
        (Stage::Display, EXPORT_FORMAT.texture_format()),
    ];
    for (stage, format) in plan {
        programs.prepare(device, stage, format)?;
    }
    Ok(())
}

fn snapshot_to_image(snapshot: &FieldSnapshot) -> image::RgbaImage {
    let to_byte = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    image::RgbaImage::from_fn(snapshot.width, snapshot.height, |x, y| {
        let texel = snapshot.texel(x, snapshot.height - 1 - y);
        image::Rgba([
            to_byte(texel[0]),
            to_byte(texel[1]),
            to_byte(texel[2]),
            to_byte(texel[3]),
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_rows_run_top_to_bottom() {
        // Bottom row red, top row blue.
        let snapshot = FieldSnapshot {
            kind: FieldKind::Display,
            width: 1,
            height: 2,
            channels: 4,
            data: vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.5],
        };
        let image = snapshot_to_image(&snapshot);
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 255, 128]);
        assert_eq!(image.get_pixel(0, 1).0, [255, 0, 0, 255]);
    }
}
