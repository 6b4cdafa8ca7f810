use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::error::FluidError;

use super::fields::Field;
use super::kernels::{compile_stage, compile_vertex_shader, Stage};
use super::uniforms::{StageUniforms, STAGE_UNIFORMS_SIZE};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct PipelineKey {
    stage: Stage,
    format: wgpu::TextureFormat,
}

struct StageProgram {
    fragment: wgpu::ShaderModule,
    input_layout: wgpu::BindGroupLayout,
    layout: wgpu::PipelineLayout,
}

/// Destination of one kernel invocation.
pub(crate) struct Target<'a> {
    pub view: &'a wgpu::TextureView,
    pub format: wgpu::TextureFormat,
}

impl<'a> From<&'a Field> for Target<'a> {
    fn from(field: &'a Field) -> Self {
        Self {
            view: field.view(),
            format: field.format().texture_format(),
        }
    }
}

/// Compiled kernels plus the render pipelines built from them, one per
/// (stage, destination format).
pub(crate) struct StagePrograms {
    vertex: wgpu::ShaderModule,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,
    programs: HashMap<Stage, StageProgram>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl StagePrograms {
    /// Compiles every kernel; the first failure aborts construction.
    pub fn new(device: &wgpu::Device) -> Result<Self, FluidError> {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("stage uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("stage uniforms"),
            size: STAGE_UNIFORMS_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("stage uniform bind group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let vertex = compile_vertex_shader(device)?;
        let mut programs = HashMap::with_capacity(Stage::ALL.len());
        for stage in Stage::ALL {
            let fragment = compile_stage(device, stage)?;
            let input_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(stage.name()),
                entries: &input_layout_entries(stage.inputs().len()),
            });
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(stage.name()),
                bind_group_layouts: &[&uniform_layout, &input_layout],
                push_constant_ranges: &[],
            });
            programs.insert(
                stage,
                StageProgram {
                    fragment,
                    input_layout,
                    layout,
                },
            );
        }
        tracing::debug!(stages = programs.len(), "compiled stage kernels");

        Ok(Self {
            vertex,
            uniform_buffer,
            uniform_bind_group,
            linear_sampler: create_sampler(device, wgpu::FilterMode::Linear),
            nearest_sampler: create_sampler(device, wgpu::FilterMode::Nearest),
            programs,
            pipelines: HashMap::new(),
        })
    }

    /// Builds (or reuses) the pipeline rendering `stage` into `format`.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        stage: Stage,
        format: wgpu::TextureFormat,
    ) -> Result<(), FluidError> {
        let key = PipelineKey { stage, format };
        if self.pipelines.contains_key(&key) {
            return Ok(());
        }
        let program = self.programs.get(&stage).ok_or(FluidError::PipelineLink {
            stage: stage.name(),
            message: "kernel was never compiled".to_owned(),
        })?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(stage.name()),
            layout: Some(&program.layout),
            vertex: wgpu::VertexState {
                module: &self.vertex,
                entry_point: Some("main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &program.fragment,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(FluidError::PipelineLink {
                stage: stage.name(),
                message: err.to_string(),
            });
        }
        tracing::debug!(stage = stage.name(), ?format, "linked stage pipeline");
        self.pipelines.insert(key, pipeline);
        Ok(())
    }

    /// Records one full-screen kernel invocation.
    ///
    /// Uniforms are staged and copied into the shared block inside the same
    /// encoder, so every pass of a step observes its own values.
    pub fn dispatch(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        stage: Stage,
        inputs: &[&Field],
        target: Target<'_>,
        uniforms: &StageUniforms,
    ) -> Result<(), FluidError> {
        self.prepare(device, stage, target.format)?;
        let key = PipelineKey {
            stage,
            format: target.format,
        };
        let (Some(pipeline), Some(program)) = (self.pipelines.get(&key), self.programs.get(&stage))
        else {
            return Err(FluidError::PipelineLink {
                stage: stage.name(),
                message: "pipeline missing after preparation".to_owned(),
            });
        };
        debug_assert_eq!(inputs.len(), stage.inputs().len());

        let entries = inputs
            .iter()
            .enumerate()
            .flat_map(|(index, field)| {
                let sampler = match field.filter() {
                    wgpu::FilterMode::Linear => &self.linear_sampler,
                    wgpu::FilterMode::Nearest => &self.nearest_sampler,
                };
                [
                    wgpu::BindGroupEntry {
                        binding: (index as u32) * 2,
                        resource: wgpu::BindingResource::TextureView(field.view()),
                    },
                    wgpu::BindGroupEntry {
                        binding: (index as u32) * 2 + 1,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                ]
            })
            .collect::<Vec<_>>();
        let input_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(stage.name()),
            layout: &program.input_layout,
            entries: &entries,
        });

        let staging = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("stage uniform staging"),
            contents: bytemuck::bytes_of(uniforms),
            usage: wgpu::BufferUsages::COPY_SRC,
        });
        encoder.copy_buffer_to_buffer(&staging, 0, &self.uniform_buffer, 0, STAGE_UNIFORMS_SIZE);

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(stage.name()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.set_bind_group(1, &input_bind_group, &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }
}

fn create_sampler(device: &wgpu::Device, filter: wgpu::FilterMode) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(match filter {
            wgpu::FilterMode::Linear => "field linear sampler",
            wgpu::FilterMode::Nearest => "field nearest sampler",
        }),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

fn input_layout_entries(count: usize) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(count * 2);
    for index in 0..count as u32 {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index * 2 + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    entries
}
