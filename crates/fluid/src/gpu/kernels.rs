//! GLSL sources for the stage kernels and their compilation through naga.
//!
//! Every kernel shares one prelude: the `StageParams` uniform block, a
//! texture/sampler pair per input, and a `sample_<input>` helper taking a
//! bottom-left-origin UV. `sim_uv()` gives the destination texel center in
//! the same space, so kernels never deal with framebuffer orientation.

use std::borrow::Cow;
use std::fmt::Write as _;

use wgpu::naga::ShaderStage;

use crate::error::FluidError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Stage {
    Splat,
    Curl,
    Vorticity,
    Advection,
    Divergence,
    Decay,
    Pressure,
    GradientSubtract,
    Display,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::Splat,
        Stage::Curl,
        Stage::Vorticity,
        Stage::Advection,
        Stage::Divergence,
        Stage::Decay,
        Stage::Pressure,
        Stage::GradientSubtract,
        Stage::Display,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Splat => "splat",
            Stage::Curl => "curl",
            Stage::Vorticity => "vorticity",
            Stage::Advection => "advection",
            Stage::Divergence => "divergence",
            Stage::Decay => "decay",
            Stage::Pressure => "pressure",
            Stage::GradientSubtract => "gradient subtract",
            Stage::Display => "display",
        }
    }

    /// Sampled inputs in binding order.
    pub fn inputs(self) -> &'static [&'static str] {
        match self {
            Stage::Splat => &["target"],
            Stage::Curl | Stage::Divergence => &["velocity"],
            Stage::Vorticity => &["velocity", "curl"],
            Stage::Advection => &["velocity", "source"],
            Stage::Decay => &["source"],
            Stage::Pressure => &["pressure", "divergence"],
            Stage::GradientSubtract => &["pressure", "velocity"],
            Stage::Display => &["dye"],
        }
    }

    fn body(self) -> &'static str {
        match self {
            Stage::Splat => SPLAT,
            Stage::Curl => CURL,
            Stage::Vorticity => VORTICITY,
            Stage::Advection => ADVECTION,
            Stage::Divergence => DIVERGENCE,
            Stage::Decay => DECAY,
            Stage::Pressure => PRESSURE,
            Stage::GradientSubtract => GRADIENT_SUBTRACT,
            Stage::Display => DISPLAY,
        }
    }
}

/// Compiles the full-screen triangle shared by every stage.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> Result<wgpu::ShaderModule, FluidError> {
    compile(device, "fullscreen", VERTEX_SHADER_GLSL.to_owned(), ShaderStage::Vertex)
}

pub(crate) fn compile_stage(device: &wgpu::Device, stage: Stage) -> Result<wgpu::ShaderModule, FluidError> {
    compile(device, stage.name(), fragment_source(stage), ShaderStage::Fragment)
}

fn compile(
    device: &wgpu::Device,
    name: &'static str,
    source: String,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule, FluidError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(name),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source),
            stage,
            defines: &[],
        },
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(FluidError::ShaderCompile {
            stage: name,
            message: err.to_string(),
        }),
        None => Ok(module),
    }
}

/// Assembles prelude, per-input bindings and the kernel body.
pub(crate) fn fragment_source(stage: Stage) -> String {
    let mut source = String::from(HEADER);
    for (index, input) in stage.inputs().iter().enumerate() {
        let texture_binding = index * 2;
        let sampler_binding = texture_binding + 1;
        let _ = write!(
            source,
            "layout(set = 1, binding = {texture_binding}) uniform texture2D {input}_texture;\n\
             layout(set = 1, binding = {sampler_binding}) uniform sampler {input}_sampler;\n\
             vec4 sample_{input}(vec2 p) {{\n    \
                 return texture(sampler2D({input}_texture, {input}_sampler), vec2(p.x, 1.0 - p.y));\n\
             }}\n\n"
        );
    }
    source.push_str(stage.body());
    source
}

/// The block layout must match `StageUniforms` in `uniforms.rs`.
const HEADER: &str = r"#version 450
layout(location = 0) out vec4 out_color;

layout(std140, set = 0, binding = 0) uniform StageParams {
    vec2 texel;
    vec2 target_size;
    vec2 point;
    float aspect;
    float radius;
    vec4 color;
    float dt;
    float dissipation;
    float curl_strength;
    float scalar;
} params;

vec2 sim_uv() {
    return vec2(gl_FragCoord.x, params.target_size.y - gl_FragCoord.y) / params.target_size;
}

";

const SPLAT: &str = r"void main() {
    vec2 uv = sim_uv();
    vec2 p = uv - params.point;
    p.x *= params.aspect;
    vec3 splat = exp(-dot(p, p) / params.radius) * params.color.xyz;
    vec3 base = sample_target(uv).xyz;
    out_color = vec4(base + splat, 1.0);
}
";

const CURL: &str = r"void main() {
    vec2 uv = sim_uv();
    vec2 dx = vec2(params.texel.x, 0.0);
    vec2 dy = vec2(0.0, params.texel.y);
    float L = sample_velocity(uv - dx).y;
    float R = sample_velocity(uv + dx).y;
    float T = sample_velocity(uv + dy).x;
    float B = sample_velocity(uv - dy).x;
    out_color = vec4(0.5 * (R - L - T + B), 0.0, 0.0, 1.0);
}
";

const VORTICITY: &str = r"void main() {
    vec2 uv = sim_uv();
    vec2 dx = vec2(params.texel.x, 0.0);
    vec2 dy = vec2(0.0, params.texel.y);
    float L = sample_curl(uv - dx).x;
    float R = sample_curl(uv + dx).x;
    float T = sample_curl(uv + dy).x;
    float B = sample_curl(uv - dy).x;
    float C = sample_curl(uv).x;

    vec2 force = 0.5 * vec2(abs(T) - abs(B), abs(R) - abs(L));
    force /= length(force) + 0.0001;
    force *= params.curl_strength * C;
    force.y *= -1.0;

    vec2 velocity = sample_velocity(uv).xy + force * params.dt;
    velocity = clamp(velocity, vec2(-1000.0), vec2(1000.0));
    out_color = vec4(velocity, 0.0, 1.0);
}
";

const ADVECTION: &str = r"void main() {
    vec2 uv = sim_uv();
    vec2 coord = uv - params.dt * sample_velocity(uv).xy * params.texel;
    vec4 result = sample_source(coord);
    float decay = 1.0 + params.dissipation * params.dt;
    out_color = vec4(result.xyz / decay, 1.0);
}
";

const DIVERGENCE: &str = r"void main() {
    vec2 uv = sim_uv();
    vec2 dx = vec2(params.texel.x, 0.0);
    vec2 dy = vec2(0.0, params.texel.y);
    float L = sample_velocity(uv - dx).x;
    float R = sample_velocity(uv + dx).x;
    float T = sample_velocity(uv + dy).y;
    float B = sample_velocity(uv - dy).y;
    out_color = vec4(0.5 * (R - L + T - B), 0.0, 0.0, 1.0);
}
";

const DECAY: &str = r"void main() {
    vec2 uv = sim_uv();
    out_color = params.scalar * sample_source(uv);
}
";

const PRESSURE: &str = r"void main() {
    vec2 uv = sim_uv();
    vec2 dx = vec2(params.texel.x, 0.0);
    vec2 dy = vec2(0.0, params.texel.y);
    float L = sample_pressure(uv - dx).x;
    float R = sample_pressure(uv + dx).x;
    float T = sample_pressure(uv + dy).x;
    float B = sample_pressure(uv - dy).x;
    float divergence = sample_divergence(uv).x;
    out_color = vec4((L + R + B + T - divergence) * 0.25, 0.0, 0.0, 1.0);
}
";

const GRADIENT_SUBTRACT: &str = r"void main() {
    vec2 uv = sim_uv();
    vec2 dx = vec2(params.texel.x, 0.0);
    vec2 dy = vec2(0.0, params.texel.y);
    float L = sample_pressure(uv - dx).x;
    float R = sample_pressure(uv + dx).x;
    float T = sample_pressure(uv + dy).x;
    float B = sample_pressure(uv - dy).x;
    vec2 velocity = sample_velocity(uv).xy;
    velocity -= vec2(R - L, T - B);
    out_color = vec4(velocity, 0.0, 1.0);
}
";

const DISPLAY: &str = r"void main() {
    vec2 uv = sim_uv();
    vec3 c = max(sample_dye(uv).rgb, vec3(0.0));
    c = pow(c, vec3(params.scalar));
    float a = max(c.r, max(c.g, c.b));
    out_color = vec4(c, a);
}
";

/// Full-screen triangle; kernels derive coordinates from `gl_FragCoord`.
const VERTEX_SHADER_GLSL: &str = r"#version 450
const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    gl_Position = vec4(positions[gl_VertexIndex], 0.0, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_input_gets_binding_pair_and_sampler_helper() {
        let source = fragment_source(Stage::GradientSubtract);
        assert!(source.contains("layout(set = 1, binding = 0) uniform texture2D pressure_texture;"));
        assert!(source.contains("layout(set = 1, binding = 1) uniform sampler pressure_sampler;"));
        assert!(source.contains("layout(set = 1, binding = 2) uniform texture2D velocity_texture;"));
        assert!(source.contains("layout(set = 1, binding = 3) uniform sampler velocity_sampler;"));
        assert!(source.contains("vec4 sample_velocity(vec2 p)"));
        assert!(source.starts_with("#version 450"));
    }

    #[test]
    fn bodies_only_sample_declared_inputs() {
        for stage in Stage::ALL {
            let body = stage.body();
            for candidate in ["target", "velocity", "curl", "source", "pressure", "divergence", "dye"] {
                let call = format!("sample_{candidate}(");
                if body.contains(&call) {
                    assert!(
                        stage.inputs().contains(&candidate),
                        "{} samples undeclared input {candidate}",
                        stage.name()
                    );
                }
            }
            assert!(body.contains("out_color"), "{} never writes", stage.name());
        }
    }

    #[test]
    fn samplers_flip_to_texture_orientation() {
        let source = fragment_source(Stage::Display);
        assert!(source.contains("vec2(p.x, 1.0 - p.y)"));
        assert!(source.contains("params.target_size.y - gl_FragCoord.y"));
    }

    fn test_device() -> Option<crate::gpu::GpuContext> {
        match crate::gpu::GpuContext::headless() {
            Ok(context) => Some(context),
            Err(err) => {
                eprintln!("skipping GPU test: {err}");
                None
            }
        }
    }

    #[test]
    fn malformed_glsl_reports_the_failing_stage() {
        let Some(context) = test_device() else {
            return;
        };
        let source = "#version 450\n\
                      layout(location = 0) out vec4 out_color;\n\
                      void main() { out_color = ; }\n";
        let err = compile(context.device(), "broken", source.to_owned(), ShaderStage::Fragment)
            .unwrap_err();
        match err {
            FluidError::ShaderCompile { stage, message } => {
                assert_eq!(stage, "broken");
                assert!(!message.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn every_stage_compiles() {
        let Some(context) = test_device() else {
            return;
        };
        compile_vertex_shader(context.device()).unwrap();
        for stage in Stage::ALL {
            if let Err(err) = compile_stage(context.device(), stage) {
                panic!("{} failed: {err}", stage.name());
            }
        }
    }
}
