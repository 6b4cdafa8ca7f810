use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ambient::{AmbientSplatter, EventBurst, GameEvent};
use anyhow::{anyhow, Context, Result};
use fluid::{
    wgpu, ColorGenerator, FluidEngine, FluidError, GpuContext, PointerId, PointerTracker,
    SplatRequest,
};
use fluidconfig::FluidConfig;
use tracing::{error, info, warn};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, MouseButton, Touch, TouchPhase, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::cli::PreviewArgs;
use crate::paths::AppPaths;
use crate::run;

const MOUSE_POINTER: PointerId = 0;
const SOFTWARE_FPS_CAP: f32 = 15.0;
const RANDOM_BURST_SPLATS: u32 = 12;
const PULSE_INTENSITY: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    TogglePause,
    Reset,
    RandomSplats,
    Pulse,
    /// Simulated tile merge reaching `2 << n`.
    Merge(u32),
    Export,
    Quit,
}

fn key_action(key: &Key) -> Option<KeyAction> {
    match key {
        Key::Named(NamedKey::Space) => Some(KeyAction::TogglePause),
        Key::Named(NamedKey::Escape) => Some(KeyAction::Quit),
        Key::Character(value) => match value.as_str().to_ascii_lowercase().as_str() {
            " " => Some(KeyAction::TogglePause),
            "r" => Some(KeyAction::Reset),
            "s" => Some(KeyAction::RandomSplats),
            "b" => Some(KeyAction::Pulse),
            "p" => Some(KeyAction::Export),
            digit => digit
                .parse::<u32>()
                .ok()
                .filter(|n| (1..=9).contains(n))
                .map(KeyAction::Merge),
        },
        _ => None,
    }
}

#[derive(Debug)]
enum FrameError {
    Surface(wgpu::SurfaceError),
    Simulation(FluidError),
}

impl From<wgpu::SurfaceError> for FrameError {
    fn from(err: wgpu::SurfaceError) -> Self {
        FrameError::Surface(err)
    }
}

impl From<FluidError> for FrameError {
    fn from(err: FluidError) -> Self {
        FrameError::Simulation(err)
    }
}

struct PreviewState {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    engine: FluidEngine,
    pointers: PointerTracker,
    cursor: Option<PhysicalPosition<f64>>,
    ambient: AmbientSplatter,
    bursts: EventBurst,
    frame_interval: Option<Duration>,
    last_frame: Instant,
    snapshot_dir: PathBuf,
}

impl PreviewState {
    fn new(
        window: Arc<Window>,
        config: &FluidConfig,
        args: &PreviewArgs,
        paths: &AppPaths,
    ) -> Result<Self> {
        let size = window.inner_size();
        let instance = fluid::create_instance();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create window surface")?;
        let context = GpuContext::for_surface(instance, &surface)?;

        let caps = surface.get_capabilities(context.adapter());
        // The display kernel already applies its tone curve.
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(context.device(), &surface_config);

        let profile = context.profile().clone();
        let frame_interval = frame_interval(config.display.max_fps, profile.is_software());
        if profile.is_software() {
            warn!(
                adapter = %profile.name,
                backend = ?profile.backend,
                "software rasterizer detected; preview is capped to {} FPS",
                SOFTWARE_FPS_CAP
            );
        }

        let mut engine = FluidEngine::new(
            context,
            surface_config.width,
            surface_config.height,
            run::simulation_params(config),
        )
        .context("failed to initialise the fluid engine")?;
        if args.paused {
            engine.pause();
        }

        let seed = run::resolve_seed(args.seed, config);
        let mut ambient = AmbientSplatter::new(&config.ambient, seed)?;
        if args.no_ambient {
            ambient.set_enabled(false);
        }
        let bursts = EventBurst::new(
            &config.bursts,
            ColorGenerator::new((seed % 1000) as f32 / 1000.0),
        )?;
        info!(
            adapter = %profile.name,
            backend = ?profile.backend,
            ?format,
            seed,
            "preview ready"
        );

        Ok(Self {
            window,
            surface,
            pointers: PointerTracker::new(
                surface_config.width,
                surface_config.height,
                ColorGenerator::default(),
            ),
            surface_config,
            engine,
            cursor: None,
            ambient,
            bursts,
            frame_interval,
            last_frame: Instant::now(),
            snapshot_dir: paths.snapshot_dir(),
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.surface_config.width = size.width;
        self.surface_config.height = size.height;
        self.reconfigure();
        self.engine.resize(size.width, size.height);
        self.pointers.set_viewport(size.width, size.height);
    }

    fn reconfigure(&self) {
        self.surface
            .configure(self.engine.context().device(), &self.surface_config);
    }

    fn redraw(&mut self) -> Result<(), FrameError> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        let splats = frame_splats(
            self.engine.is_paused(),
            now,
            &mut self.pointers,
            &mut self.ambient,
            self.engine.params().splat_force,
        );
        self.engine.submit_splats(splats);
        self.engine.step(dt)?;

        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.engine.render_to(
            &view,
            self.surface_config.format,
            self.surface_config.width,
            self.surface_config.height,
        )?;
        self.window.pre_present_notify();
        frame.present();
        Ok(())
    }

    fn frame_due(&self, now: Instant) -> Option<Instant> {
        let interval = self.frame_interval?;
        let next = self.last_frame + interval;
        (next > now).then_some(next)
    }

    fn cursor_uv(&self) -> [f32; 2] {
        self.cursor
            .map(|position| self.pointers.to_uv(position.x, position.y))
            .unwrap_or([0.5, 0.5])
    }

    fn handle_cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        self.cursor = Some(position);
        self.pointers
            .pointer_move(MOUSE_POINTER, position.x, position.y);
    }

    fn handle_mouse_button(&mut self, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if let Some(position) = self.cursor {
                    self.pointers
                        .pointer_down(MOUSE_POINTER, position.x, position.y);
                }
            }
            ElementState::Released => {
                self.pointers.pointer_up(MOUSE_POINTER);
            }
        }
    }

    fn handle_touch(&mut self, touch: Touch) {
        let id = touch.id.saturating_add(1);
        let (x, y) = (touch.location.x, touch.location.y);
        match touch.phase {
            TouchPhase::Started => self.pointers.pointer_down(id, x, y),
            TouchPhase::Moved => self.pointers.pointer_move(id, x, y),
            TouchPhase::Ended | TouchPhase::Cancelled => {
                self.pointers.pointer_up(id);
            }
        }
    }

    /// Returns `false` when the preview should close.
    fn handle_key(&mut self, action: KeyAction) -> bool {
        match action {
            KeyAction::TogglePause => {
                if self.engine.is_paused() {
                    self.engine.resume();
                    info!("simulation resumed");
                } else {
                    self.engine.pause();
                    info!("simulation paused");
                }
            }
            KeyAction::Reset => {
                self.engine.reset();
                info!("fields cleared");
            }
            KeyAction::RandomSplats => {
                let splats = self.ambient.random_splats(RANDOM_BURST_SPLATS);
                self.engine.submit_splats(splats);
            }
            KeyAction::Pulse => {
                let splats = self.bursts.emit(&GameEvent::Pulse {
                    position: self.cursor_uv(),
                    intensity: PULSE_INTENSITY,
                });
                self.engine.submit_splats(splats);
            }
            KeyAction::Merge(power) => {
                let splats = self.bursts.emit(&GameEvent::TileMerge {
                    position: self.cursor_uv(),
                    value: 2 << power,
                });
                self.engine.submit_splats(splats);
            }
            KeyAction::Export => {
                if let Err(err) = self.export_snapshot() {
                    error!("failed to export snapshot: {err:?}");
                }
            }
            KeyAction::Quit => return false,
        }
        true
    }

    fn export_snapshot(&mut self) -> Result<()> {
        fs::create_dir_all(&self.snapshot_dir)
            .with_context(|| format!("failed to create {}", self.snapshot_dir.display()))?;
        let name = format!(
            "inkpot-{}.png",
            chrono::Local::now().format("%Y%m%d-%H%M%S%.3f")
        );
        let path = self.snapshot_dir.join(name);
        self.engine.export_png(
            &path,
            self.surface_config.width,
            self.surface_config.height,
        )?;
        info!(path = %path.display(), "snapshot saved");
        Ok(())
    }
}

/// Pointer and ambient splats for the coming frame. While paused, pointer
/// motion is dropped and the idle clock is left alone.
fn frame_splats(
    paused: bool,
    now: Instant,
    pointers: &mut PointerTracker,
    ambient: &mut AmbientSplatter,
    force: f32,
) -> Vec<SplatRequest> {
    let mut splats = pointers.drain_splats(force);
    if paused {
        return Vec::new();
    }
    splats.extend(ambient.tick(now, pointers.is_active()));
    splats
}

fn frame_interval(max_fps: f32, software: bool) -> Option<Duration> {
    let fps = if software && (max_fps <= 0.0 || max_fps > SOFTWARE_FPS_CAP) {
        SOFTWARE_FPS_CAP
    } else {
        max_fps
    };
    (fps.is_finite() && fps > 0.0).then(|| Duration::from_secs_f32(1.0 / fps))
}

pub fn run(args: PreviewArgs, config: FluidConfig, paths: &AppPaths) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let (width, height) = args
        .size
        .unwrap_or((config.display.width, config.display.height));
    let window = WindowBuilder::new()
        .with_title("Inkpot")
        .with_inner_size(PhysicalSize::new(width, height))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);
    let mut state = PreviewState::new(window.clone(), &config, &args, paths)?;
    let mut failure: Option<anyhow::Error> = None;

    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
            WindowEvent::Resized(size) => state.resize(size),
            WindowEvent::CursorMoved { position, .. } => state.handle_cursor_moved(position),
            WindowEvent::CursorLeft { .. } => {
                state.pointers.pointer_up(MOUSE_POINTER);
            }
            WindowEvent::MouseInput {
                state: button_state,
                button: MouseButton::Left,
                ..
            } => state.handle_mouse_button(button_state),
            WindowEvent::Touch(touch) => state.handle_touch(touch),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    if let Some(action) = key_action(&event.logical_key) {
                        if !state.handle_key(action) {
                            elwt.exit();
                        }
                    }
                }
            }
            WindowEvent::RedrawRequested => match state.redraw() {
                Ok(()) => {}
                Err(FrameError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                    state.reconfigure();
                }
                Err(FrameError::Surface(wgpu::SurfaceError::Timeout)) => {
                    warn!("surface timeout; retrying next frame");
                }
                Err(FrameError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                    failure = Some(anyhow!("surface out of memory"));
                    elwt.exit();
                }
                Err(FrameError::Surface(other)) => {
                    warn!("surface error: {other:?}; retrying next frame");
                }
                Err(FrameError::Simulation(err)) => {
                    failure = Some(anyhow!(err).context("simulation frame failed"));
                    elwt.exit();
                }
            },
            _ => {}
        },
        Event::AboutToWait => match state.frame_due(Instant::now()) {
            Some(deadline) => elwt.set_control_flow(ControlFlow::WaitUntil(deadline)),
            None => {
                state.window.request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            }
        },
        _ => {}
    });

    run_result.map_err(|err| anyhow!("preview event loop error: {err}"))?;
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_actions() {
        assert_eq!(
            key_action(&Key::Named(NamedKey::Space)),
            Some(KeyAction::TogglePause)
        );
        assert_eq!(key_action(&Key::Character("R".into())), Some(KeyAction::Reset));
        assert_eq!(
            key_action(&Key::Character("s".into())),
            Some(KeyAction::RandomSplats)
        );
        assert_eq!(key_action(&Key::Character("p".into())), Some(KeyAction::Export));
        assert_eq!(key_action(&Key::Character("3".into())), Some(KeyAction::Merge(3)));
        assert_eq!(key_action(&Key::Character("0".into())), None);
        assert_eq!(key_action(&Key::Character("x".into())), None);
    }

    #[test]
    fn software_adapters_are_capped() {
        let cap = Duration::from_secs_f32(1.0 / SOFTWARE_FPS_CAP);
        assert_eq!(frame_interval(0.0, true), Some(cap));
        assert_eq!(frame_interval(120.0, true), Some(cap));
        assert_eq!(
            frame_interval(10.0, true),
            Some(Duration::from_secs_f32(0.1))
        );
        assert_eq!(frame_interval(0.0, false), None);
    }

    #[test]
    fn paused_frames_queue_nothing() {
        let settings = fluidconfig::AmbientSection {
            interval: Duration::from_millis(10),
            ..Default::default()
        };
        let mut ambient = AmbientSplatter::new(&settings, 7).unwrap();
        let mut pointers = PointerTracker::new(100, 100, ColorGenerator::new(0.0));
        let start = Instant::now();
        pointers.pointer_down(MOUSE_POINTER, 10.0, 10.0);
        pointers.pointer_up(MOUSE_POINTER);
        assert!(frame_splats(false, start, &mut pointers, &mut ambient, 1.0).is_empty());

        pointers.pointer_down(MOUSE_POINTER, 10.0, 10.0);
        for frame in 1..=200u32 {
            pointers.pointer_move(MOUSE_POINTER, 10.0 + f64::from(frame % 50), 10.0);
            let now = start + Duration::from_millis(u64::from(frame) * 16);
            assert!(frame_splats(true, now, &mut pointers, &mut ambient, 1.0).is_empty());
        }
        pointers.pointer_up(MOUSE_POINTER);

        // Motion made while paused is gone; at most one ambient burst follows.
        let resumed = start + Duration::from_secs(10);
        let splats = frame_splats(false, resumed, &mut pointers, &mut ambient, 1.0);
        assert!(splats.len() <= settings.max_splats as usize, "{} splats", splats.len());
    }
}
