use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use tracing::{error, info};
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::context::{ContextError, DrawingSurface};
use crate::gpu::WgpuContext;
use crate::parallax::{ParallaxRenderer, TextureLoad};
use crate::pointer::shared_pointer;
use crate::schedule::{FrameHandle, FrameScheduler};
use crate::types::{GpuPowerPreference, ViewerConfig};

/// How often the loop wakes to check on in-flight texture fetches.
const TEXTURE_POLL_INTERVAL: Duration = Duration::from_millis(15);
const INTENSITY_STEP: f32 = 0.005;
const MAX_INTENSITY: f32 = 0.2;

/// A winit window as a drawing surface.
pub struct WindowSurface {
    window: Arc<Window>,
    gpu_power: GpuPowerPreference,
}

impl WindowSurface {
    pub fn new(window: Arc<Window>, gpu_power: GpuPowerPreference) -> Self {
        Self { window, gpu_power }
    }
}

impl DrawingSurface for WindowSurface {
    type Context = WgpuContext;

    fn acquire_context(&self) -> Result<WgpuContext, ContextError> {
        WgpuContext::new(self.window.clone(), self.gpu_power)
            .map_err(|err| ContextError::new(format!("{err:#}")))
    }
}

/// Frame scheduler backed by the window's redraw requests.
///
/// winit coalesces redraw requests, so at most one frame is ever outstanding;
/// `RedrawRequested` hands the pending handle back through [`Self::take_due`].
pub struct RedrawScheduler {
    request_redraw: Box<dyn Fn()>,
    next_id: u64,
    pending: Option<FrameHandle>,
}

impl RedrawScheduler {
    pub fn new(request_redraw: impl Fn() + 'static) -> Self {
        Self {
            request_redraw: Box::new(request_redraw),
            next_id: 0,
            pending: None,
        }
    }

    /// Takes the frame due on this redraw, if one was requested and not cancelled.
    pub fn take_due(&mut self) -> Option<FrameHandle> {
        self.pending.take()
    }
}

impl FrameScheduler for RedrawScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next_id += 1;
        let handle = FrameHandle::new(self.next_id);
        self.pending = Some(handle);
        (self.request_redraw)();
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    TogglePause,
    IntensityUp,
    IntensityDown,
    ReloadTextures,
    Quit,
}

fn key_action(key: &Key) -> Option<KeyAction> {
    match key {
        Key::Named(NamedKey::Space) => Some(KeyAction::TogglePause),
        Key::Named(NamedKey::ArrowUp) => Some(KeyAction::IntensityUp),
        Key::Named(NamedKey::ArrowDown) => Some(KeyAction::IntensityDown),
        Key::Named(NamedKey::Escape) => Some(KeyAction::Quit),
        Key::Character(value) => match value.as_str() {
            " " => Some(KeyAction::TogglePause),
            "r" | "R" => Some(KeyAction::ReloadTextures),
            "q" | "Q" => Some(KeyAction::Quit),
            _ => None,
        },
        _ => None,
    }
}

fn adjust_intensity(current: f32, delta: f32) -> f32 {
    // Round to the step grid so repeated presses do not accumulate float drift.
    let stepped = ((current + delta) / INTENSITY_STEP).round() * INTENSITY_STEP;
    stepped.clamp(0.0, MAX_INTENSITY)
}

type WindowRenderer = ParallaxRenderer<WgpuContext, RedrawScheduler>;

/// Opens the preview window and runs the parallax loop until it is closed.
pub fn run_window(config: ViewerConfig) -> Result<()> {
    let event_loop = EventLoopBuilder::new()
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let (width, height) = config.window_size;
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(LogicalSize::new(width, height))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let redraw_target = window.clone();
    let scheduler = RedrawScheduler::new(move || redraw_target.request_redraw());
    let mut renderer: WindowRenderer = ParallaxRenderer::new(scheduler);
    renderer.intensity = config.intensity;
    renderer
        .init(&WindowSurface::new(window.clone(), config.gpu_power))
        .context("failed to initialise parallax renderer")?;

    let (pointer, source) = shared_pointer();
    renderer.set_pointer_source(Box::new(source));
    renderer.load_textures(&config.image_source, &config.depth_source);
    renderer.start(Instant::now());
    info!(
        image = %config.image_source,
        depth = %config.depth_source,
        "parallax preview running (space: pause, up/down: intensity, r: reload, esc: quit)"
    );

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                    renderer.destroy();
                    elwt.exit();
                }
                WindowEvent::KeyboardInput { event, .. }
                    if event.state == ElementState::Pressed && !event.repeat =>
                {
                    let Some(action) = key_action(&event.logical_key) else {
                        return;
                    };
                    match action {
                        KeyAction::TogglePause => {
                            if renderer.is_running() {
                                renderer.stop();
                                info!("paused");
                            } else {
                                renderer.start(Instant::now());
                                info!("resumed");
                            }
                        }
                        KeyAction::IntensityUp | KeyAction::IntensityDown => {
                            let delta = if action == KeyAction::IntensityUp {
                                INTENSITY_STEP
                            } else {
                                -INTENSITY_STEP
                            };
                            renderer.intensity = adjust_intensity(renderer.intensity, delta);
                            info!(intensity = renderer.intensity, "intensity changed");
                        }
                        KeyAction::ReloadTextures => {
                            renderer.load_textures(&config.image_source, &config.depth_source);
                        }
                        KeyAction::Quit => {
                            renderer.destroy();
                            elwt.exit();
                        }
                    }
                }
                WindowEvent::CursorMoved { position, .. } => {
                    let size = window.inner_size();
                    pointer.cursor_moved(
                        position.x,
                        position.y,
                        size.width as f64,
                        size.height as f64,
                    );
                }
                WindowEvent::RedrawRequested => {
                    if let Some(handle) = renderer.scheduler_mut().take_due() {
                        renderer.frame(handle, Instant::now());
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                poll_textures(&mut renderer);
                if renderer.textures_pending() {
                    elwt.set_control_flow(ControlFlow::WaitUntil(
                        Instant::now() + TEXTURE_POLL_INTERVAL,
                    ));
                } else {
                    elwt.set_control_flow(ControlFlow::Wait);
                }
            }
            Event::LoopExiting => renderer.destroy(),
            _ => {}
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}

fn poll_textures(renderer: &mut WindowRenderer) {
    match renderer.poll_textures() {
        Some(Ok(TextureLoad::Uploaded)) => info!("textures loaded"),
        Some(Ok(TextureLoad::Discarded)) | None => {}
        Some(Err(err)) => error!("failed to load textures: {err}; press r to retry"),
    }
}
