//! The parallax renderer: lifecycle, texture slots and the per-frame step.
//!
//! A renderer is created stopped and without a context. `init` binds it to a
//! drawing surface, `load_textures` starts fetching the image pair, and
//! `start`/`stop` drive the frame loop through a [`FrameScheduler`]. The host
//! calls [`ParallaxRenderer::frame`] whenever a requested frame fires.
//! `destroy` is terminal.

use std::sync::Arc;
use std::time::Instant;

use crate::bootstrap::{bootstrap, InitError, ProgramResources};
use crate::context::{DrawingSurface, GraphicsContext};
use crate::pointer::{drift, PointerSource, PointerState};
use crate::schedule::{FrameHandle, FrameScheduler, RunState};
use crate::shaders::{DEPTH_UNIT, IMAGE_UNIT, QUAD_VERTEX_COUNT};
use crate::textures::{
    DefaultFetcher, ImageFetcher, ImagePair, PendingTextures, TextureError, TextureSlot,
};

pub const DEFAULT_INTENSITY: f32 = 0.02;

/// Outcome of a settled texture load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureLoad {
    /// Both textures were uploaded and are bound from the next frame on.
    Uploaded,
    /// The pair arrived after the context was gone and was dropped.
    Discarded,
}

pub struct ParallaxRenderer<C: GraphicsContext, S: FrameScheduler> {
    context: Option<C>,
    resources: Option<ProgramResources<C>>,
    image_texture: Option<C::Texture>,
    depth_texture: Option<C::Texture>,
    image_resolution: [f32; 2],
    pending_textures: Option<PendingTextures>,
    fetcher: Arc<dyn ImageFetcher>,
    pointer: PointerState,
    pointer_source: Option<Box<dyn PointerSource>>,
    /// Displacement scale, read once per frame.
    pub intensity: f32,
    scheduler: S,
    run_state: RunState,
    /// Last backing size requested from the context; the context may clamp it.
    sized: Option<(u32, u32)>,
    destroyed: bool,
}

impl<C: GraphicsContext, S: FrameScheduler> ParallaxRenderer<C, S> {
    pub fn new(scheduler: S) -> Self {
        Self::with_fetcher(scheduler, Arc::new(DefaultFetcher::new()))
    }

    pub fn with_fetcher(scheduler: S, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            context: None,
            resources: None,
            image_texture: None,
            depth_texture: None,
            image_resolution: [0.0, 0.0],
            pending_textures: None,
            fetcher,
            pointer: PointerState::default(),
            pointer_source: None,
            intensity: DEFAULT_INTENSITY,
            scheduler,
            run_state: RunState::Stopped,
            sized: None,
            destroyed: false,
        }
    }

    /// Acquires a context from `surface` and builds the program. Does not
    /// start rendering. On failure nothing is left allocated.
    pub fn init<D>(&mut self, surface: &D) -> Result<(), InitError>
    where
        D: DrawingSurface<Context = C>,
    {
        if self.destroyed {
            return Err(InitError::Destroyed);
        }
        if self.context.is_some() {
            return Err(InitError::AlreadyInitialised);
        }

        let mut context = surface.acquire_context().map_err(|err| {
            tracing::error!(reason = err.reason(), "graphics context unavailable");
            InitError::NoContext(err.reason().to_string())
        })?;
        let resources = bootstrap(&mut context)?;

        self.context = Some(context);
        self.resources = Some(resources);
        self.sized = None;
        tracing::debug!("parallax renderer initialised");
        Ok(())
    }

    /// Starts fetching both images. A load already in flight is superseded
    /// and its result ignored.
    pub fn load_textures(&mut self, image_source: &str, depth_source: &str) {
        if self.pending_textures.is_some() {
            tracing::debug!("superseding in-flight texture load");
        }
        self.pending_textures = Some(PendingTextures::spawn(
            self.fetcher.clone(),
            image_source,
            depth_source,
        ));
    }

    pub fn textures_pending(&self) -> bool {
        self.pending_textures.is_some()
    }

    /// Non-blocking. Returns `Some` exactly once per load, when it settles.
    pub fn poll_textures(&mut self) -> Option<Result<TextureLoad, TextureError>> {
        let settled = self.pending_textures.as_mut()?.poll()?;
        self.pending_textures = None;
        Some(self.finish_textures(settled))
    }

    /// Blocks until the current load settles. `None` when nothing is loading.
    pub fn wait_for_textures(&mut self) -> Option<Result<TextureLoad, TextureError>> {
        let settled = self.pending_textures.take()?.wait();
        Some(self.finish_textures(settled))
    }

    fn finish_textures(
        &mut self,
        settled: Result<ImagePair, TextureError>,
    ) -> Result<TextureLoad, TextureError> {
        let pair = settled.inspect_err(|err| {
            tracing::error!(error = %err, "texture load failed");
        })?;
        let Some(context) = self.context.as_mut() else {
            tracing::debug!("texture pair arrived without a live context; discarding");
            return Ok(TextureLoad::Discarded);
        };

        let image = context
            .create_texture(&pair.image)
            .map_err(|message| upload_error(TextureSlot::Image, message))?;
        let depth = match context.create_texture(&pair.depth) {
            Ok(depth) => depth,
            Err(message) => {
                context.delete_texture(image);
                return Err(upload_error(TextureSlot::Depth, message));
            }
        };

        if let Some(previous) = self.image_texture.replace(image) {
            context.delete_texture(previous);
        }
        if let Some(previous) = self.depth_texture.replace(depth) {
            context.delete_texture(previous);
        }
        self.image_resolution = pair.image.resolution();
        tracing::debug!(
            width = pair.image.width,
            height = pair.image.height,
            "texture pair uploaded"
        );
        Ok(TextureLoad::Uploaded)
    }

    /// Moves the pointer target. The smoothed position only advances when a
    /// frame is drawn.
    pub fn set_pointer(&mut self, x: f32, y: f32) {
        self.pointer.set_target(x, y);
    }

    /// Installs the input polled at the start of every frame.
    pub fn set_pointer_source(&mut self, source: Box<dyn PointerSource>) {
        self.pointer_source = Some(source);
    }

    pub fn pointer(&self) -> PointerState {
        self.pointer
    }

    pub fn start(&mut self, now: Instant) {
        if self.destroyed || self.run_state.is_running() {
            return;
        }
        let pending = self.scheduler.request_frame();
        self.run_state = RunState::Running {
            started_at: now,
            pending,
        };
        tracing::debug!(frame = pending.id(), "render loop started");
    }

    /// Cancels the pending frame. GPU resources and pointer state are kept.
    pub fn stop(&mut self) {
        if let RunState::Running { pending, .. } = self.run_state {
            self.scheduler.cancel_frame(pending);
            self.run_state = RunState::Stopped;
            tracing::debug!("render loop stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.run_state.is_running()
    }

    pub fn is_alive(&self) -> bool {
        self.context.is_some()
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Runs one frame for `handle`. Returns whether a draw was issued.
    ///
    /// Handles other than the pending one are ignored. A frame that finds the
    /// context or program gone stops the loop without rescheduling.
    pub fn frame(&mut self, handle: FrameHandle, now: Instant) -> bool {
        let RunState::Running {
            started_at,
            pending,
        } = self.run_state
        else {
            return false;
        };
        if pending != handle {
            tracing::trace!(frame = handle.id(), "ignoring stale frame");
            return false;
        }
        let (Some(context), Some(resources)) = (self.context.as_mut(), self.resources.as_ref())
        else {
            self.run_state = RunState::Stopped;
            return false;
        };

        let (width, height) = context.canvas_size().backing_size();
        if width > 0 && height > 0 && self.sized != Some((width, height)) {
            if context.backing_size() != (width, height) {
                context.resize_backing(width, height);
            }
            context.viewport(width, height);
            self.sized = Some((width, height));
        }

        if let Some(source) = self.pointer_source.as_mut() {
            if let Some([x, y]) = source.poll() {
                self.pointer.set_target(x, y);
            }
        }
        self.pointer.step();

        let t = now.saturating_duration_since(started_at).as_secs_f32();
        let [drift_x, drift_y] = drift(t);
        let current = self.pointer.current;
        let pointer = [current[0] + drift_x, current[1] + drift_y];

        let locations = &resources.locations;
        context.use_program(&resources.program);
        if let Some(location) = &locations.pointer {
            context.uniform_vec2(location, pointer);
        }
        if let Some(location) = &locations.intensity {
            context.uniform_f32(location, self.intensity);
        }
        if let Some(location) = &locations.resolution {
            let (backing_width, backing_height) = context.backing_size();
            context.uniform_vec2(location, [backing_width as f32, backing_height as f32]);
        }
        if let Some(location) = &locations.image_res {
            context.uniform_vec2(location, self.image_resolution);
        }

        if let Some(texture) = &self.image_texture {
            context.bind_texture(IMAGE_UNIT, texture);
        }
        if let Some(texture) = &self.depth_texture {
            context.bind_texture(DEPTH_UNIT, texture);
        }

        context.draw_quad(QUAD_VERTEX_COUNT);

        let next = self.scheduler.request_frame();
        self.run_state = RunState::Running {
            started_at,
            pending: next,
        };
        true
    }

    /// Stops the loop and releases every GPU resource this renderer created,
    /// then drops the context. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.stop();
        self.destroyed = true;

        let Some(mut context) = self.context.take() else {
            return;
        };
        if let Some(texture) = self.image_texture.take() {
            context.delete_texture(texture);
        }
        if let Some(texture) = self.depth_texture.take() {
            context.delete_texture(texture);
        }
        if let Some(resources) = self.resources.take() {
            resources.release(&mut context);
        }
        if !context.lose_context() {
            tracing::debug!("context loss not supported; dropping context");
        }
        tracing::debug!("parallax renderer destroyed");
    }
}

fn upload_error(slot: TextureSlot, message: String) -> TextureError {
    tracing::error!(%slot, %message, "texture upload failed");
    TextureError::Upload { slot, message }
}
